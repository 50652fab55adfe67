//! Analysis progress reporting.
//!
//! While an upload is extracted and the model call is outstanding, the CLI
//! shows what it is waiting on. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts (e.g. `sleuth detect --json`).

use std::io::Write;

use crate::models::AnalysisKind;

/// A single progress event for one analysis.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// An uploaded file is being converted to text.
    Extracting { file: String },
    /// The model call is in flight.
    Analyzing { kind: AnalysisKind },
    /// The analysis ended, successfully or not.
    Finished {
        kind: AnalysisKind,
        ok: bool,
        elapsed_ms: u128,
    },
}

/// Reports analysis progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "Analyzing text... This may take a moment."
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Extracting { file } => format!("Extracting text from {}...\n", file),
            ProgressEvent::Analyzing { kind } => match kind {
                AnalysisKind::AiDetection => {
                    "Analyzing text... This may take a moment.\n".to_string()
                }
                AnalysisKind::Plagiarism => {
                    "Checking for plagiarism... This may take a moment.\n".to_string()
                }
            },
            ProgressEvent::Finished { ok, elapsed_ms, .. } => {
                let status = if *ok { "Analysis complete" } else { "Analysis failed" };
                format!("{} ({})\n", status, format_elapsed(*elapsed_ms))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Extracting { file } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "file": file
            }),
            ProgressEvent::Analyzing { kind } => serde_json::json!({
                "event": "progress",
                "phase": "analyzing",
                "kind": kind
            }),
            ProgressEvent::Finished {
                kind,
                ok,
                elapsed_ms,
            } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "kind": kind,
                "ok": ok,
                "elapsed_ms": elapsed_ms
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_elapsed(ms: u128) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!("invalid progress mode '{}': use off, human, or json", other)),
        }
    }
}
