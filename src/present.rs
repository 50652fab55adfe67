//! Result normalization and rendering.
//!
//! Turns analysis output into display-ready views. Plagiarism reports are
//! schema-locked and rendered directly. AI-detection results are read from
//! loose JSON: the schema fields (`isAiGenerated`, `confidenceScore`) are
//! authoritative, and a fixed list of legacy aliases is probed only when
//! they are absent, for records written by other producers.
//!
//! Every view carries the pretty-printed raw JSON, so nothing is hidden
//! when no recognized field is found.

use serde::Serialize;
use serde_json::Value;

use crate::models::{AnalysisResult, HistoryRecord, PlagiarismReport};

/// Label shown when no classification field is present.
pub const NO_LABEL: &str = "—";
/// State shown for a plagiarism report with no matching sources.
pub const LOOKS_ORIGINAL: &str = "Looks Original!";

const CLASSIFICATION_KEYS: [&str; 4] = ["isAiGenerated", "isGenerated", "is_ai", "isAI"];
const SCORE_KEYS: [&str; 6] = [
    "confidenceScore",
    "probability",
    "score",
    "confidence",
    "aiProbability",
    "similarity",
];
const NOTE_KEYS: [&str; 4] = ["summary", "explanation", "textSnippet", "resultText"];

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiView {
    /// `"AI"`, `"Human"`, or [`NO_LABEL`].
    pub label: String,
    pub is_ai: Option<bool>,
    /// The probed score as found, before scaling.
    pub score: Option<f64>,
    /// Progress-bar value, 0..=100.
    pub percent: u8,
    pub note: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLink {
    /// 1-based position in the model's list.
    pub position: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlagiarismView {
    pub percent: u8,
    pub sources: Vec<SourceLink>,
    pub looks_original: bool,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorView {
    pub message: String,
    pub raw: String,
}

/// A rendered result of either tool, or an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "kebab-case")]
pub enum ResultView {
    AiDetection(AiView),
    Plagiarism(PlagiarismView),
    Error(ErrorView),
}

/// Scales a probed score to a bar value.
///
/// Values in `[0, 1]` are fractions and are multiplied by 100; anything
/// else is taken as a percentage already. Missing scores render as 0.
pub fn score_to_percent(score: Option<f64>) -> u8 {
    let Some(score) = score.filter(|s| s.is_finite()) else {
        return 0;
    };
    let percent = if (0.0..=1.0).contains(&score) {
        score * 100.0
    } else {
        score
    };
    percent.round().clamp(0.0, 100.0) as u8
}

fn raw_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn probe_bool(value: &Value) -> Option<bool> {
    CLASSIFICATION_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_bool))
        .or_else(|| {
            value
                .get("prediction")
                .and_then(Value::as_str)
                .map(|p| p == "ai")
        })
}

fn probe_number(value: &Value) -> Option<f64> {
    SCORE_KEYS.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn probe_note(value: &Value) -> Option<String> {
    NOTE_KEYS.iter().find_map(|key| match value.get(*key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// Normalizes an AI-detection result of any known shape.
pub fn present_ai(value: &Value) -> AiView {
    let is_ai = probe_bool(value);
    let score = probe_number(value);
    let label = match is_ai {
        Some(true) => "AI",
        Some(false) => "Human",
        None => NO_LABEL,
    };
    AiView {
        label: label.to_string(),
        is_ai,
        score,
        percent: score_to_percent(score),
        note: probe_note(value),
        raw: raw_json(value),
    }
}

pub fn present_plagiarism(report: &PlagiarismReport) -> PlagiarismView {
    let sources: Vec<SourceLink> = report
        .source_urls
        .iter()
        .enumerate()
        .map(|(i, url)| SourceLink {
            position: i + 1,
            url: url.clone(),
        })
        .collect();
    PlagiarismView {
        percent: report.similarity_percentage.round().clamp(0.0, 100.0) as u8,
        looks_original: sources.is_empty(),
        sources,
        raw: raw_json(&serde_json::to_value(report).unwrap_or(Value::Null)),
    }
}

pub fn present_result(result: &AnalysisResult) -> ResultView {
    match result {
        AnalysisResult::AiDetection(_) => ResultView::AiDetection(present_ai(&result.to_json())),
        AnalysisResult::Plagiarism(report) => ResultView::Plagiarism(present_plagiarism(report)),
    }
}

/// Picks a view from the shape of `value`: an `error` key renders an error,
/// a well-formed plagiarism report renders as one, anything else goes
/// through AI-detection probing.
pub fn present(value: &Value) -> ResultView {
    if let Some(message) = value.get("error") {
        let message = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return ResultView::Error(ErrorView {
            message,
            raw: raw_json(value),
        });
    }
    if value.get("similarityPercentage").is_some() {
        if let Ok(report) = serde_json::from_value::<PlagiarismReport>(value.clone()) {
            return ResultView::Plagiarism(present_plagiarism(&report));
        }
    }
    ResultView::AiDetection(present_ai(value))
}

fn progress_bar(percent: u8) -> String {
    let filled = (percent as usize * BAR_WIDTH + 50) / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn is_web_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl ResultView {
    pub fn raw(&self) -> &str {
        match self {
            ResultView::AiDetection(v) => &v.raw,
            ResultView::Plagiarism(v) => &v.raw,
            ResultView::Error(v) => &v.raw,
        }
    }

    /// Terminal rendering. With `show_raw`, the raw JSON is appended.
    pub fn render_text(&self, show_raw: bool) -> String {
        let mut out = String::new();
        match self {
            ResultView::AiDetection(v) => {
                out.push_str(&format!("Detection: {}\n", v.label));
                out.push_str(&format!("Score:     {}\n", progress_bar(v.percent)));
                if let Some(note) = &v.note {
                    out.push_str(&format!("\nNotes:\n{}\n", note));
                }
            }
            ResultView::Plagiarism(v) => {
                out.push_str(&format!("Similarity: {}\n", progress_bar(v.percent)));
                if v.looks_original {
                    out.push_str(&format!("\n{}\n", LOOKS_ORIGINAL));
                } else {
                    out.push_str("\nSources:\n");
                    for s in &v.sources {
                        out.push_str(&format!("  {}. {}\n", s.position, s.url));
                    }
                }
            }
            ResultView::Error(v) => {
                out.push_str(&format!("Error: {}\n", v.message));
            }
        }
        if show_raw {
            out.push_str("\nRaw JSON:\n");
            out.push_str(self.raw());
            out.push('\n');
        }
        out
    }

    /// HTML fragment with source URLs as links. All text is escaped.
    pub fn render_html(&self) -> String {
        let mut out = String::new();
        match self {
            ResultView::AiDetection(v) => {
                out.push_str(&format!(
                    "<div class=\"detection\"><span class=\"label\">{}</span><progress max=\"100\" value=\"{}\">{}%</progress></div>",
                    escape_html(&v.label),
                    v.percent,
                    v.percent
                ));
                if let Some(note) = &v.note {
                    out.push_str(&format!(
                        "<div class=\"notes\"><h3>Notes</h3><p>{}</p></div>",
                        escape_html(note)
                    ));
                }
            }
            ResultView::Plagiarism(v) => {
                out.push_str(&format!(
                    "<div class=\"similarity\"><progress max=\"100\" value=\"{}\">{}%</progress></div>",
                    v.percent, v.percent
                ));
                if v.looks_original {
                    out.push_str(&format!(
                        "<p class=\"original\">{}</p>",
                        escape_html(LOOKS_ORIGINAL)
                    ));
                } else {
                    out.push_str("<ol class=\"sources\">");
                    for s in &v.sources {
                        let url = escape_html(&s.url);
                        if is_web_url(&s.url) {
                            out.push_str(&format!(
                                "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
                                url, url
                            ));
                        } else {
                            out.push_str(&format!("<li>{}</li>", url));
                        }
                    }
                    out.push_str("</ol>");
                }
            }
            ResultView::Error(v) => {
                out.push_str(&format!(
                    "<p class=\"error\">{}</p>",
                    escape_html(&v.message)
                ));
            }
        }
        out.push_str(&format!(
            "<details><summary>Raw JSON</summary><pre>{}</pre></details>",
            escape_html(self.raw())
        ));
        out
    }
}

/// One-line summary of a history record for listings.
pub fn history_line(record: &HistoryRecord) -> String {
    const SNIPPET_CHARS: usize = 60;
    let flat: String = record.text.split_whitespace().collect::<Vec<_>>().join(" ");
    let snippet: String = if flat.chars().count() > SNIPPET_CHARS {
        let head: String = flat.chars().take(SNIPPET_CHARS).collect();
        format!("{}…", head)
    } else {
        flat
    };
    format!(
        "{}  {}  {:<16}  {}",
        record.id,
        record
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M"),
        record.kind.title(),
        snippet
    )
}
