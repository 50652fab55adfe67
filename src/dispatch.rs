//! Analysis request dispatch.
//!
//! [`Dispatcher::dispatch`] validates text, makes exactly one provider call,
//! and folds every provider failure into an [`AnalysisError`] carrying a
//! fixed per-operation message. The underlying error is logged, never
//! returned. [`Dispatcher::analyze`] adds input resolution (extraction of
//! uploads) in front and a history append behind.

use std::sync::Arc;
use std::time::Instant;

use crate::extract;
use crate::history::HistoryStore;
use crate::llm::AnalysisProvider;
use crate::models::{
    AnalysisError, AnalysisKind, AnalysisResult, HistoryRecord, InputError, InputSource,
};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};

pub const EMPTY_INPUT_MESSAGE: &str = "Text input cannot be empty.";
pub const AI_DETECTION_FAILURE: &str =
    "An unexpected error occurred during analysis. Please try again later.";
pub const PLAGIARISM_FAILURE: &str =
    "An unexpected error occurred while checking for plagiarism. Please try again later.";

/// User-facing message shown when `kind` fails at the provider.
pub fn failure_message(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::AiDetection => AI_DETECTION_FAILURE,
        AnalysisKind::Plagiarism => PLAGIARISM_FAILURE,
    }
}

/// A completed analysis, as returned by [`Dispatcher::analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    /// History record id, when a store is attached and the append succeeded.
    pub record_id: Option<String>,
    /// The text that was analyzed (after extraction, for uploads).
    pub text: String,
    pub result: AnalysisResult,
}

/// Failure of [`Dispatcher::analyze`]: either the input never became
/// analyzable text, or the provider call failed.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

pub struct Dispatcher {
    provider: Arc<dyn AnalysisProvider>,
    history: Option<Arc<dyn HistoryStore>>,
    progress: Arc<dyn ProgressReporter>,
    max_upload_bytes: u64,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self {
            provider,
            history: None,
            progress: Arc::new(NoProgress),
            max_upload_bytes: u64::MAX,
        }
    }

    /// Records every successful [`analyze`](Self::analyze) in `store`.
    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Runs one analysis of `text`.
    ///
    /// Empty or whitespace-only text fails with [`EMPTY_INPUT_MESSAGE`]
    /// without contacting the provider.
    pub async fn dispatch(
        &self,
        kind: AnalysisKind,
        text: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::new(EMPTY_INPUT_MESSAGE));
        }

        tracing::info!(
            kind = %kind,
            provider = self.provider.name(),
            chars = text.chars().count(),
            "dispatching analysis"
        );

        let outcome = match kind {
            AnalysisKind::AiDetection => self
                .provider
                .detect_ai(text)
                .await
                .map(AnalysisResult::AiDetection),
            AnalysisKind::Plagiarism => self
                .provider
                .check_plagiarism(text)
                .await
                .map(AnalysisResult::Plagiarism),
        };

        outcome.map_err(|e| {
            tracing::error!(kind = %kind, error = %format!("{:#}", e), "analysis failed");
            AnalysisError::new(failure_message(kind))
        })
    }

    /// Resolves `source` to text, dispatches it, and appends the outcome to
    /// history on success.
    pub async fn analyze(
        &self,
        kind: AnalysisKind,
        source: InputSource,
    ) -> Result<Analysis, AnalyzeError> {
        if let InputSource::UploadedDocument(file) = &source {
            extract::check_size(file.bytes.len() as u64, self.max_upload_bytes)
                .map_err(InputError::from)?;
            self.progress.report(ProgressEvent::Extracting {
                file: file.file_name.clone(),
            });
        }
        tracing::debug!(kind = %kind, input = %source.describe(), "resolving input");

        let input = source.resolve().await?;

        let started = Instant::now();
        self.progress.report(ProgressEvent::Analyzing { kind });
        let outcome = self.dispatch(kind, input.as_str()).await;
        self.progress.report(ProgressEvent::Finished {
            kind,
            ok: outcome.is_ok(),
            elapsed_ms: started.elapsed().as_millis(),
        });
        let result = outcome?;
        let text = input.into_inner();

        let record_id = match &self.history {
            Some(store) => {
                let record = HistoryRecord::new(kind, text.clone(), result.to_json());
                let id = record.id.clone();
                match store.append(record).await {
                    Ok(()) => Some(id),
                    Err(e) => {
                        tracing::warn!(error = %format!("{:#}", e), "failed to record history");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Analysis {
            record_id,
            text,
            result,
        })
    }
}
