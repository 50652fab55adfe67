//! Core data models used throughout TextSleuth.
//!
//! These types represent the inputs, analysis results, and history records
//! that flow between the extractor, the dispatcher, the presenter, and the
//! history store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::DocumentType;

/// Which external analysis to run.
///
/// Serialized in kebab-case (`ai-detection`, `plagiarism`), which is also the
/// `type` value persisted on [`HistoryRecord`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    AiDetection,
    Plagiarism,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::AiDetection => "ai-detection",
            AnalysisKind::Plagiarism => "plagiarism",
        }
    }

    /// Human-readable tool name, as shown in history listings.
    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::AiDetection => "AI Detection",
            AnalysisKind::Plagiarism => "Plagiarism Check",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai-detection" => Ok(AnalysisKind::AiDetection),
            "plagiarism" => Ok(AnalysisKind::Plagiarism),
            other => anyhow::bail!("unknown analysis kind: '{}'", other),
        }
    }
}

/// Text that has passed validation and may be sent to the model.
///
/// Never empty or whitespace-only; the only way to obtain one is
/// [`AnalysisInput::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput(String);

impl AnalysisInput {
    pub fn new(text: impl Into<String>) -> Result<Self, InputError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(InputError::EmptyText);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Validation failure while turning user input into an [`AnalysisInput`].
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Text input cannot be empty.")]
    EmptyText,
    #[error(transparent)]
    Extract(#[from] crate::extract::ExtractError),
}

/// One user-selected file, immutable once created.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    /// Declared MIME type, as sent by the client.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Builds an upload from a local path, declaring the MIME type from the
    /// file extension. Unknown extensions are declared as
    /// `application/octet-stream` so the extractor rejects them.
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let mime_type = DocumentType::from_path(path)
            .map(|t| t.mime())
            .unwrap_or("application/octet-stream");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, mime_type, bytes))
    }
}

/// Where the text to analyze comes from. Pasted text and an uploaded file
/// are mutually exclusive.
#[derive(Debug, Clone)]
pub enum InputSource {
    FreeText(String),
    UploadedDocument(UploadedFile),
}

impl InputSource {
    /// Produces validated text, extracting uploads on the blocking pool.
    pub async fn resolve(self) -> Result<AnalysisInput, InputError> {
        match self {
            InputSource::FreeText(text) => AnalysisInput::new(text),
            InputSource::UploadedDocument(file) => {
                let text = crate::extract::extract_upload(file).await?;
                AnalysisInput::new(text)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::FreeText(text) => format!("{} chars of text", text.chars().count()),
            InputSource::UploadedDocument(file) => format!("file {}", file.file_name),
        }
    }
}

/// Output schema of the AI-detection prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDetection {
    pub is_ai_generated: bool,
    /// Confidence in `[0, 1]`.
    pub confidence_score: f64,
}

/// Output schema of the plagiarism prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismReport {
    /// Similarity in `[0, 100]`.
    pub similarity_percentage: f64,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

/// A successful analysis. Serialized untagged so the JSON is exactly the
/// schema of whichever operation produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    AiDetection(AiDetection),
    Plagiarism(PlagiarismReport),
}

impl AnalysisResult {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisResult::AiDetection(_) => AnalysisKind::AiDetection,
            AnalysisResult::Plagiarism(_) => AnalysisKind::Plagiarism,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A failed analysis, `{ "error": "<message>" }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error}")]
pub struct AnalysisError {
    pub error: String,
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// One persisted past analysis.
///
/// `result` is kept as loose JSON: records written by older producers may
/// use other field names, which the presenter probes for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    pub text: String,
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(kind: AnalysisKind, text: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            text: text.into(),
            result,
            timestamp: Utc::now(),
        }
    }
}
