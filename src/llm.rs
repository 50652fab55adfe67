//! Analysis provider abstraction and implementations.
//!
//! Defines the [`AnalysisProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when no model is configured.
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible chat-completions API
//!   with the prompt templates from [`crate::prompts`] and a strict JSON
//!   output schema.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust,no_run
//! # use text_sleuth::config::LlmConfig;
//! # use text_sleuth::llm::create_provider;
//! let config = LlmConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.name(), "disabled");
//! ```
//!
//! # Failure Policy
//!
//! Each operation makes exactly one HTTP request. There is no retry, and no
//! timeout unless `llm.timeout_secs` is set. Non-2xx responses, malformed
//! bodies, and outputs that do not satisfy the schema are all errors; the
//! dispatcher turns them into a generic user-facing message.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::{AiDetection, AnalysisKind, PlagiarismReport};
use crate::prompts;

/// An external model that performs both analysis operations.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider identifier (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Classifies `text` as AI-generated or human-written.
    async fn detect_ai(&self, text: &str) -> Result<AiDetection>;

    /// Estimates similarity of `text` to online sources.
    async fn check_plagiarism(&self, text: &str) -> Result<PlagiarismReport>;
}

// ============ Disabled Provider ============

/// A provider that always fails.
///
/// Used when `llm.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl AnalysisProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn detect_ai(&self, _text: &str) -> Result<AiDetection> {
        bail!("Analysis provider is disabled")
    }

    async fn check_plagiarism(&self, _text: &str) -> Result<PlagiarismReport> {
        bail!("Analysis provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Provider backed by an OpenAI-compatible `POST /chat/completions` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config, or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    /// Like [`OpenAIProvider::new`], with an explicit API key.
    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for OpenAI provider"))?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Sends one chat completion and returns the message content.
    async fn complete(&self, kind: AnalysisKind, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompts::render(kind, text) }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": prompts::schema_name(kind),
                    "strict": true,
                    "schema": prompts::output_schema(kind),
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("model API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_content(&json)
    }
}

#[async_trait]
impl AnalysisProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn detect_ai(&self, text: &str) -> Result<AiDetection> {
        let content = self.complete(AnalysisKind::AiDetection, text).await?;
        parse_ai_detection(&content)
    }

    async fn check_plagiarism(&self, text: &str) -> Result<PlagiarismReport> {
        let content = self.complete(AnalysisKind::Plagiarism, text).await?;
        parse_plagiarism(&content)
    }
}

/// Extracts `choices[0].message.content` from a chat-completions response.
fn parse_chat_content(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("Invalid model response: missing choices[0].message"))?;

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        bail!("model refused: {}", refusal);
    }

    message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid model response: missing message content"))
}

/// Parses a JSON object, tolerating a surrounding markdown code fence.
fn parse_json_output<T: DeserializeOwned>(content: &str) -> Result<T> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(unfenced.trim())?)
}

/// Validates model output against the AI-detection schema.
pub fn parse_ai_detection(content: &str) -> Result<AiDetection> {
    let result: AiDetection =
        parse_json_output(content).context("output does not match AI-detection schema")?;
    if !(0.0..=1.0).contains(&result.confidence_score) {
        bail!(
            "confidenceScore out of range [0, 1]: {}",
            result.confidence_score
        );
    }
    Ok(result)
}

/// Validates model output against the plagiarism schema.
///
/// Accepts either the JSON object or the textual pattern the prompt asks
/// for (`Similarity Percentage: <n>` / `Source URLs: <a>, <b>`).
pub fn parse_plagiarism(content: &str) -> Result<PlagiarismReport> {
    let report = match parse_json_output::<PlagiarismReport>(content) {
        Ok(report) => report,
        Err(json_err) => parse_plagiarism_pattern(content)
            .with_context(|| format!("output does not match plagiarism schema: {}", json_err))?,
    };
    if !(0.0..=100.0).contains(&report.similarity_percentage) {
        bail!(
            "similarityPercentage out of range [0, 100]: {}",
            report.similarity_percentage
        );
    }
    Ok(report)
}

fn parse_plagiarism_pattern(content: &str) -> Result<PlagiarismReport> {
    let mut similarity = None;
    let mut urls = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = strip_label(line, "similarity percentage:") {
            let number = rest.trim().trim_end_matches('%').trim();
            similarity = Some(
                number
                    .parse::<f64>()
                    .with_context(|| format!("invalid similarity percentage: '{}'", number))?,
            );
        } else if let Some(rest) = strip_label(line, "source urls:") {
            urls.extend(
                rest.split(',')
                    .map(|u| u.trim())
                    .filter(|u| !u.is_empty() && !u.eq_ignore_ascii_case("none") && *u != "...")
                    .map(|u| u.to_string()),
            );
        }
    }

    let similarity_percentage =
        similarity.ok_or_else(|| anyhow!("missing 'Similarity Percentage' line"))?;
    Ok(PlagiarismReport {
        similarity_percentage,
        source_urls: urls,
    })
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(&line[label.len()..])
    } else {
        None
    }
}

/// Create the appropriate [`AnalysisProvider`] based on configuration.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn AnalysisProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
