//! Prompt templates and output schemas for the two analysis operations.
//!
//! Each operation takes a single `text` input field, substituted into the
//! template at `{{{text}}}`. The output schemas are sent to the model as
//! strict JSON schemas and mirror [`AiDetection`](crate::models::AiDetection)
//! and [`PlagiarismReport`](crate::models::PlagiarismReport).

use serde_json::{json, Value};

use crate::models::AnalysisKind;

const TEXT_PLACEHOLDER: &str = "{{{text}}}";

pub const AI_DETECTION_PROMPT: &str = "You are an AI text detector. Analyze the following text and determine if it was AI-generated or human-written. Return a boolean value for isAiGenerated. Also, return a confidence score between 0 and 1 for the AI detection.

Text: {{{text}}}";

pub const PLAGIARISM_PROMPT: &str = "You are a plagiarism checker. You will receive text as input and check it for plagiarism against online sources. Return the percentage of similarity between the input text and the online sources, as well as the URLs of the sources that match the input text. Use the following format for the output:

Similarity Percentage: <percentage>
Source URLs: <url1>, <url2>, <url3>, ...

Text: {{{text}}}";

/// Fills the template for `kind` with `text`.
pub fn render(kind: AnalysisKind, text: &str) -> String {
    let template = match kind {
        AnalysisKind::AiDetection => AI_DETECTION_PROMPT,
        AnalysisKind::Plagiarism => PLAGIARISM_PROMPT,
    };
    template.replace(TEXT_PLACEHOLDER, text)
}

/// Schema name reported to the model.
pub fn schema_name(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::AiDetection => "analyze_text_for_ai",
        AnalysisKind::Plagiarism => "check_text_for_plagiarism",
    }
}

/// JSON schema of the operation's structured output.
pub fn output_schema(kind: AnalysisKind) -> Value {
    match kind {
        AnalysisKind::AiDetection => json!({
            "type": "object",
            "properties": {
                "isAiGenerated": {
                    "type": "boolean",
                    "description": "Whether the text is AI-generated or not."
                },
                "confidenceScore": {
                    "type": "number",
                    "description": "The confidence score of the AI detection."
                }
            },
            "required": ["isAiGenerated", "confidenceScore"],
            "additionalProperties": false
        }),
        AnalysisKind::Plagiarism => json!({
            "type": "object",
            "properties": {
                "similarityPercentage": {
                    "type": "number",
                    "description": "The percentage of similarity between the input text and online sources."
                },
                "sourceUrls": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "The URLs of the sources that match the input text."
                }
            },
            "required": ["similarityPercentage", "sourceUrls"],
            "additionalProperties": false
        }),
    }
}
