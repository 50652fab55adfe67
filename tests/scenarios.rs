//! End-to-end analyses with a substitute provider: input, dispatch,
//! presentation, and history together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use text_sleuth::dispatch::Dispatcher;
use text_sleuth::history::{HistoryStore, MemoryHistoryStore};
use text_sleuth::llm::AnalysisProvider;
use text_sleuth::models::{AiDetection, AnalysisKind, InputSource, PlagiarismReport};
use text_sleuth::present::{present, present_result, ResultView, LOOKS_ORIGINAL};

const FOX_ESSAY: &str = "The quick brown fox jumps over the lazy dog while the farmer \
watches from the porch and wonders whether the dog will ever wake up before sunset. \
Meanwhile the fox circles back across the field, pausing near the barn to listen \
for footsteps, and disappears into grass beyond the fence.";

struct ScriptedProvider {
    calls: AtomicUsize,
    detection: AiDetection,
    report: PlagiarismReport,
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn detect_ai(&self, _text: &str) -> Result<AiDetection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detection.clone())
    }

    async fn check_plagiarism(&self, _text: &str) -> Result<PlagiarismReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }
}

fn scripted(detection: AiDetection, report: PlagiarismReport) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider {
        calls: AtomicUsize::new(0),
        detection,
        report,
    })
}

#[tokio::test]
async fn fox_essay_detected_as_ai_at_87_percent() {
    assert_eq!(FOX_ESSAY.split_whitespace().count(), 50);

    let provider = scripted(
        AiDetection {
            is_ai_generated: true,
            confidence_score: 0.87,
        },
        PlagiarismReport {
            similarity_percentage: 0.0,
            source_urls: vec![],
        },
    );
    let store = Arc::new(MemoryHistoryStore::new());
    let dispatcher = Dispatcher::new(provider.clone()).with_history(store.clone());

    let analysis = dispatcher
        .analyze(
            AnalysisKind::AiDetection,
            InputSource::FreeText(FOX_ESSAY.to_string()),
        )
        .await
        .unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let view = present_result(&analysis.result);
    let ResultView::AiDetection(ai) = &view else {
        panic!("expected AI view, got {:?}", view);
    };
    assert_eq!(ai.label, "AI");
    assert_eq!(ai.percent, 87);

    let text = view.render_text(true);
    assert!(text.contains("Detection: AI"));
    assert!(text.contains("87%"));
    assert!(text.contains("\"confidenceScore\": 0.87"));

    // the stored record renders the same way
    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, FOX_ESSAY);
    assert_eq!(present(&records[0].result), view);
}

#[tokio::test]
async fn original_text_shows_looks_original() {
    let provider = scripted(
        AiDetection {
            is_ai_generated: false,
            confidence_score: 0.05,
        },
        PlagiarismReport {
            similarity_percentage: 0.0,
            source_urls: vec![],
        },
    );
    let dispatcher = Dispatcher::new(provider);

    let analysis = dispatcher
        .analyze(
            AnalysisKind::Plagiarism,
            InputSource::FreeText(FOX_ESSAY.to_string()),
        )
        .await
        .unwrap();

    let view = present_result(&analysis.result);
    let ResultView::Plagiarism(plag) = &view else {
        panic!("expected plagiarism view, got {:?}", view);
    };
    assert!(plag.looks_original);
    assert!(plag.sources.is_empty());
    assert!(view.render_text(false).contains(LOOKS_ORIGINAL));
    assert!(view.render_html().contains(LOOKS_ORIGINAL));
}

#[tokio::test]
async fn matching_sources_keep_model_order_as_links() {
    let urls = vec![
        "https://b.example/second-alphabetically".to_string(),
        "https://a.example/first-alphabetically".to_string(),
        "ftp://files.example/not-a-link".to_string(),
    ];
    let provider = scripted(
        AiDetection {
            is_ai_generated: false,
            confidence_score: 0.5,
        },
        PlagiarismReport {
            similarity_percentage: 64.4,
            source_urls: urls.clone(),
        },
    );
    let dispatcher = Dispatcher::new(provider);

    let analysis = dispatcher
        .analyze(
            AnalysisKind::Plagiarism,
            InputSource::FreeText(FOX_ESSAY.to_string()),
        )
        .await
        .unwrap();

    let view = present_result(&analysis.result);
    let ResultView::Plagiarism(plag) = &view else {
        panic!("expected plagiarism view, got {:?}", view);
    };
    assert_eq!(plag.percent, 64);
    let listed: Vec<&str> = plag.sources.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(listed, urls.iter().map(String::as_str).collect::<Vec<_>>());

    let html = view.render_html();
    assert!(html.contains("<a href=\"https://b.example/second-alphabetically\""));
    assert!(html.find("b.example").unwrap() < html.find("a.example").unwrap());
    assert!(!html.contains("<a href=\"ftp://"));
}

#[test]
fn legacy_alias_records_render_like_schema_records() {
    let schema = present(&json!({ "isAiGenerated": true, "confidenceScore": 0.87 }));
    for legacy in [
        json!({ "isGenerated": true, "probability": 0.87 }),
        json!({ "is_ai": true, "score": 87 }),
        json!({ "isAI": true, "confidence": "0.87" }),
        json!({ "prediction": "ai", "aiProbability": 0.87 }),
    ] {
        let ResultView::AiDetection(expected) = &schema else {
            panic!("schema record should render as AI detection");
        };
        let ResultView::AiDetection(got) = present(&legacy) else {
            panic!("legacy record should render as AI detection");
        };
        assert_eq!(got.label, expected.label, "record {}", legacy);
        assert_eq!(got.percent, expected.percent, "record {}", legacy);
    }
}
