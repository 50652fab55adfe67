//! HTTP API tests, driven in-process through the router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use text_sleuth::dispatch::{AI_DETECTION_FAILURE, EMPTY_INPUT_MESSAGE};
use text_sleuth::history::{HistoryStore, MemoryHistoryStore};
use text_sleuth::llm::{AnalysisProvider, DisabledProvider};
use text_sleuth::models::{AiDetection, PlagiarismReport};
use text_sleuth::server::{router, AppState};

const BOUNDARY: &str = "sleuth-test-boundary";

#[derive(Default)]
struct FixedProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl AnalysisProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn detect_ai(&self, _text: &str) -> Result<AiDetection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AiDetection {
            is_ai_generated: true,
            confidence_score: 0.87,
        })
    }

    async fn check_plagiarism(&self, _text: &str) -> Result<PlagiarismReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PlagiarismReport {
            similarity_percentage: 42.0,
            source_urls: vec![
                "https://example.com/a".to_string(),
                "https://example.org/b".to_string(),
            ],
        })
    }
}

fn app_with(provider: Arc<dyn AnalysisProvider>) -> (Router, Arc<MemoryHistoryStore>) {
    let history = Arc::new(MemoryHistoryStore::new());
    let state = AppState::new(provider, history.clone(), 1024 * 1024);
    (router(state), history)
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(uri: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_version() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let (status, body) = send(&app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ai_detection_returns_result_and_view() {
    let (app, history) = app_with(Arc::new(FixedProvider::default()));
    let (status, body) = send(
        &app,
        json_request("/api/ai-detection", json!({ "text": "Some pasted essay" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({ "isAiGenerated": true, "confidenceScore": 0.87 }));
    assert_eq!(body["view"]["view"], "ai-detection");
    assert_eq!(body["view"]["label"], "AI");
    assert_eq!(body["view"]["percent"], 87);
    assert!(body["html"].as_str().unwrap().contains("value=\"87\""));

    let records = history.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(body["id"], records[0].id.as_str());
}

#[tokio::test]
async fn plagiarism_lists_sources_in_order() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let (status, body) = send(
        &app,
        json_request("/api/plagiarism", json!({ "text": "Some pasted essay" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"]["view"], "plagiarism");
    assert_eq!(body["view"]["percent"], 42);
    assert_eq!(body["view"]["looks_original"], false);
    assert_eq!(body["view"]["sources"][0]["url"], "https://example.com/a");
    assert_eq!(body["view"]["sources"][1]["url"], "https://example.org/b");
}

#[tokio::test]
async fn empty_text_is_bad_request_without_provider_call() {
    let provider = Arc::new(FixedProvider::default());
    let (app, history) = app_with(provider.clone());

    let (status, body) = send(&app, json_request("/api/ai-detection", json!({ "text": "  \n" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], EMPTY_INPUT_MESSAGE);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert!(history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_body_uses_error_contract() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let req = Request::builder()
        .method("POST")
        .uri("/api/plagiarism")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn provider_failure_is_fixed_message() {
    let (app, history) = app_with(Arc::new(DisabledProvider));
    let (status, body) = send(
        &app,
        json_request("/api/ai-detection", json!({ "text": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "analysis_failed");
    assert_eq!(body["error"]["message"], AI_DETECTION_FAILURE);
    assert!(history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn text_upload_is_analyzed() {
    let provider = Arc::new(FixedProvider::default());
    let (app, history) = app_with(provider.clone());
    let (status, body) = send(
        &app,
        upload_request(
            "/api/ai-detection/upload",
            "essay.txt",
            "text/plain",
            b"An essay from a file.",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"]["label"], "AI");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(history.list().await.unwrap()[0].text, "An essay from a file.");
}

#[tokio::test]
async fn zero_byte_upload_is_empty_file() {
    let provider = Arc::new(FixedProvider::default());
    let (app, _) = app_with(provider.clone());
    let (status, body) = send(
        &app,
        upload_request("/api/plagiarism/upload", "empty.txt", "text/plain", b""),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "empty_file");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Empty file"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disallowed_upload_is_unsupported_media_type() {
    let provider = Arc::new(FixedProvider::default());
    let (app, _) = app_with(provider.clone());
    let (status, body) = send(
        &app,
        upload_request(
            "/api/ai-detection/upload",
            "photo.png",
            "image/png",
            &[0x89, b'P', b'N', b'G'],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "invalid_file");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn corrupt_pdf_is_extraction_failure() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let (status, body) = send(
        &app,
        upload_request(
            "/api/ai-detection/upload",
            "broken.pdf",
            "application/pdf",
            b"not a valid pdf",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "extraction_failed");
    assert_eq!(body["error"]["message"], "Failed to extract text from PDF");
}

#[tokio::test]
async fn oversized_upload_is_too_large_at_any_size() {
    let provider = Arc::new(FixedProvider::default());
    let (app, _) = app_with(provider.clone());

    // just over the upload limit, and past the multipart framing allowance
    for size in [1024 * 1024 + 10, 1024 * 1024 + 200 * 1024] {
        let bytes = vec![b'a'; size];
        let (status, body) = send(
            &app,
            upload_request("/api/ai-detection/upload", "big.txt", "text/plain", &bytes),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "size {}", size);
        assert_eq!(body["error"]["code"], "too_large", "size {}", size);
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_json_body_is_too_large() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let text = "a".repeat(1024 * 1024 + 200 * 1024);
    let (status, body) = send(&app, json_request("/api/plagiarism", json!({ "text": text }))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "too_large");
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let req = Request::builder()
        .method("POST")
        .uri("/api/plagiarism/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn history_get_and_delete() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));

    let (_, first) = send(&app, json_request("/api/ai-detection", json!({ "text": "first" }))).await;
    let (_, second) = send(&app, json_request("/api/plagiarism", json!({ "text": "second" }))).await;
    let first_id = first["id"].as_str().unwrap().to_string();
    let second_id = second["id"].as_str().unwrap().to_string();

    let (status, list) = send(&app, get_request("/api/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["records"].as_array().unwrap().len(), 2);
    assert_eq!(list["records"][0]["type"], "ai-detection");
    assert_eq!(list["records"][1]["type"], "plagiarism");

    let (status, entry) = send(&app, get_request(&format!("/api/history/{}", second_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["record"]["text"], "second");
    assert_eq!(entry["view"]["view"], "plagiarism");

    let (status, deleted) = send(&app, delete_request(&format!("/api/history/{}", first_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], true);

    let (status, body) = send(&app, delete_request(&format!("/api/history/{}", first_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (_, list) = send(&app, get_request("/api/history")).await;
    let records = list["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], second_id.as_str());
}

#[tokio::test]
async fn unknown_history_id_is_not_found() {
    let (app, _) = app_with(Arc::new(FixedProvider::default()));
    let (status, body) = send(&app, get_request("/api/history/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

/// Blocks AI detection until released.
#[derive(Default)]
struct GatedProvider {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl AnalysisProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn detect_ai(&self, _text: &str) -> Result<AiDetection> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(AiDetection {
            is_ai_generated: false,
            confidence_score: 0.1,
        })
    }

    async fn check_plagiarism(&self, _text: &str) -> Result<PlagiarismReport> {
        Ok(PlagiarismReport {
            similarity_percentage: 0.0,
            source_urls: vec![],
        })
    }
}

#[tokio::test]
async fn second_request_for_busy_tool_is_rejected() {
    let provider = Arc::new(GatedProvider::default());
    let (app, _) = app_with(provider.clone());

    let first = tokio::spawn(
        app.clone()
            .oneshot(json_request("/api/ai-detection", json!({ "text": "one" }))),
    );
    provider.entered.notified().await;

    let (status, body) = send(&app, json_request("/api/ai-detection", json!({ "text": "two" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "busy");

    // the other tool is independent
    let (status, body) = send(&app, json_request("/api/plagiarism", json!({ "text": "three" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"]["looks_original"], true);

    provider.release.notify_one();
    let resp = first.await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
