//! JSON HTTP server for browser front ends.
//!
//! Exposes both analysis tools and the history store over a small JSON API.
//! Every analysis goes through the same [`Dispatcher`] the CLI uses, so
//! validation, fixed error messages, and history recording are identical.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/api/ai-detection` | Analyze `{ "text": ... }` for AI authorship |
//! | `POST`   | `/api/plagiarism` | Check `{ "text": ... }` for plagiarism |
//! | `POST`   | `/api/ai-detection/upload` | Same, from a multipart `file` field |
//! | `POST`   | `/api/plagiarism/upload` | Same, from a multipart `file` field |
//! | `GET`    | `/api/history` | All history records, oldest first |
//! | `GET`    | `/api/history/{id}` | One record with its rendered view |
//! | `DELETE` | `/api/history/{id}` | Remove one record |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "empty_file", "message": "Empty file: the uploaded file has no text" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `busy` (409),
//! `too_large` (413), `invalid_file` (415), `empty_file` (422),
//! `extraction_failed` (422), `analysis_failed` (502), `internal` (500).
//!
//! # Concurrency
//!
//! Each tool admits one analysis at a time. A request for a tool that is
//! already running is answered with `409 busy` instead of being queued.

use axum::{
    extract::{
        multipart::Multipart,
        rejection::JsonRejection,
        DefaultBodyLimit, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dispatch::{AnalyzeError, Dispatcher};
use crate::extract::{DocumentType, ExtractError};
use crate::history::{HistoryStore, SqliteHistoryStore};
use crate::llm::{create_provider, AnalysisProvider};
use crate::models::{AnalysisKind, AnalysisResult, HistoryRecord, InputError, InputSource, UploadedFile};
use crate::present::{present, present_result, ResultView};

/// Multipart framing overhead allowed on top of `limits.max_upload_bytes`.
const MULTIPART_SLACK_BYTES: u64 = 64 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    history: Arc<dyn HistoryStore>,
    ai_detection: Arc<Mutex<()>>,
    plagiarism: Arc<Mutex<()>>,
    max_upload_bytes: u64,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn AnalysisProvider>,
        history: Arc<dyn HistoryStore>,
        max_upload_bytes: u64,
    ) -> Self {
        let dispatcher = Dispatcher::new(provider)
            .with_history(history.clone())
            .with_upload_limit(max_upload_bytes);
        Self {
            dispatcher: Arc::new(dispatcher),
            history,
            ai_detection: Arc::new(Mutex::new(())),
            plagiarism: Arc::new(Mutex::new(())),
            max_upload_bytes,
        }
    }

    fn guard(&self, kind: AnalysisKind) -> &Mutex<()> {
        match kind {
            AnalysisKind::AiDetection => &self.ai_detection,
            AnalysisKind::Plagiarism => &self.plagiarism,
        }
    }
}

/// Builds the application router. Exposed so tests can drive it in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_SLACK_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/ai-detection", post(handle_detect_text))
        .route("/api/plagiarism", post(handle_plagiarism_text))
        .route("/api/ai-detection/upload", post(handle_detect_upload))
        .route("/api/plagiarism/upload", post(handle_plagiarism_upload))
        .route("/api/history", get(handle_history_list))
        .route(
            "/api/history/{id}",
            get(handle_history_get).delete(handle_history_delete),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind`, opens the SQLite history store, and serves
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider: Arc<dyn AnalysisProvider> = Arc::from(create_provider(&config.llm)?);
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open(config).await?);

    tracing::info!(
        provider = provider.name(),
        db = %config.db.path.display(),
        "starting server"
    );

    let state = AppState::new(provider, history, config.limits.max_upload_bytes);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("TextSleuth server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"empty_file"`).
    code: String,
    /// User-facing message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Maps an extractor rejection, keeping axum's body-limit status.
fn rejection(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "too_large", message)
    } else {
        bad_request(message)
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Internal server error",
    )
}

impl From<AnalyzeError> for AppError {
    fn from(err: AnalyzeError) -> Self {
        let message = err.to_string();
        match err {
            AnalyzeError::Analysis(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "analysis_failed", message)
            }
            AnalyzeError::Input(InputError::EmptyText) => bad_request(message),
            AnalyzeError::Input(InputError::Extract(e)) => match e {
                ExtractError::InvalidFile(_) => {
                    AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "invalid_file", message)
                }
                ExtractError::EmptyFile => {
                    AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "empty_file", message)
                }
                ExtractError::TooLarge { .. } => {
                    AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "too_large", message)
                }
                ExtractError::Encoding | ExtractError::Pdf(_) | ExtractError::Docx(_) => {
                    AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message)
                }
                ExtractError::NoRuntime => internal(anyhow::anyhow!(message)),
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/{tool} ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
}

/// Body returned by every analysis endpoint.
#[derive(Serialize)]
struct AnalyzeResponse {
    /// History record id; `null` when recording failed.
    id: Option<String>,
    result: AnalysisResult,
    view: ResultView,
    /// Escaped HTML fragment of `view`, ready to insert into a page.
    html: String,
}

async fn run_analysis(
    state: &AppState,
    kind: AnalysisKind,
    source: InputSource,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let _running = state.guard(kind).try_lock().map_err(|_| {
        AppError::new(
            StatusCode::CONFLICT,
            "busy",
            format!("A {} is already in progress", kind.title()),
        )
    })?;

    let analysis = state.dispatcher.analyze(kind, source).await?;
    let view = present_result(&analysis.result);
    Ok(Json(AnalyzeResponse {
        id: analysis.record_id,
        result: analysis.result,
        html: view.render_html(),
        view,
    }))
}

async fn analyze_text(
    state: AppState,
    kind: AnalysisKind,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(req) = body.map_err(|e| rejection(e.status(), e.body_text()))?;
    run_analysis(&state, kind, InputSource::FreeText(req.text)).await
}

async fn handle_detect_text(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    analyze_text(state, AnalysisKind::AiDetection, body).await
}

async fn handle_plagiarism_text(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    analyze_text(state, AnalysisKind::Plagiarism, body).await
}

// ============ POST /api/{tool}/upload ============

/// Reads the multipart `file` field into an [`UploadedFile`].
///
/// A part without a content type falls back to the file extension, so
/// clients that omit it still get the allow-list check.
async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = match field.content_type() {
            Some(ct) => ct.to_string(),
            None => DocumentType::from_path(std::path::Path::new(&file_name))
                .map(|t| t.mime().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?;
        return Ok(UploadedFile::new(file_name, mime_type, bytes.to_vec()));
    }
    Err(bad_request("missing multipart field 'file'"))
}

async fn handle_detect_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let file = read_upload(multipart).await?;
    run_analysis(&state, AnalysisKind::AiDetection, InputSource::UploadedDocument(file)).await
}

async fn handle_plagiarism_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let file = read_upload(multipart).await?;
    run_analysis(&state, AnalysisKind::Plagiarism, InputSource::UploadedDocument(file)).await
}

// ============ /api/history ============

#[derive(Serialize)]
struct HistoryListResponse {
    records: Vec<HistoryRecord>,
}

async fn handle_history_list(
    State(state): State<AppState>,
) -> Result<Json<HistoryListResponse>, AppError> {
    let records = state.history.list().await.map_err(internal)?;
    Ok(Json(HistoryListResponse { records }))
}

#[derive(Serialize)]
struct HistoryEntryResponse {
    record: HistoryRecord,
    view: ResultView,
    html: String,
}

async fn handle_history_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntryResponse>, AppError> {
    let record = state
        .history
        .get(&id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no history record with id: {}", id)))?;
    let view = present(&record.result);
    Ok(Json(HistoryEntryResponse {
        record,
        html: view.render_html(),
        view,
    }))
}

async fn handle_history_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.history.delete(&id).await.map_err(internal)? {
        return Err(not_found(format!("no history record with id: {}", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
