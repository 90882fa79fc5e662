//! HTTP surface for the research relay.
//!
//! - `GET /` – Liveness probe.
//! - `POST /upload` – Multipart upload (field `file`); extracts text from a PDF or plain-text
//!   file and returns `{ "summary": ... }`.
//! - `POST /ask` – Relays `{ "messages": [{ "role", "content" }, ...] }` to the completion
//!   provider and returns `{ "answer": ... }`.
//! - `GET /search?q=` – Keyword web search returning `{ "results": [...] }`.
//! - `GET /metrics` – Pipeline counters.
//!
//! Provider and extraction failures are reported in-band with HTTP 200 (`"error: ..."` in the
//! `summary`/`answer` field, or `results: []` plus `error`). Malformed requests get a 4xx with
//! `{ "error": ... }`.

use crate::completion::ChatMessage;
use crate::extraction::UploadedDocument;
use crate::metrics::MetricsSnapshot;
use crate::search::SearchResult;
use crate::service::{AssistantApi, AssistantError, FailureKind};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Browser origins permitted to call the API with credentials.
pub const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

const UPLOAD_FIELD: &str = "file";
const IN_BAND_ERROR_PREFIX: &str = "error: ";

/// Build the HTTP router exposing the relay API surface.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: AssistantApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload_document::<S>))
        .route("/ask", post(ask::<S>))
        .route("/search", get(search::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// CORS policy for the local development front end.
///
/// Methods and headers are mirrored from the preflight request, since wildcards cannot be
/// combined with credentials.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(ALLOWED_ORIGINS.map(HeaderValue::from_static)))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[derive(Serialize)]
struct StatusResponse {
    message: &'static str,
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Backend is running",
    })
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

/// Summarize an uploaded document.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SummaryResponse>, ApiError>
where
    S: AssistantApi,
{
    let mut multipart = multipart.map_err(|rejection| ApiError {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let document = read_upload(&mut multipart).await?;

    let summary = in_band(service.summarize_document(document).await)?;
    Ok(Json(SummaryResponse { summary }))
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadedDocument, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::from)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(ApiError::from)?;
        return Ok(UploadedDocument {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::bad_request(format!(
        "multipart field `{UPLOAD_FIELD}` is required"
    )))
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

/// Relay a chat transcript to the completion provider.
async fn ask<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError>
where
    S: AssistantApi,
{
    let Json(request) = payload.map_err(|rejection| ApiError {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let answer = in_band(service.answer(request.messages).await)?;
    Ok(Json(AskResponse { answer }))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run a keyword web search.
async fn search<S>(
    State(service): State<Arc<S>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError>
where
    S: AssistantApi,
{
    let Query(SearchParams { q }) = params.map_err(|rejection| ApiError {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    match service.search_web(&q).await {
        Ok(results) => Ok(Json(SearchResponse {
            results,
            error: None,
        })),
        Err(err) => Ok(Json(SearchResponse {
            results: Vec::new(),
            error: Some(err.to_string()),
        })),
    }
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: AssistantApi,
{
    Json(service.metrics_snapshot())
}

/// Fold provider and extraction failures into the in-band error string.
fn in_band(outcome: Result<String, AssistantError>) -> Result<String, ApiError> {
    match outcome {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == FailureKind::Validation => Err(ApiError::bad_request(err)),
        Err(err) => Ok(format!("{IN_BAND_ERROR_PREFIX}{err}")),
    }
}

/// Client error returned as `{ "error": message }`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, message = %self.message, "Rejected request");
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
