//! HTTP surface for the document pipeline.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /documents?filename=<name>` – Run the raw request body through extraction, validation,
//!   embedding, and summarization, returning the `DocumentReport` JSON. The file name selects the
//!   conversion route (`.pdf`, office formats, plain text).
//! - `GET /health` – Tool availability and the summarization strategy selected at start-up.
//! - `GET /metrics` – Observe processing counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Stage failures map to `422` for unusable input, `502` for failing backends, and `504` for
//! timeouts, with a `{ "stage", "error" }` body.

use crate::embedding::EmbeddingError;
use crate::extraction::ExtractionError;
use crate::metrics::MetricsSnapshot;
use crate::processing::{Document, DocumentReport, HealthReport, PipelineApi, PipelineError};
use crate::validation::ValidationError;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the pipeline, accepting uploads up to `max_upload_bytes`.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/documents", post(process_document::<S>))
        .route("/health", get(get_health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

/// Query string for `POST /documents`.
#[derive(Deserialize)]
struct UploadParams {
    /// Original file name; its extension selects the conversion route.
    filename: String,
}

/// Process an uploaded document end to end.
async fn process_document<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<DocumentReport>, AppError>
where
    S: PipelineApi,
{
    let document = Document::from_bytes(params.filename, body.to_vec());
    tracing::info!(
        doc_id = document.id(),
        source = document.source(),
        bytes = document.bytes().len(),
        "Document upload received"
    );
    let report = service.process_document(document).await?;
    Ok(Json(report))
}

/// Report dependency status.
async fn get_health<S>(State(service): State<Arc<S>>) -> (StatusCode, Json<HealthReport>)
where
    S: PipelineApi,
{
    let report = service.health().await;
    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Return the processing counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "process_document",
                method: "POST",
                path: "/documents?filename=<name>",
                description: "Extract, check, embed, and summarize the raw file sent as the request body. Returns the document report with pages, validation, embedding, and a summary of at most 250 words.",
                request_example: Some(json!({
                    "query": { "filename": "K240287.pdf" },
                    "body": "<raw PDF bytes>"
                })),
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Report converter availability and the summarization strategy in use.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return processing counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

struct AppError(PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Ingest { .. }
            | PipelineError::Validation(ValidationError::EmptyText) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PipelineError::Validation(ValidationError::Interrupted(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Extraction(error) => match error {
                ExtractionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ExtractionError::ToolMissing { .. } | ExtractionError::Io(_) => {
                    StatusCode::BAD_GATEWAY
                }
                ExtractionError::EmptyInput
                | ExtractionError::Corrupt(_)
                | ExtractionError::UnsupportedFormat(_)
                | ExtractionError::ToolFailed { .. }
                | ExtractionError::NoText(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
            PipelineError::Embedding(error) => match error {
                EmbeddingError::EmptyText => StatusCode::UNPROCESSABLE_ENTITY,
                EmbeddingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                EmbeddingError::Chunking(_)
                | EmbeddingError::Backend(_)
                | EmbeddingError::DimensionMismatch { .. } => StatusCode::BAD_GATEWAY,
            },
            PipelineError::Summarization(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "stage": self.0.stage(),
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
