//! Endpoints that trigger ingestion.
//!
//! `/api/refresh_data` queues a run and returns immediately; `/api/ingest`
//! blocks until the run finishes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ingest::{log_run_result, IngestError};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Query parameters shared by the trigger endpoints.
#[derive(Debug, Deserialize)]
pub struct RefreshParams {
    /// `YYYY-MM-DD`; defaults to today
    pub date: Option<String>,
    /// A category name, or `all` (the default)
    pub category: Option<String>,
}

impl RefreshParams {
    fn resolve(self) -> (String, String) {
        let date = self
            .date
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());
        let category = self
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "all".to_string());
        (date, category)
    }
}

/// Converts a run-level IngestError to an API response.
fn ingest_error_to_response(error: IngestError) -> Response {
    let (status, message) = match &error {
        IngestError::InvalidDate { .. } => (StatusCode::BAD_REQUEST, "Invalid date"),
        IngestError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "Ingestion timed out"),
        IngestError::QueueClosed => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Refresh worker is not running",
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Ingestion failed"),
    };

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}

/// GET /api/refresh_data
///
/// Queues a refresh and returns its job id.
pub async fn get_refresh_data(
    State(s): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Response {
    let (date, category) = params.resolve();
    info!("GET /api/refresh_data date={} category={}", date, category);

    match s.refresh_queue.submit(&date, &category) {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "refresh started", "job_id": job_id })),
        )
            .into_response(),
        Err(e) => ingest_error_to_response(e),
    }
}

/// GET /api/refresh_data/:job_id
///
/// Returns the state of a queued refresh.
pub async fn get_refresh_status(
    Path(job_id): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    match s.refresh_queue.status(&job_id) {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => {
            warn!("Refresh job not found: {}", job_id);
            ApiErrorType::from((
                StatusCode::NOT_FOUND,
                "Refresh job not found",
                Some(format!("No refresh job with ID: {}", job_id)),
            ))
            .into_response()
        }
    }
}

/// POST /api/ingest
///
/// Runs ingestion and waits for it, returning the full report.
pub async fn post_ingest(
    State(s): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Response {
    let (date, category) = params.resolve();
    info!("POST /api/ingest date={} category={}", date, category);

    let result = s.ingestor.ingest_bounded(&date, &category).await;
    log_run_result("api", &date, &category, &result);

    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => ingest_error_to_response(e),
    }
}
