//! Read-only access to stored reservations.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::ingest::Category;
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Query parameters for `GET /api/reservations`.
#[derive(Debug, Deserialize)]
pub struct ReservationQueryParams {
    /// `YYYY-MM-DD`; defaults to today
    pub date: Option<String>,
    /// Category substring, or `all` (the default)
    pub category: Option<String>,
}

/// GET /api/reservations
///
/// Returns the reservations on a date, ordered by room then time slot.
pub async fn get_reservations(
    State(s): State<Arc<AppState>>,
    Query(params): Query<ReservationQueryParams>,
) -> Response {
    let date = match params.date.as_deref().map(str::trim) {
        None | Some("") => Local::now().date_naive(),
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return ApiErrorType::from((
                    StatusCode::BAD_REQUEST,
                    "Invalid date",
                    Some(format!("Invalid date format: {}. Please use YYYY-MM-DD.", raw)),
                ))
                .into_response()
            }
        },
    };

    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"));

    info!("GET /api/reservations date={} category={:?}", date, category);

    match s.reservation_db.get_reservations(date, category) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!("Failed to query reservations: {}", e);
            ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}

/// GET /api/categories
///
/// Returns the room categories, in scrape order.
pub async fn get_categories() -> Response {
    (StatusCode::OK, Json(Category::ALL)).into_response()
}
