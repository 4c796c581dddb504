use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{refresh, reservations, status};
use crate::types::AppState;

mod endpoints;
mod types;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/reservations", get(reservations::get_reservations))
        .route("/categories", get(reservations::get_categories))
        .route("/refresh_data", get(refresh::get_refresh_data))
        .route("/refresh_data/:job_id", get(refresh::get_refresh_status))
        .route("/ingest", post(refresh::post_ingest));

    Router::new()
        .route("/health", get(status::get_health))
        .nest("/api", api_router)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ReservationDbManager;
    use crate::ingest::{Ingestor, PageFetcher, ReservationRecord, SourceConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct NoPages;

    #[async_trait::async_trait]
    impl PageFetcher for NoPages {
        async fn fetch_page(&self, url: &str) -> Result<String, crate::ingest::IngestError> {
            Err(crate::ingest::IngestError::FetchFailure {
                url: url.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    struct SlowPages;

    #[async_trait::async_trait]
    impl PageFetcher for SlowPages {
        async fn fetch_page(&self, _url: &str) -> Result<String, crate::ingest::IngestError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }
    }

    fn record(category: &str, room: &str, day: u32, slot: &str) -> ReservationRecord {
        ReservationRecord {
            category: category.to_string(),
            room_name: room.to_string(),
            student_id: "123".to_string(),
            student_name: "Jane Doe".to_string(),
            reservation_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            reservation_time_slot: slot.to_string(),
            original_title: "123/Jane Doe/6.15/23-02".to_string(),
            crawled_at: "2024-06-15 08:00:00".to_string(),
        }
    }

    fn app() -> Router {
        let db = Arc::new(ReservationDbManager::open_in_memory().unwrap());
        db.insert_reservations(&[
            record("Studio/Lab/Lounge", "Studio B", 15, "23-24"),
            record("Drum Room", "Drum A", 15, "10-12"),
            record("Studio/Lab/Lounge", "Studio B", 16, "00-02"),
        ])
        .unwrap();

        let ingestor = Arc::new(Ingestor::new(
            db.clone(),
            Arc::new(SourceConfig::empty()),
            Arc::new(NoPages),
        ));
        create_router(Arc::new(AppState::new(db, ingestor)))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(app(), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_reservations_for_date_sorted() {
        let (status, body) = call(app(), "GET", "/api/reservations?date=2024-06-15&category=all").await;
        assert_eq!(status, StatusCode::OK);

        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["room_name"], "Drum A");
        assert_eq!(rows[1]["room_name"], "Studio B");
        assert_eq!(rows[1]["reservation_date"], "2024-06-15");
        assert_eq!(rows[1]["reservation_time_slot"], "23-24");
    }

    #[tokio::test]
    async fn test_reservations_category_filter() {
        let (_, body) = call(app(), "GET", "/api/reservations?date=2024-06-15&category=Studio").await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["category"], "Studio/Lab/Lounge");
    }

    #[tokio::test]
    async fn test_reservations_all_ignores_case() {
        let (_, body) = call(app(), "GET", "/api/reservations?date=2024-06-15&category=ALL").await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reservations_empty_and_invalid_dates() {
        let (status, body) = call(app(), "GET", "/api/reservations?date=2030-01-01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(vec![]));

        let (status, body) = call(app(), "GET", "/api/reservations?date=bad-date").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid date");
    }

    #[tokio::test]
    async fn test_sync_ingest_rejects_bad_date_without_mutation() {
        let app = app();
        let (status, _) = call(app.clone(), "POST", "/api/ingest?date=bad-date&category=all").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(app, "GET", "/api/reservations?date=2024-06-15").await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_ingest_reports_skips() {
        let (status, body) = call(app(), "POST", "/api/ingest?date=2024-06-16&category=all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"], Value::Array(vec![]));
        assert_eq!(body["skipped_pairs"], 6);
        assert_eq!(body["window"]["previous"], "2024-06-15");
    }

    #[tokio::test]
    async fn test_sync_ingest_timeout_is_gateway_timeout() {
        let db = Arc::new(ReservationDbManager::open_in_memory().unwrap());
        let sources = SourceConfig::from_json(
            r#"{"categories": {"드럼 연습실": {"Sun": "https://example.com/drum/sun"}}}"#,
        )
        .unwrap();
        let ingestor = Arc::new(
            Ingestor::new(db.clone(), Arc::new(sources), Arc::new(SlowPages))
                .with_run_timeout(Duration::from_millis(50)),
        );
        let app = create_router(Arc::new(AppState::new(db, ingestor)));

        let (status, body) = call(app, "POST", "/api/ingest?date=2024-06-16&category=all").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "Ingestion timed out");
    }

    #[tokio::test]
    async fn test_refresh_is_queued_and_queryable() {
        let app = app();
        let (status, body) = call(app.clone(), "GET", "/api/refresh_data?date=2024-06-16").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "refresh started");

        let job_id = body["job_id"].as_str().unwrap().to_string();
        let (status, body) = call(app.clone(), "GET", &format!("/api/refresh_data/{job_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "all");

        let (status, _) = call(app, "GET", "/api/refresh_data/does-not-exist").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_categories() {
        let (_, body) = call(app(), "GET", "/api/categories").await;
        assert_eq!(
            body,
            serde_json::json!(["스튜디오/랩/라운지", "일반 연습실", "드럼 연습실"])
        );
    }
}
