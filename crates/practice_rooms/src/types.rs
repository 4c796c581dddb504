use std::sync::Arc;

use crate::db::ReservationDbManager;
use crate::ingest::{Ingestor, RefreshQueue};

/// Shared state handed to every request handler.
pub struct AppState {
    /// Read side of the reservations table
    pub reservation_db: Arc<ReservationDbManager>,
    /// Runs ingestion synchronously (`POST /api/ingest`)
    pub ingestor: Arc<Ingestor>,
    /// Runs ingestion in the background (`/api/refresh_data`)
    pub refresh_queue: RefreshQueue,
}

impl AppState {
    /// Builds the state and starts the refresh worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(reservation_db: Arc<ReservationDbManager>, ingestor: Arc<Ingestor>) -> Self {
        let refresh_queue = RefreshQueue::start(ingestor.clone());
        Self {
            reservation_db,
            ingestor,
            refresh_queue,
        }
    }
}
