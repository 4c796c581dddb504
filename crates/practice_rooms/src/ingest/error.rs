//! Error types for the ingestion pipeline.

use chrono::Weekday;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while ingesting reservations.
///
/// Only [`IngestError::is_fatal`] errors end a run; the rest are contained to
/// one (date, category) pair or one record.
#[derive(Debug, Error, Clone)]
pub enum IngestError {
    /// Target date is not a valid `YYYY-MM-DD` date
    #[error("Invalid date format: {input}. Please use YYYY-MM-DD.")]
    InvalidDate { input: String },

    /// No board URL configured for this category/weekday
    #[error("No URL mapping found for category: {category} on {day}")]
    MissingSourceMapping { category: String, day: Weekday },

    /// Network error or non-success response
    #[error("Error fetching URL {url}: {message}")]
    FetchFailure { url: String, message: String },

    /// The page has no script block carrying injected articles
    #[error("No script tag containing '{marker}' found in {url}")]
    StructuralAnomaly { url: String, marker: &'static str },

    /// A title did not match `id/name/M.D/HH-HH`
    #[error("Title did not match expected format: {title}")]
    TitleParseMismatch { title: String },

    /// Reading or writing the reservations table failed
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// The source table could not be loaded
    #[error("Invalid source configuration: {message}")]
    Config { message: String },

    /// The run did not finish within the run timeout
    #[error("Ingestion timed out after {after:?}")]
    Timeout { after: Duration },

    /// The refresh worker is gone
    #[error("Refresh queue is not running")]
    QueueClosed,
}

impl IngestError {
    /// Returns true if this error aborts the whole run rather than one pair or record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidDate { .. }
                | IngestError::Storage { .. }
                | IngestError::Config { .. }
                | IngestError::Timeout { .. }
                | IngestError::QueueClosed
        )
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::FetchFailure {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Storage {
            message: err.to_string(),
        }
    }
}
