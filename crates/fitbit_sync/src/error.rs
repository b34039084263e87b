//! Error types for the sync service.

use thiserror::Error;

/// Failure of a single sink write. Never fatal: the buffer keeps its points.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Sync service errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("API error: {0}")]
    Api(#[from] fitbit_client::FitbitError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Timezone unavailable: {0}")]
    Timezone(String),
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
