//! Scheduler error types.

use thiserror::Error;

/// Errors reading or writing schedule state.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// State file could not be read or written
    #[error("schedule state I/O error at {path}: {source}")]
    Io {
        /// State file path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// State file is not valid JSON
    #[error("invalid schedule state: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored timestamp could not be parsed
    #[error("invalid timestamp '{0}' in schedule state")]
    InvalidTimestamp(String),
}

/// Result type alias using `SchedulerError`.
pub type Result<T> = std::result::Result<T, SchedulerError>;
