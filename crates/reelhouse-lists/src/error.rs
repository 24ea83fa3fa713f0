//! Error types for reference list loading.

use thiserror::Error;

/// Errors that can occur while loading or writing reference lists.
#[derive(Error, Debug)]
pub enum ListError {
    /// A required list file does not exist
    #[error("reference list not found at {path}")]
    NotFound {
        /// Expected file path
        path: String,
    },

    /// Failed to read or write a list file
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a JSON list
    #[error("failed to parse JSON in {path}: {source}")]
    Json {
        /// File path
        path: String,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A list line could not be interpreted
    #[error("invalid entry in {path} at line {line}: {reason}")]
    InvalidEntry {
        /// File path
        path: String,
        /// 1-based line number
        line: usize,
        /// Reason for rejection
        reason: String,
    },
}

impl ListError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.display().to_string(),
            }
        } else {
            Self::Io {
                path: path.display().to_string(),
                source,
            }
        }
    }
}

/// Result type for list operations.
pub type Result<T> = std::result::Result<T, ListError>;
