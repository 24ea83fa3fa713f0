//! Error types for external source calls.

use reelhouse_core::Source;
use thiserror::Error;

/// Errors that can occur when calling an external source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source answered 429; retry later
    #[error("{origin} rate limited the request (status {status})")]
    RateLimited {
        /// Source that throttled
        origin: Source,
        /// HTTP status code
        status: u16,
    },

    /// Any other non-success status; do not retry
    #[error("{origin} returned status {status}: {message}")]
    Upstream {
        /// Source that failed
        origin: Source,
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The source has no entry for the requested key
    #[error("{origin} has no entry for {key}")]
    NotFound {
        /// Source queried
        origin: Source,
        /// Key that was looked up
        key: String,
    },

    /// A required credential is not configured
    #[error("no credential configured for {origin}")]
    MissingCredential {
        /// Source lacking a credential
        origin: Source,
    },

    /// Response body could not be decoded
    #[error("failed to decode response from {origin}: {message}")]
    Decode {
        /// Source that answered
        origin: Source,
        /// Decoder message
        message: String,
    },

    /// Invalid request URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl SourceError {
    /// Whether the call may succeed if retried later.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Map a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(origin: Source, status: u16, message: impl Into<String>) -> Self {
        if status == 429 {
            Self::RateLimited { origin, status }
        } else {
            Self::Upstream {
                origin,
                status,
                message: message.into(),
            }
        }
    }
}

/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
