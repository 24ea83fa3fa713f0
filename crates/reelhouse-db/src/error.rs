//! Database error types.

use reelhouse_core::ExternalId;
use thiserror::Error;

/// Catalog store errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create the database.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// No record exists for the identifier.
    #[error("no catalog record for external id {external_id}")]
    NotFound {
        /// Missing identifier
        external_id: ExternalId,
    },

    /// A record already exists for the identifier.
    ///
    /// Raised by `create`; callers racing on the same identifier see this
    /// instead of a duplicate record.
    #[error("catalog record for external id {external_id} already exists")]
    Conflict {
        /// Duplicated identifier
        external_id: ExternalId,
    },

    /// Failed to decode a stored value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization of a field group failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
