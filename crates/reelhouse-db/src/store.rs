//! The narrow persistence interface consumed by the pipeline.

use crate::error::Result;
use crate::patch::{Flag, RecordPatch};
use async_trait::async_trait;
use reelhouse_core::{CatalogRecord, ExternalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of shared reference entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Genre, keyed by name
    Genre,
    /// Streaming provider, keyed by normalized name
    Provider,
}

impl ReferenceKind {
    /// Stored kind name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared reference entity, created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    /// Store-assigned id
    pub id: i64,
    /// Entity kind
    pub kind: ReferenceKind,
    /// Natural key (the name)
    pub key: String,
}

/// Catalog persistence.
///
/// Implementations must make `create` fail with
/// [`DatabaseError::Conflict`](crate::DatabaseError::Conflict) when a record
/// with the same external id exists, and must apply each [`RecordPatch`]
/// atomically.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a record.
    async fn get_by_external_id(&self, id: ExternalId) -> Result<Option<CatalogRecord>>;

    /// Insert a new record.
    async fn create(&self, record: CatalogRecord) -> Result<CatalogRecord>;

    /// Overwrite a whole record.
    async fn update(&self, record: &CatalogRecord) -> Result<()>;

    /// Apply one field-group patch.
    async fn apply(&self, id: ExternalId, patch: RecordPatch) -> Result<()>;

    /// A page of records ordered by external id.
    async fn list_page(&self, offset: usize, limit: usize) -> Result<Vec<CatalogRecord>>;

    /// Number of records.
    async fn count(&self) -> Result<usize>;

    /// Fetch a reference entity by natural key, creating it if absent.
    async fn get_or_create_reference(
        &self,
        kind: ReferenceKind,
        key: &str,
    ) -> Result<ReferenceEntity>;

    /// Set a flag to false on every record. Returns the number of records
    /// that had it set.
    async fn reset_flag(&self, flag: Flag) -> Result<u64>;

    /// Every record, fetched page by page.
    async fn list_all(&self, page_size: usize) -> Result<Vec<CatalogRecord>> {
        let page_size = page_size.max(1);
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_page(offset, page_size).await?;
            let len = page.len();
            all.extend(page);
            if len < page_size {
                break;
            }
            offset += len;
        }

        Ok(all)
    }
}
