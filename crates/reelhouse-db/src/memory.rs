//! In-memory catalog store.
//!
//! Used by tests and dry runs. Each operation holds the lock for its whole
//! duration, so patches are atomic and `create` is race-free.

use crate::error::{DatabaseError, Result};
use crate::patch::{Flag, RecordPatch};
use crate::store::{CatalogStore, ReferenceEntity, ReferenceKind};
use async_trait::async_trait;
use reelhouse_core::{CatalogRecord, ExternalId, Timestamp};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    records: BTreeMap<ExternalId, CatalogRecord>,
    references: HashMap<(ReferenceKind, String), ReferenceEntity>,
    create_attempts: usize,
}

/// Catalog store backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: Mutex<Inner>,
}

impl MemoryCatalogStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().expect("acquire lock on memory store");
            for record in records {
                inner.records.insert(record.external_id, record);
            }
        }
        store
    }

    /// Number of `create` calls seen, including rejected ones.
    #[must_use]
    pub fn create_attempts(&self) -> usize {
        self.inner
            .lock()
            .expect("acquire lock on memory store")
            .create_attempts
    }

    /// All reference entities of a kind, sorted by key.
    #[must_use]
    pub fn references(&self, kind: ReferenceKind) -> Vec<ReferenceEntity> {
        let inner = self.inner.lock().expect("acquire lock on memory store");
        let mut refs: Vec<ReferenceEntity> = inner
            .references
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        refs.sort_by(|a, b| a.key.cmp(&b.key));
        refs
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn get_by_external_id(&self, id: ExternalId) -> Result<Option<CatalogRecord>> {
        let inner = self.inner.lock().expect("acquire lock on memory store");
        Ok(inner.records.get(&id).cloned())
    }

    async fn create(&self, record: CatalogRecord) -> Result<CatalogRecord> {
        let mut inner = self.inner.lock().expect("acquire lock on memory store");
        inner.create_attempts += 1;

        if inner.records.contains_key(&record.external_id) {
            return Err(DatabaseError::Conflict {
                external_id: record.external_id,
            });
        }

        inner.records.insert(record.external_id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: &CatalogRecord) -> Result<()> {
        let mut inner = self.inner.lock().expect("acquire lock on memory store");
        let slot = inner
            .records
            .get_mut(&record.external_id)
            .ok_or(DatabaseError::NotFound {
                external_id: record.external_id,
            })?;

        *slot = record.clone();
        slot.updated_at = Timestamp::now();
        Ok(())
    }

    async fn apply(&self, id: ExternalId, patch: RecordPatch) -> Result<()> {
        let mut inner = self.inner.lock().expect("acquire lock on memory store");
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(DatabaseError::NotFound { external_id: id })?;

        patch.apply_to(record);
        Ok(())
    }

    async fn list_page(&self, offset: usize, limit: usize) -> Result<Vec<CatalogRecord>> {
        let inner = self.inner.lock().expect("acquire lock on memory store");
        Ok(inner
            .records
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.inner.lock().expect("acquire lock on memory store");
        Ok(inner.records.len())
    }

    async fn get_or_create_reference(
        &self,
        kind: ReferenceKind,
        key: &str,
    ) -> Result<ReferenceEntity> {
        let mut inner = self.inner.lock().expect("acquire lock on memory store");
        let next_id = i64::try_from(inner.references.len()).unwrap_or(i64::MAX - 1) + 1;

        let entity = inner
            .references
            .entry((kind, key.to_string()))
            .or_insert_with(|| ReferenceEntity {
                id: next_id,
                kind,
                key: key.to_string(),
            });
        Ok(entity.clone())
    }

    async fn reset_flag(&self, flag: Flag) -> Result<u64> {
        let mut inner = self.inner.lock().expect("acquire lock on memory store");
        let mut cleared = 0;

        for record in inner.records.values_mut() {
            let slot = match flag {
                Flag::NowPlaying => &mut record.now_playing,
                Flag::Popular => &mut record.is_popular,
            };
            if *slot {
                *slot = false;
                record.updated_at = Timestamp::now();
                cleared += 1;
            }
        }

        Ok(cleared)
    }
}
