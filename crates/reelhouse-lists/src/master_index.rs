//! Master index: bidirectional title/id lookup built from a bulk snapshot.

use crate::error::{ListError, Result};
use reelhouse_core::ExternalId;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// One entry of the bulk snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    /// Raw identifier
    pub id: i64,
    /// Title as published by the metadata source
    #[serde(alias = "original_title")]
    pub title: String,
}

/// Maps lower-cased titles to ids and ids back to titles.
#[derive(Debug, Clone, Default)]
pub struct MasterIndex {
    by_title: HashMap<String, ExternalId>,
    by_id: HashMap<ExternalId, String>,
}

impl MasterIndex {
    /// Build the index from snapshot entries.
    ///
    /// Entries with a non-positive id are skipped. When two entries share a
    /// title, the later one wins the title lookup.
    pub fn from_entries(entries: impl IntoIterator<Item = IndexEntry>) -> Self {
        let mut index = Self::default();

        for entry in entries {
            let Ok(id) = ExternalId::new(entry.id) else {
                warn!(id = entry.id, "skipping master index entry with invalid id");
                continue;
            };
            index.by_title.insert(entry.title.to_lowercase(), id);
            index.by_id.insert(id, entry.title);
        }

        index
    }

    /// Load the snapshot, a JSON array of `{id, title}` objects.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading master index from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| ListError::io(path, e))?;
        let entries: Vec<IndexEntry> =
            serde_json::from_str(&contents).map_err(|source| ListError::Json {
                path: path.display().to_string(),
                source,
            })?;

        let index = Self::from_entries(entries);
        info!(count = index.len(), "loaded master index");
        Ok(index)
    }

    /// Resolve a free-text title, case-insensitively.
    #[must_use]
    pub fn resolve_title(&self, title: &str) -> Option<ExternalId> {
        self.by_title.get(&title.trim().to_lowercase()).copied()
    }

    /// Title recorded for an id.
    #[must_use]
    pub fn title_for(&self, id: ExternalId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Whether the id appears in the snapshot.
    #[must_use]
    pub fn contains(&self, id: ExternalId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
