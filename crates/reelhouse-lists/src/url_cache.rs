//! Scrape URL cache persisted as a JSON file.
//!
//! The file is an array of `{external_id, title, url}` objects and is
//! rewritten wholesale on every update.

use crate::error::{ListError, Result};
use reelhouse_core::{CachedUrl, ExternalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    external_id: ExternalId,
    title: String,
    url: CachedUrl,
}

/// External id to discovered URL (or the "Not Found" sentinel).
#[derive(Debug, Default)]
pub struct ScrapeUrlCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<ExternalId, CacheEntry>>,
}

impl ScrapeUrlCache {
    /// A cache that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file. A missing file yields an empty cache that will
    /// be created on first write.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut entries = BTreeMap::new();

        if path.exists() {
            debug!("Loading scrape url cache from {}", path.display());
            let contents = fs::read_to_string(&path).map_err(|e| ListError::io(&path, e))?;
            let parsed: Vec<CacheEntry> =
                serde_json::from_str(&contents).map_err(|source| ListError::Json {
                    path: path.display().to_string(),
                    source,
                })?;
            for entry in parsed {
                entries.insert(entry.external_id, entry);
            }
            info!(count = entries.len(), path = %path.display(), "loaded scrape url cache");
        }

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Cached URL or sentinel for an id.
    #[must_use]
    pub fn get(&self, id: ExternalId) -> Option<CachedUrl> {
        let entries = self.entries.lock().expect("acquire lock on url cache");
        entries.get(&id).map(|e| e.url.clone())
    }

    /// Record a discovery result and rewrite the file.
    pub fn record(&self, id: ExternalId, title: &str, url: CachedUrl) -> Result<()> {
        let mut entries = self.entries.lock().expect("acquire lock on url cache");
        entries.insert(
            id,
            CacheEntry {
                external_id: id,
                title: title.to_string(),
                url,
            },
        );

        if let Some(path) = &self.path {
            let snapshot: Vec<&CacheEntry> = entries.values().collect();
            write_atomically(path, &snapshot)?;
        }
        Ok(())
    }

    /// Forget an id and rewrite the file. Returns whether it was cached.
    pub fn remove(&self, id: ExternalId) -> Result<bool> {
        let mut entries = self.entries.lock().expect("acquire lock on url cache");
        if entries.remove(&id).is_none() {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            let snapshot: Vec<&CacheEntry> = entries.values().collect();
            write_atomically(path, &snapshot)?;
        }
        Ok(true)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("acquire lock on url cache").len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn write_atomically(path: &Path, entries: &[&CacheEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ListError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(entries).map_err(|source| ListError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| ListError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ListError::io(path, e))?;
    Ok(())
}
