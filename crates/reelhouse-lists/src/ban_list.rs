//! Ban list: external ids that must never become catalog records.
//!
//! The file is line-oriented. Blank lines and lines starting with `#` are
//! ignored; every other line must hold one external id.

use crate::error::{ListError, Result};
use reelhouse_core::ExternalId;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Set of banned external ids.
#[derive(Debug, Clone, Default)]
pub struct BanList {
    ids: HashSet<ExternalId>,
}

impl BanList {
    /// Parse ban list contents.
    ///
    /// `origin` is only used in error messages.
    pub fn parse(contents: &str, origin: &str) -> Result<Self> {
        let mut ids = HashSet::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let id = line
                .parse::<ExternalId>()
                .map_err(|e| ListError::InvalidEntry {
                    path: origin.to_string(),
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            ids.insert(id);
        }

        Ok(Self { ids })
    }

    /// Load the ban list from a file.
    ///
    /// # Errors
    /// Returns error if the file is missing, unreadable, or holds a line that
    /// is neither a comment nor an id.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading ban list from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| ListError::io(path, e))?;
        let list = Self::parse(&contents, &path.display().to_string())?;
        info!(count = list.len(), "loaded ban list");
        Ok(list)
    }

    /// Append an id to the ban list file unless already present.
    ///
    /// Returns `true` when the file was changed.
    pub fn append(path: &Path, id: ExternalId) -> Result<bool> {
        let current = Self::load(path)?;
        if current.contains(id) {
            debug!(external_id = %id, "already banned");
            return Ok(false);
        }

        let needs_newline = fs::read_to_string(path)
            .map_err(|e| ListError::io(path, e))?
            .chars()
            .last()
            .is_some_and(|c| c != '\n');

        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| ListError::io(path, e))?;
        let line = if needs_newline {
            format!("\n{id}\n")
        } else {
            format!("{id}\n")
        };
        file.write_all(line.as_bytes())
            .map_err(|e| ListError::io(path, e))?;

        info!(external_id = %id, "appended to ban list");
        Ok(true)
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, id: ExternalId) -> bool {
        self.ids.contains(&id)
    }

    /// Add an id in memory. Returns `true` if it was not banned before.
    pub fn insert(&mut self, id: ExternalId) -> bool {
        self.ids.insert(id)
    }

    /// Number of banned ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<ExternalId> for BanList {
    fn from_iter<T: IntoIterator<Item = ExternalId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
