//! Allow-listed streaming providers.
//!
//! One provider name per line; the line order defines the provider rank
//! (first line = rank 0 = most preferred). Upstream spellings are unified
//! through an alias table before membership is checked.

use crate::error::{ListError, Result};
use reelhouse_core::StreamingProvider;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Ranked provider allow-list with spelling normalization.
#[derive(Debug, Clone, Default)]
pub struct ProviderAllowList {
    ranks: HashMap<String, u32>,
    names: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl ProviderAllowList {
    /// Build an allow-list from names in rank order.
    pub fn new<I, S>(names: I, aliases: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self {
            ranks: HashMap::new(),
            names: Vec::new(),
            aliases,
        };

        for name in names {
            let name = name.into();
            let name = name.trim();
            if name.is_empty() || name.starts_with('#') || list.ranks.contains_key(name) {
                continue;
            }
            let rank = u32::try_from(list.names.len()).unwrap_or(u32::MAX);
            list.ranks.insert(name.to_string(), rank);
            list.names.push(name.to_string());
        }

        list
    }

    /// Load the allow-list from a line file.
    pub fn load(path: &Path, aliases: BTreeMap<String, String>) -> Result<Self> {
        debug!("Loading provider allow-list from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| ListError::io(path, e))?;
        let list = Self::new(contents.lines(), aliases);
        info!(count = list.len(), "loaded provider allow-list");
        Ok(list)
    }

    /// Unify alternative spellings of the same provider.
    #[must_use]
    pub fn normalize<'a>(&'a self, name: &'a str) -> &'a str {
        let name = name.trim();
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Rank of an allow-listed provider after normalization.
    #[must_use]
    pub fn rank(&self, name: &str) -> Option<u32> {
        self.ranks.get(self.normalize(name)).copied()
    }

    /// Keep only allow-listed names, normalized and ranked, in rank order.
    pub fn filter<'a, I>(&self, names: I) -> Vec<StreamingProvider>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut providers: Vec<StreamingProvider> = names
            .into_iter()
            .filter_map(|raw| {
                let name = self.normalize(raw);
                self.ranks.get(name).map(|&rank| StreamingProvider {
                    name: name.to_string(),
                    rank,
                })
            })
            .collect();

        providers.sort_by_key(|p| p.rank);
        providers.dedup_by(|a, b| a.name == b.name);
        providers
    }

    /// Allow-listed names in rank order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of allow-listed providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the allow-list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_list() -> ProviderAllowList {
        let aliases = BTreeMap::from([("Amazon Freevee".to_string(), "Freevee".to_string())]);
        ProviderAllowList::new(["Tubi TV", "Pluto TV", "Freevee"], aliases)
    }

    #[test]
    fn test_rank_follows_line_order() {
        let list = allow_list();
        assert_eq!(list.rank("Tubi TV"), Some(0));
        assert_eq!(list.rank("Freevee"), Some(2));
        assert_eq!(list.rank("Netflix"), None);
    }

    #[test]
    fn test_alias_is_normalized() {
        let list = allow_list();
        assert_eq!(list.normalize("Amazon Freevee"), "Freevee");
        assert_eq!(list.rank("Amazon Freevee"), Some(2));
    }

    #[test]
    fn test_filter_drops_unknown_and_duplicates() {
        let list = allow_list();
        let providers = list.filter(["Netflix", "Freevee", "Pluto TV", "Amazon Freevee"]);
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Pluto TV", "Freevee"]);
    }

    #[test]
    fn test_comment_and_blank_lines_ignored() {
        let list = ProviderAllowList::new(["# free tiers", "", "Tubi TV"], BTreeMap::new());
        assert_eq!(list.len(), 1);
        assert_eq!(list.rank("Tubi TV"), Some(0));
    }
}
