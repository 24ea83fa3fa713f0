//! Reference lists shared by every pipeline component.

use crate::{
    ban_list::BanList, error::Result, master_index::MasterIndex,
    providers::ProviderAllowList, url_cache::ScrapeUrlCache,
};
use reelhouse_core::{DataConfig, ExternalId, PipelineConfig, ScraperKind};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Ban list, provider allow-list, master index and scrape URL caches.
///
/// Built once at startup and cloned into each component. Only the ban list
/// changes at runtime, through [`ReferenceLists::reload`]; in-flight work
/// keeps running and sees the new list on its next membership check.
#[derive(Clone)]
pub struct ReferenceLists {
    ban_list: Arc<RwLock<BanList>>,
    ban_list_path: Option<PathBuf>,
    providers: Arc<ProviderAllowList>,
    master_index: Arc<MasterIndex>,
    rating_urls: Arc<ScrapeUrlCache>,
    availability_urls: Arc<ScrapeUrlCache>,
}

impl ReferenceLists {
    /// Assemble lists that are not backed by files.
    ///
    /// [`ReferenceLists::reload`] is a no-op for such lists.
    #[must_use]
    pub fn new(ban_list: BanList, providers: ProviderAllowList, master_index: MasterIndex) -> Self {
        Self {
            ban_list: Arc::new(RwLock::new(ban_list)),
            ban_list_path: None,
            providers: Arc::new(providers),
            master_index: Arc::new(master_index),
            rating_urls: Arc::new(ScrapeUrlCache::in_memory()),
            availability_urls: Arc::new(ScrapeUrlCache::in_memory()),
        }
    }

    /// Load every list from the configured data files.
    ///
    /// # Errors
    /// Any missing or malformed ban list, allow-list or snapshot is fatal.
    pub fn load(data: &DataConfig, pipeline: &PipelineConfig) -> Result<Self> {
        let ban_list_path = data.resolve(&data.ban_list);
        let ban_list = BanList::load(&ban_list_path)?;
        let providers = ProviderAllowList::load(
            &data.resolve(&data.provider_allow_list),
            pipeline.provider_aliases.clone(),
        )?;
        let master_index = MasterIndex::load(&data.resolve(&data.master_index))?;
        let rating_urls = ScrapeUrlCache::load(data.url_cache(ScraperKind::Rating))?;
        let availability_urls = ScrapeUrlCache::load(data.url_cache(ScraperKind::Availability))?;

        info!(
            banned = ban_list.len(),
            providers = providers.len(),
            indexed = master_index.len(),
            "loaded reference lists"
        );

        Ok(Self {
            ban_list: Arc::new(RwLock::new(ban_list)),
            ban_list_path: Some(ban_list_path),
            providers: Arc::new(providers),
            master_index: Arc::new(master_index),
            rating_urls: Arc::new(rating_urls),
            availability_urls: Arc::new(availability_urls),
        })
    }

    /// Re-read the ban list file, replacing the in-memory set.
    ///
    /// Returns the number of banned ids after the reload.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = &self.ban_list_path else {
            return Ok(self.banned_count());
        };

        let fresh = BanList::load(path)?;
        let count = fresh.len();

        let mut current = self
            .ban_list
            .write()
            .expect("acquire write lock on ban list");
        *current = fresh;

        info!(count, "reloaded ban list");
        Ok(count)
    }

    /// Add an id to the ban list file and reload, then drop the id from
    /// both scrape URL caches.
    ///
    /// Lists without a backing file only update the in-memory set.
    pub fn ban(&self, id: ExternalId) -> Result<bool> {
        let changed = match &self.ban_list_path {
            Some(path) => {
                let changed = BanList::append(path, id)?;
                self.reload()?;
                changed
            }
            None => self
                .ban_list
                .write()
                .expect("acquire write lock on ban list")
                .insert(id),
        };

        for kind in [ScraperKind::Rating, ScraperKind::Availability] {
            if self.url_cache(kind).remove(id)? {
                info!(external_id = %id, %kind, "purged scrape url");
            }
        }
        Ok(changed)
    }

    /// Whether an id is banned.
    #[must_use]
    pub fn is_banned(&self, id: ExternalId) -> bool {
        self.ban_list
            .read()
            .expect("acquire read lock on ban list")
            .contains(id)
    }

    /// Number of banned ids.
    #[must_use]
    pub fn banned_count(&self) -> usize {
        self.ban_list
            .read()
            .expect("acquire read lock on ban list")
            .len()
    }

    /// Provider allow-list.
    #[must_use]
    pub fn providers(&self) -> &ProviderAllowList {
        &self.providers
    }

    /// Master index.
    #[must_use]
    pub fn master_index(&self) -> &MasterIndex {
        &self.master_index
    }

    /// Scrape URL cache for a scraper.
    #[must_use]
    pub fn url_cache(&self, kind: ScraperKind) -> &ScrapeUrlCache {
        match kind {
            ScraperKind::Rating => &self.rating_urls,
            ScraperKind::Availability => &self.availability_urls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelhouse_core::CachedUrl;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn id(raw: i64) -> ExternalId {
        ExternalId::new(raw).expect("valid id")
    }

    fn write_data_dir(dir: &std::path::Path) -> DataConfig {
        fs::write(dir.join("ban_list.txt"), "# banned\n13\n").expect("write ban list");
        fs::write(dir.join("providers.txt"), "Tubi TV\nPluto TV\n").expect("write providers");
        fs::write(dir.join("master_index.json"), r#"[{"id": 42, "title": "Dune"}]"#)
            .expect("write master index");

        DataConfig {
            dir: dir.to_path_buf(),
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_load_all_lists() {
        let tmp = TempDir::new().expect("create temp dir");
        let data = write_data_dir(tmp.path());

        let lists = ReferenceLists::load(&data, &PipelineConfig::default()).expect("load lists");
        assert!(lists.is_banned(id(13)));
        assert_eq!(lists.providers().len(), 2);
        assert_eq!(lists.master_index().resolve_title("dune"), Some(id(42)));
        assert!(lists.url_cache(ScraperKind::Rating).is_empty());
    }

    #[test]
    fn test_missing_ban_list_is_fatal() {
        let tmp = TempDir::new().expect("create temp dir");
        let data = write_data_dir(tmp.path());
        fs::remove_file(tmp.path().join("ban_list.txt")).expect("remove ban list");

        assert!(ReferenceLists::load(&data, &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_reload_picks_up_file_changes() {
        let tmp = TempDir::new().expect("create temp dir");
        let data = write_data_dir(tmp.path());
        let lists = ReferenceLists::load(&data, &PipelineConfig::default()).expect("load lists");
        let clone = lists.clone();

        fs::write(tmp.path().join("ban_list.txt"), "13\n99\n").expect("rewrite ban list");
        assert_eq!(lists.reload().expect("reload"), 2);

        // Clones share the same ban list
        assert!(clone.is_banned(id(99)));
    }

    #[test]
    fn test_ban_appends_and_reloads() {
        let tmp = TempDir::new().expect("create temp dir");
        let data = write_data_dir(tmp.path());
        let lists = ReferenceLists::load(&data, &PipelineConfig::default()).expect("load lists");

        assert!(lists.ban(id(42)).expect("ban 42"));
        assert!(lists.is_banned(id(42)));
        assert!(!lists.ban(id(42)).expect("ban 42 again"));

        let raw = fs::read_to_string(tmp.path().join("ban_list.txt")).expect("read ban list");
        assert!(raw.lines().any(|line| line == "42"));
    }

    #[test]
    fn test_ban_purges_scrape_urls() {
        let tmp = TempDir::new().expect("create temp dir");
        let data = write_data_dir(tmp.path());
        let lists = ReferenceLists::load(&data, &PipelineConfig::default()).expect("load lists");

        lists
            .url_cache(ScraperKind::Rating)
            .record(id(42), "Dune", CachedUrl::Found("https://example.com/film/dune/".into()))
            .expect("record rating url");
        lists
            .url_cache(ScraperKind::Availability)
            .record(id(42), "Dune", CachedUrl::NotFound)
            .expect("record availability sentinel");
        lists
            .url_cache(ScraperKind::Availability)
            .record(id(7), "Se7en", CachedUrl::NotFound)
            .expect("record other id");

        assert!(lists.ban(id(42)).expect("ban 42"));

        for kind in [ScraperKind::Rating, ScraperKind::Availability] {
            assert_eq!(lists.url_cache(kind).get(id(42)), None);
            let on_disk = ScrapeUrlCache::load(data.url_cache(kind)).expect("reload cache");
            assert_eq!(on_disk.get(id(42)), None);
        }
        assert_eq!(
            lists.url_cache(ScraperKind::Availability).get(id(7)),
            Some(CachedUrl::NotFound)
        );
    }

    #[test]
    fn test_in_memory_ban() {
        let lists = ReferenceLists::new(
            BanList::default(),
            ProviderAllowList::new(["Tubi TV"], BTreeMap::new()),
            MasterIndex::default(),
        );
        assert!(lists.ban(id(5)).expect("ban in memory"));
        assert!(lists.is_banned(id(5)));
        assert_eq!(lists.reload().expect("reload without file"), 1);
    }
}
