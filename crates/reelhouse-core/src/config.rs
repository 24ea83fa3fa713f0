//! Configuration management for Reelhouse.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. The configuration is built once at
//! startup and handed to every component explicitly.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{ScraperKind, Source};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// Loaded from `~/.config/reelhouse/config.toml` (or platform equivalent)
/// unless an explicit path is given. Missing files fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local data files
    pub data: DataConfig,
    /// Primary metadata source
    pub metadata: MetadataConfig,
    /// Secondary rating source
    pub rating: RatingConfig,
    /// Per-source concurrency and spacing
    pub limits: LimitsConfig,
    /// Enrichment pipeline behavior
    pub pipeline: PipelineConfig,
    /// Discovery feed sizes
    pub feeds: FeedConfig,
    /// Sweep job behavior
    pub sweeps: SweepConfig,
    /// Scraper retry policy
    pub backoff: BackoffConfig,
    /// Scraper site definitions
    pub scrapers: ScraperConfig,
}

impl AppConfig {
    /// Load configuration from the given path, or the default location.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else if path.is_some() {
            Err(ConfigError::NotFound {
                path: config_path.display().to_string(),
            })
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `REELHOUSE_METADATA_TOKEN`: Bearer token for the metadata source
    /// - `REELHOUSE_RATING_API_KEY`: API key for the secondary rating source
    /// - `REELHOUSE_DATA_DIR`: Override the data directory
    /// - `REELHOUSE_MAX_WORKERS`: Override feed and sweep worker counts
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::load(path)?;

        if let Ok(token) = std::env::var("REELHOUSE_METADATA_TOKEN") {
            config.metadata.token = Some(token);
            tracing::debug!("Override metadata.token from env");
        }

        if let Ok(key) = std::env::var("REELHOUSE_RATING_API_KEY") {
            config.rating.api_key = Some(key);
            tracing::debug!("Override rating.api_key from env");
        }

        if let Ok(dir) = std::env::var("REELHOUSE_DATA_DIR") {
            tracing::debug!("Override data.dir from env: {}", dir);
            config.data.dir = PathBuf::from(dir);
        }

        if let Ok(val) = std::env::var("REELHOUSE_MAX_WORKERS") {
            if let Ok(workers) = val.parse::<usize>() {
                config.feeds.workers = workers;
                config.sweeps.workers = workers;
                tracing::debug!("Override worker counts from env: {}", workers);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given path.
    ///
    /// Credentials are never written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/reelhouse/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "reelhouse", "reelhouse").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Reject values that would stall or break the pipeline.
    pub fn validate(&self) -> ConfigResult<()> {
        for source in Source::ALL {
            if self.limits.for_source(source).max_concurrent == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("limits.{source}.max_concurrent"),
                    reason: "must be at least 1 when set".to_string(),
                });
            }
        }

        if self.feeds.workers == 0 || self.sweeps.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers".to_string(),
                reason: "feed and sweep worker counts must be at least 1".to_string(),
            });
        }

        if self.feeds.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feeds.page_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.sweeps.list_page_size == 0 || self.sweeps.progress_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweeps".to_string(),
                reason: "list_page_size and progress_interval must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Local data files, resolved against `dir` when relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Base directory for relative paths
    pub dir: PathBuf,
    /// Ban list (one external id per line, `#` comments)
    pub ban_list: PathBuf,
    /// Allow-listed provider names (one per line, order = rank)
    pub provider_allow_list: PathBuf,
    /// Bulk `{id, title}` snapshot
    pub master_index: PathBuf,
    /// Rating scraper URL cache
    pub rating_url_cache: PathBuf,
    /// Availability scraper URL cache
    pub availability_url_cache: PathBuf,
    /// SQLite catalog database
    pub database: PathBuf,
    /// Scheduler state file
    pub schedule_state: PathBuf,
}

impl DataConfig {
    /// Resolve a configured path against the data directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    /// Resolved URL cache path for a scraper.
    #[must_use]
    pub fn url_cache(&self, kind: ScraperKind) -> PathBuf {
        match kind {
            ScraperKind::Rating => self.resolve(&self.rating_url_cache),
            ScraperKind::Availability => self.resolve(&self.availability_url_cache),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        let dir = ProjectDirs::from("com", "reelhouse", "reelhouse")
            .map_or_else(|| PathBuf::from("data"), |dirs| dirs.data_dir().to_path_buf());

        Self {
            dir,
            ban_list: PathBuf::from("ban_list.txt"),
            provider_allow_list: PathBuf::from("providers.txt"),
            master_index: PathBuf::from("master_index.json"),
            rating_url_cache: PathBuf::from("rating_urls.json"),
            availability_url_cache: PathBuf::from("availability_urls.json"),
            database: PathBuf::from("catalog.db"),
            schedule_state: PathBuf::from("schedule.json"),
        }
    }
}

/// Primary metadata source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// API base URL
    pub base_url: String,
    /// Bearer token (from env, never saved)
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Response language
    pub language: String,
    /// Region used to pick availability entries
    pub watch_region: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            token: None,
            language: "en-US".to_string(),
            watch_region: "US".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Secondary rating source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// API base URL
    pub base_url: String,
    /// API key (from env, never saved)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.omdbapi.com/".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Limits for a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLimits {
    /// Maximum in-flight calls (`None` = no cap)
    pub max_concurrent: Option<usize>,
    /// Minimum spacing between call starts in milliseconds
    pub min_interval_ms: u64,
    /// Upper bound of the uniform random delay before each call
    pub jitter_ms: u64,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_concurrent: None,
            min_interval_ms: 0,
            jitter_ms: 0,
        }
    }
}

/// Per-source limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Metadata API
    pub metadata: SourceLimits,
    /// Secondary rating API
    pub rating: SourceLimits,
    /// Rating site scraper
    pub rating_scraper: SourceLimits,
    /// Availability site scraper
    pub availability_scraper: SourceLimits,
}

impl LimitsConfig {
    /// Limits for the given source.
    #[must_use]
    pub fn for_source(&self, source: Source) -> &SourceLimits {
        match source {
            Source::Metadata => &self.metadata,
            Source::Rating => &self.rating,
            Source::RatingScraper => &self.rating_scraper,
            Source::AvailabilityScraper => &self.availability_scraper,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            // ~20 requests per second
            metadata: SourceLimits {
                max_concurrent: Some(20),
                min_interval_ms: 50,
                jitter_ms: 0,
            },
            rating: SourceLimits {
                max_concurrent: Some(10),
                min_interval_ms: 50,
                jitter_ms: 0,
            },
            rating_scraper: SourceLimits {
                max_concurrent: None,
                min_interval_ms: 0,
                jitter_ms: 4000,
            },
            availability_scraper: SourceLimits {
                max_concurrent: None,
                min_interval_ms: 0,
                jitter_ms: 4000,
            },
        }
    }
}

/// Enrichment pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width of the accepted now-playing window in years, ending at the current year
    pub now_playing_window_years: u32,
    /// Related items at or below this popularity are dropped
    pub min_recommendation_popularity: f64,
    /// Maximum stored recommendations
    pub max_recommendations: usize,
    /// Number of cast names kept
    pub cast_limit: usize,
    /// Provider spellings unified before allow-list filtering
    pub provider_aliases: BTreeMap<String, String>,
    /// Terminate ids missing from the master index as unresolved
    pub require_indexed: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let provider_aliases = [
            ("Amazon Freevee", "Freevee"),
            ("Tubi", "Tubi TV"),
            ("Disney Plus", "Disney+"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            now_playing_window_years: 2,
            min_recommendation_popularity: 10.0,
            max_recommendations: 12,
            cast_limit: 5,
            provider_aliases,
            require_indexed: true,
        }
    }
}

/// Discovery feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Pages fetched from the popular feed
    pub popular_pages: u32,
    /// Pages fetched from the now-playing feed
    pub now_playing_pages: u32,
    /// Pages fetched from the discover feed
    pub discover_pages: u32,
    /// Expected items per page, used for progress
    pub page_size: usize,
    /// Concurrent pipeline workers per page
    pub workers: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            popular_pages: 20,
            now_playing_pages: 20,
            discover_pages: 20,
            page_size: 20,
            workers: 20,
        }
    }
}

/// Sweep job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Concurrent workers
    pub workers: usize,
    /// Log progress every N items
    pub progress_interval: usize,
    /// Records fetched per store page while traversing the catalog
    pub list_page_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            progress_interval: 100,
            list_page_size: 500,
        }
    }
}

/// Scraper retry policy for rate-limit responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry, in seconds
    pub base_delay_secs: u64,
    /// Added per previous attempt, in seconds
    pub step_secs: u64,
    /// Cap on rate-limit retries per request (`None` = retry until success)
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 10,
            step_secs: 5,
            max_rate_limit_retries: None,
        }
    }
}

/// Site definitions for both scrapers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Rating site
    pub rating: SiteConfig,
    /// Availability site
    pub availability: SiteConfig,
}

impl ScraperConfig {
    /// Site settings for a scraper.
    #[must_use]
    pub fn site(&self, kind: ScraperKind) -> &SiteConfig {
        match kind {
            ScraperKind::Rating => &self.rating,
            ScraperKind::Availability => &self.availability,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            rating: SiteConfig::rating_default(),
            availability: SiteConfig::availability_default(),
        }
    }
}

/// URL templates and CSS selectors for one scraped site.
///
/// Templates use `{base}`, `{slug}` and `{query}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site root
    pub base_url: String,
    /// Detail page template
    pub page_template: String,
    /// Search page template; `None` disables the search rung
    pub search_template: Option<String>,
    /// Element whose text carries the release year
    pub year_selector: String,
    /// One search result
    pub search_item_selector: String,
    /// Link inside a search result; its text is the displayed title
    pub search_title_selector: String,
    /// Aggregate rating element (rating site)
    #[serde(default)]
    pub rating_selector: Option<String>,
    /// Histogram bars (rating site)
    #[serde(default)]
    pub histogram_selector: Option<String>,
    /// Streaming offer elements (availability site)
    #[serde(default)]
    pub offer_selector: Option<String>,
    /// Attribute on an offer element holding the provider name
    #[serde(default = "default_offer_name_attr")]
    pub offer_name_attr: String,
    /// Request timeout in seconds
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

fn default_offer_name_attr() -> String {
    "alt".to_string()
}

fn default_scrape_timeout() -> u64 {
    5
}

impl SiteConfig {
    /// Defaults for the rating site.
    #[must_use]
    pub fn rating_default() -> Self {
        Self {
            base_url: "https://letterboxd.com".to_string(),
            page_template: "{base}/film/{slug}/".to_string(),
            search_template: Some("{base}/search/films/{query}/".to_string()),
            year_selector: ".releaseyear a, small.number a".to_string(),
            search_item_selector: "ul.results li".to_string(),
            search_title_selector: ".film-title-wrapper a".to_string(),
            rating_selector: Some("a.display-rating".to_string()),
            histogram_selector: Some(".rating-histogram-bar".to_string()),
            offer_selector: None,
            offer_name_attr: default_offer_name_attr(),
            timeout_secs: default_scrape_timeout(),
        }
    }

    /// Defaults for the availability site.
    #[must_use]
    pub fn availability_default() -> Self {
        Self {
            base_url: "https://www.justwatch.com/us".to_string(),
            page_template: "{base}/movie/{slug}".to_string(),
            search_template: Some("{base}/search?q={query}".to_string()),
            year_selector: "div.title-block span.text-muted".to_string(),
            search_item_selector: ".title-list-row__row".to_string(),
            search_title_selector: "a.title-list-row__column-header".to_string(),
            rating_selector: None,
            histogram_selector: None,
            offer_selector: Some("div.buybox-row.stream a.offer img".to_string()),
            offer_name_attr: default_offer_name_attr(),
            timeout_secs: default_scrape_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.limits.metadata.max_concurrent, Some(20));
        assert_eq!(config.limits.rating_scraper.max_concurrent, None);
        assert_eq!(config.limits.rating_scraper.jitter_ms, 4000);
        assert_eq!(config.backoff.base_delay_secs, 10);
        assert_eq!(config.backoff.step_secs, 5);
        assert!(config.backoff.max_rate_limit_retries.is_none());
        assert_eq!(config.feeds.workers, 20);
        assert_eq!(config.sweeps.progress_interval, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[feeds]
popular_pages = 3

[limits.metadata]
max_concurrent = 4
min_interval_ms = 250
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.feeds.popular_pages, 3);
        assert_eq!(config.limits.metadata.max_concurrent, Some(4));
        assert_eq!(config.limits.metadata.min_interval_ms, 250);
        // These should be defaults
        assert_eq!(config.feeds.page_size, 20);
        assert_eq!(config.scrapers.rating.base_url, "https://letterboxd.com");
    }

    #[test]
    fn test_credentials_never_serialized() {
        let mut config = AppConfig::default();
        config.metadata.token = Some("secret-token".to_string());
        config.rating.api_key = Some("secret-key".to_string());

        let toml_str = toml::to_string_pretty(&config).expect("serialize config");
        assert!(!toml_str.contains("secret-token"));
        assert!(!toml_str.contains("secret-key"));
        assert!(toml_str.contains("[pipeline]"));
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.sweeps.workers = 7;
        config.pipeline.max_recommendations = 5;
        config.save(&config_path).expect("save config");

        let loaded = AppConfig::load(Some(&config_path)).expect("load config");
        assert_eq!(loaded.sweeps.workers, 7);
        assert_eq!(loaded.pipeline.max_recommendations, 5);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load(Some(&tmp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.limits.rating.max_concurrent = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_data_paths_resolve_against_dir() {
        let data = DataConfig {
            dir: PathBuf::from("/srv/reelhouse"),
            ..DataConfig::default()
        };
        assert_eq!(
            data.resolve(&data.ban_list),
            PathBuf::from("/srv/reelhouse/ban_list.txt")
        );
        assert_eq!(
            data.url_cache(ScraperKind::Availability),
            PathBuf::from("/srv/reelhouse/availability_urls.json")
        );
        assert_eq!(
            data.resolve(Path::new("/etc/ban.txt")),
            PathBuf::from("/etc/ban.txt")
        );
    }
}
