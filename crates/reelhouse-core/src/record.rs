//! The catalog record and the values hanging off it.
//!
//! A `CatalogRecord` is created once per `ExternalId` by the enrichment
//! pipeline and afterwards mutated one field group at a time by sweeps.

use crate::types::{ExternalId, ScraperKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Sentinel stored when URL discovery permanently failed.
pub const NOT_FOUND_SENTINEL: &str = "Not Found";

/// A cached scrape URL, or the marker that discovery already failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CachedUrl {
    /// URL resolved by an earlier run
    Found(String),
    /// Discovery failed on every rung; skip discovery entirely
    NotFound,
}

impl CachedUrl {
    /// The resolved URL, if discovery succeeded.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Found(url) => Some(url),
            Self::NotFound => None,
        }
    }

    /// Whether this is the "Not Found" sentinel.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<String> for CachedUrl {
    fn from(value: String) -> Self {
        if value == NOT_FOUND_SENTINEL {
            Self::NotFound
        } else {
            Self::Found(value)
        }
    }
}

impl From<CachedUrl> for String {
    fn from(value: CachedUrl) -> Self {
        match value {
            CachedUrl::Found(url) => url,
            CachedUrl::NotFound => NOT_FOUND_SENTINEL.to_string(),
        }
    }
}

impl fmt::Display for CachedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(url) => f.write_str(url),
            Self::NotFound => f.write_str(NOT_FOUND_SENTINEL),
        }
    }
}

/// A streaming provider associated with a record.
///
/// `rank` comes from the provider allow-list order; lower is preferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamingProvider {
    /// Normalized provider name
    pub name: String,
    /// Position in the allow-list (0 = most preferred)
    pub rank: u32,
}

impl StreamingProvider {
    /// Sort by rank (then name) and drop repeated names.
    #[must_use]
    pub fn ranked(mut providers: Vec<StreamingProvider>) -> Vec<StreamingProvider> {
        providers.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
        providers.dedup_by(|a, b| a.name == b.name);
        providers
    }
}

/// One entry of the capped recommended-item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    /// Identifier of the recommended item
    pub external_id: ExternalId,
    /// Display title
    pub title: String,
    /// Popularity score reported by the metadata source
    pub popularity: f64,
}

/// Aggregate rating scraped from the rating site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRating {
    /// Weighted average on the site's own scale
    pub average: f64,
    /// Vote count per histogram bucket, lowest bucket first
    pub histogram_counts: Vec<u64>,
    /// Share of votes per bucket, in percent
    pub histogram_weights: Vec<f64>,
}

/// A fully or partially enriched catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Identity; unique and immutable
    pub external_id: ExternalId,
    /// Display title
    pub title: String,
    /// Plot overview
    pub overview: Option<String>,
    /// Poster reference (path on the metadata source's image host)
    pub poster_path: Option<String>,
    /// Release year
    pub release_year: Option<i32>,
    /// Runtime in minutes
    pub runtime: Option<u32>,
    /// Tagline
    pub tagline: Option<String>,
    /// Video key of the first trailer
    pub trailer_key: Option<String>,
    /// Primary rating in string form, e.g. "7.4/10"
    pub primary_rating: Option<String>,
    /// Primary rating as a number
    pub primary_rating_value: Option<f64>,
    /// Popularity score from the metadata source
    pub popularity: Option<f64>,
    /// Cross-reference id used by the secondary rating source
    pub cross_reference_id: Option<String>,
    /// Secondary ratings keyed by rating source name
    pub secondary_ratings: BTreeMap<String, String>,
    /// Director names, comma-separated
    pub director: Option<String>,
    /// Leading cast names, comma-separated
    pub cast: Option<String>,
    /// Content certification (e.g. "PG-13")
    pub certification: Option<String>,
    /// Domestic box office as reported
    pub box_office: Option<String>,
    /// Genre names
    pub genres: BTreeSet<String>,
    /// Allow-listed streaming providers
    pub providers: Vec<StreamingProvider>,
    /// Lowest-ranked associated provider
    pub top_provider: Option<String>,
    /// Capped list of related items above the popularity threshold
    pub recommendations: Vec<RecommendedItem>,
    /// Rating scraped from the rating site
    pub scraped_rating: Option<ScrapedRating>,
    /// Cached URL for the rating scraper
    pub rating_url: Option<CachedUrl>,
    /// Cached URL for the availability scraper
    pub availability_url: Option<CachedUrl>,
    /// Currently in theatres
    pub now_playing: bool,
    /// Listed on the popular feed
    pub is_popular: bool,
    /// Last time any field group was written
    pub updated_at: Timestamp,
}

impl CatalogRecord {
    /// Create an empty record for the given identity.
    #[must_use]
    pub fn new(external_id: ExternalId, title: impl Into<String>) -> Self {
        Self {
            external_id,
            title: title.into(),
            overview: None,
            poster_path: None,
            release_year: None,
            runtime: None,
            tagline: None,
            trailer_key: None,
            primary_rating: None,
            primary_rating_value: None,
            popularity: None,
            cross_reference_id: None,
            secondary_ratings: BTreeMap::new(),
            director: None,
            cast: None,
            certification: None,
            box_office: None,
            genres: BTreeSet::new(),
            providers: Vec::new(),
            top_provider: None,
            recommendations: Vec::new(),
            scraped_rating: None,
            rating_url: None,
            availability_url: None,
            now_playing: false,
            is_popular: false,
            updated_at: Timestamp::now(),
        }
    }

    /// Replace the provider set and recompute the top provider.
    pub fn set_providers(&mut self, providers: Vec<StreamingProvider>) {
        let providers = StreamingProvider::ranked(providers);
        self.top_provider = providers.first().map(|p| p.name.clone());
        self.providers = providers;
    }

    /// Cached URL for the given scraper.
    #[must_use]
    pub fn cached_url(&self, kind: ScraperKind) -> Option<&CachedUrl> {
        match kind {
            ScraperKind::Rating => self.rating_url.as_ref(),
            ScraperKind::Availability => self.availability_url.as_ref(),
        }
    }

    /// Store the cached URL for the given scraper.
    pub fn set_cached_url(&mut self, kind: ScraperKind, url: CachedUrl) {
        match kind {
            ScraperKind::Rating => self.rating_url = Some(url),
            ScraperKind::Availability => self.availability_url = Some(url),
        }
    }
}
