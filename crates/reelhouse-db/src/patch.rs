//! Field-group patches applied to existing records.
//!
//! Every sweep and every post-creation pipeline step writes through exactly
//! one patch. A patch touches one field group and nothing else, so writers
//! working on different groups of the same record never overwrite each
//! other.

use reelhouse_core::{
    CachedUrl, CatalogRecord, RecommendedItem, ScrapedRating, ScraperKind, StreamingProvider,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Boolean catalog flags with full-replace feed semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Currently in theatres
    NowPlaying,
    /// Listed on the popular feed
    Popular,
}

impl Flag {
    /// Column name in the SQLite store.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::NowPlaying => "now_playing",
            Self::Popular => "is_popular",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NowPlaying => f.write_str("now-playing"),
            Self::Popular => f.write_str("popular"),
        }
    }
}

/// Values written by the secondary rating refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryRatingPatch {
    /// Ratings keyed by rating source name
    pub ratings: BTreeMap<String, String>,
    /// Director names
    pub director: Option<String>,
    /// Leading cast names
    pub cast: Option<String>,
    /// Content certification
    pub certification: Option<String>,
    /// Box office
    pub box_office: Option<String>,
}

/// A single field-group write.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPatch {
    /// Set one flag
    Flag {
        /// Flag to set
        flag: Flag,
        /// New value
        value: bool,
    },
    /// Replace the provider set; the top provider is recomputed
    Providers(Vec<StreamingProvider>),
    /// Replace the recommended-item list
    Recommendations(Vec<RecommendedItem>),
    /// Replace the scraped rating
    ScrapedRating(Option<ScrapedRating>),
    /// Replace secondary ratings and the detail fields that come with them.
    /// `None` detail fields keep their stored value.
    SecondaryRating(SecondaryRatingPatch),
    /// Store a scraper's cached URL or sentinel
    CachedUrl {
        /// Scraper owning the URL
        kind: ScraperKind,
        /// URL or sentinel
        url: CachedUrl,
    },
}

impl RecordPatch {
    /// Name of the touched field group, for logs.
    #[must_use]
    pub fn field_group(&self) -> &'static str {
        match self {
            Self::Flag { .. } => "flags",
            Self::Providers(_) => "providers",
            Self::Recommendations(_) => "recommendations",
            Self::ScrapedRating(_) => "scraped-rating",
            Self::SecondaryRating(_) => "secondary-ratings",
            Self::CachedUrl { .. } => "scrape-url",
        }
    }

    /// Apply the patch to an in-memory record and bump `updated_at`.
    pub fn apply_to(self, record: &mut CatalogRecord) {
        match self {
            Self::Flag {
                flag: Flag::NowPlaying,
                value,
            } => record.now_playing = value,
            Self::Flag {
                flag: Flag::Popular,
                value,
            } => record.is_popular = value,
            Self::Providers(providers) => record.set_providers(providers),
            Self::Recommendations(items) => record.recommendations = items,
            Self::ScrapedRating(rating) => record.scraped_rating = rating,
            Self::SecondaryRating(patch) => {
                record.secondary_ratings = patch.ratings;
                if patch.director.is_some() {
                    record.director = patch.director;
                }
                if patch.cast.is_some() {
                    record.cast = patch.cast;
                }
                if patch.certification.is_some() {
                    record.certification = patch.certification;
                }
                if patch.box_office.is_some() {
                    record.box_office = patch.box_office;
                }
            }
            Self::CachedUrl { kind, url } => record.set_cached_url(kind, url),
        }
        record.updated_at = Timestamp::now();
    }
}
