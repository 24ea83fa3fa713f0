//! Primary metadata source: item detail and discovery feeds.
//!
//! Response shapes are defensive: every field is optional and absent
//! fields are a normal case.

use crate::error::{Result, SourceError};
use crate::http::build_http_client;
use async_trait::async_trait;
use reelhouse_core::{ExternalId, MetadataConfig, Source};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use url::Url;

/// Sub-resources appended to every detail request.
const DETAIL_APPEND: &str = "videos,watch/providers,recommendations,credits";

/// The three paginated discovery feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Trending / popular items
    Popular,
    /// Items currently in theatres
    NowPlaying,
    /// General discovery listing
    Discover,
}

impl FeedKind {
    /// All feeds.
    pub const ALL: [FeedKind; 3] = [FeedKind::Popular, FeedKind::NowPlaying, FeedKind::Discover];

    /// API path of the feed.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Popular => "movie/popular",
            Self::NowPlaying => "movie/now_playing",
            Self::Discover => "discover/movie",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Popular => f.write_str("popular"),
            Self::NowPlaying => f.write_str("now-playing"),
            Self::Discover => f.write_str("discover"),
        }
    }
}

/// Named entity (genre).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedEntry {
    /// Display name
    pub name: String,
}

/// One video attached to an item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Video {
    /// Site-specific video key
    pub key: String,
    /// Hosting site
    pub site: String,
    /// Video type (`Trailer`, `Teaser`, ...)
    #[serde(rename = "type")]
    pub kind: String,
}

/// Wrapper around a `results` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResultList<T> {
    /// Entries
    pub results: Vec<T>,
}

impl<T> Default for ResultList<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
        }
    }
}

/// Availability entry for one provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderEntry {
    /// Provider display name
    pub provider_name: String,
    /// Upstream ordering hint
    pub display_priority: Option<u32>,
}

/// Availability for one region, split by offer type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegionAvailability {
    /// Subscription streaming
    pub flatrate: Vec<ProviderEntry>,
    /// Free streaming
    pub free: Vec<ProviderEntry>,
    /// Ad-supported streaming
    pub ads: Vec<ProviderEntry>,
}

/// Availability keyed by region code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchProviders {
    /// Region code to availability
    pub results: HashMap<String, RegionAvailability>,
}

/// Cast credit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CastCredit {
    /// Performer name
    pub name: String,
    /// Billing order
    pub order: Option<u32>,
}

/// Crew credit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrewCredit {
    /// Crew member name
    pub name: String,
    /// Job title
    pub job: String,
}

/// Credits sub-resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credits {
    /// Cast
    pub cast: Vec<CastCredit>,
    /// Crew
    pub crew: Vec<CrewCredit>,
}

/// An item as it appears in feeds and related-item lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedItem {
    /// Raw identifier
    pub id: i64,
    /// Display title
    pub title: Option<String>,
    /// Popularity score
    pub popularity: Option<f64>,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    /// Adult content flag
    pub adult: bool,
}

/// One page of a feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedPage {
    /// Page number (1-based)
    pub page: u32,
    /// Total pages available
    pub total_pages: u32,
    /// Items on this page
    pub results: Vec<FeedItem>,
}

/// Full item detail with sub-resources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemDetail {
    /// Raw identifier
    pub id: i64,
    /// Display title
    pub title: Option<String>,
    /// Original-language title
    pub original_title: Option<String>,
    /// Plot overview
    pub overview: Option<String>,
    /// Poster path
    pub poster_path: Option<String>,
    /// Adult content flag
    pub adult: bool,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    /// Runtime in minutes
    pub runtime: Option<u32>,
    /// Tagline
    pub tagline: Option<String>,
    /// Average vote on a 0-10 scale
    pub vote_average: Option<f64>,
    /// Popularity score
    pub popularity: Option<f64>,
    /// Cross-reference id for the secondary rating source
    pub imdb_id: Option<String>,
    /// Genres
    pub genres: Vec<NamedEntry>,
    /// Videos sub-resource
    pub videos: ResultList<Video>,
    /// Availability sub-resource
    #[serde(rename = "watch/providers")]
    pub watch_providers: WatchProviders,
    /// Related items sub-resource
    pub recommendations: ResultList<FeedItem>,
    /// Credits sub-resource
    pub credits: Credits,
}

impl ItemDetail {
    /// Release year parsed from the release date.
    #[must_use]
    pub fn release_year(&self) -> Option<i32> {
        parse_year(self.release_date.as_deref()?)
    }

    /// Title, falling back to the original title.
    #[must_use]
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or(self.original_title.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    /// Key of the first video typed as a trailer.
    #[must_use]
    pub fn trailer_key(&self) -> Option<&str> {
        self.videos
            .results
            .iter()
            .find(|v| v.kind.eq_ignore_ascii_case("trailer") && !v.key.is_empty())
            .map(|v| v.key.as_str())
    }

    /// Streaming provider names for a region (subscription, free and
    /// ad-supported offers).
    #[must_use]
    pub fn provider_names(&self, region: &str) -> Vec<&str> {
        self.watch_providers
            .results
            .get(region)
            .map(|r| {
                r.flatrate
                    .iter()
                    .chain(&r.free)
                    .chain(&r.ads)
                    .map(|p| p.provider_name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Directors, comma-joined.
    #[must_use]
    pub fn directors(&self) -> Option<String> {
        let names: Vec<&str> = self
            .credits
            .crew
            .iter()
            .filter(|c| c.job == "Director")
            .map(|c| c.name.as_str())
            .collect();
        (!names.is_empty()).then(|| names.join(", "))
    }

    /// Top-billed cast, comma-joined.
    #[must_use]
    pub fn leading_cast(&self, limit: usize) -> Option<String> {
        let mut cast: Vec<&CastCredit> = self.credits.cast.iter().collect();
        cast.sort_by_key(|c| c.order.unwrap_or(u32::MAX));
        let names: Vec<&str> = cast.iter().take(limit).map(|c| c.name.as_str()).collect();
        (!names.is_empty()).then(|| names.join(", "))
    }
}

/// Parse the year out of a `YYYY-MM-DD` date.
#[must_use]
pub fn parse_year(date: &str) -> Option<i32> {
    date.split('-').next()?.trim().parse().ok()
}

/// The primary metadata source.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Full detail for an item, with videos, availability, related items
    /// and credits included.
    async fn detail(&self, id: ExternalId) -> Result<ItemDetail>;

    /// One page of a discovery feed.
    async fn feed_page(&self, feed: FeedKind, page: u32) -> Result<FeedPage>;
}

/// HTTP client for the metadata API.
pub struct MetadataClient {
    client: Client,
    base_url: String,
    token: String,
    language: String,
}

impl MetadataClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns [`SourceError::MissingCredential`] when no token is configured.
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(SourceError::MissingCredential {
                origin: Source::Metadata,
            })?;

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            language: config.language.clone(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("language", &self.language)
            .extend_pairs(params);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url.path(), "metadata request");
        let bearer = if self.token.starts_with("Bearer ") {
            self.token.clone()
        } else {
            format!("Bearer {}", self.token)
        };

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::from_status(
                Source::Metadata,
                status.as_u16(),
                message,
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Decode {
            origin: Source::Metadata,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn detail(&self, id: ExternalId) -> Result<ItemDetail> {
        let url = self.url(
            &format!("movie/{id}"),
            &[("append_to_response", DETAIL_APPEND)],
        )?;
        self.get_json(url).await
    }

    async fn feed_page(&self, feed: FeedKind, page: u32) -> Result<FeedPage> {
        let page = page.to_string();
        let url = self.url(feed.path(), &[("page", page.as_str())])?;
        self.get_json(url).await
    }
}
