//! Error types for scraping.

use reelhouse_core::{ExternalId, ScraperKind};
use reelhouse_sources::SourceError;
use thiserror::Error;

/// Errors that can occur while scraping a site.
///
/// Non-success statuses on a rung are not errors; the machine moves on to
/// the next rung. These variants abandon the whole attempt.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A configured selector does not parse
    #[error("invalid {selector} selector for the {kind} site: {reason}")]
    InvalidSelector {
        /// Which scraper
        kind: ScraperKind,
        /// Selector field name
        selector: &'static str,
        /// Parser message
        reason: String,
    },

    /// A selector the scraper needs is not configured
    #[error("{kind} site definition is missing the {selector} selector")]
    MissingSelector {
        /// Which scraper
        kind: ScraperKind,
        /// Selector field name
        selector: &'static str,
    },

    /// The page was fetched but its markup no longer matches the selectors
    #[error("page at {url} does not have the expected shape: {reason}")]
    ShapeMismatch {
        /// Page URL
        url: String,
        /// What was missing
        reason: String,
    },

    /// The record has no release year to verify pages against
    #[error("record {external_id} has no release year to verify pages against")]
    MissingReleaseYear {
        /// Record identity
        external_id: ExternalId,
    },

    /// The site kept answering 429 past the configured retry cap
    #[error("still rate limited at {url} after {retries} retries")]
    RateLimitExhausted {
        /// Throttled URL
        url: String,
        /// Retries performed
        retries: u32,
    },

    /// A link could not be resolved against the site root
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport failure
    #[error("fetch failed: {0}")]
    Source(#[from] SourceError),
}

/// Result type for scraping operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;
