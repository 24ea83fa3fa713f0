//! Shared types used across the Reelhouse workspace.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::ReelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier assigned by the primary metadata source.
///
/// This is the catalog's sole identity key. Ids are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ExternalId(i64);

impl ExternalId {
    /// Create a new `ExternalId`.
    ///
    /// # Errors
    /// Returns error if the id is zero or negative.
    pub fn new(id: i64) -> Result<Self, ReelError> {
        if id <= 0 {
            return Err(ReelError::Validation(format!(
                "invalid external id: must be positive, got {id}"
            )));
        }
        Ok(Self(id))
    }

    /// Get the raw integer value.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ExternalId {
    type Error = ReelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalId> for i64 {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

impl FromStr for ExternalId {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|e| ReelError::Validation(format!("invalid external id '{s}': {e}")))?;
        Self::new(raw)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External sources the pipeline talks to.
///
/// Each source has its own rate limits and failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Authoritative metadata API (detail, feeds, availability, related items)
    Metadata,
    /// Secondary rating API keyed by a cross-reference id
    Rating,
    /// Best-effort rating site scraper
    RatingScraper,
    /// Best-effort availability site scraper
    AvailabilityScraper,
}

impl Source {
    /// All sources, in a stable order.
    pub const ALL: [Source; 4] = [
        Source::Metadata,
        Source::Rating,
        Source::RatingScraper,
        Source::AvailabilityScraper,
    ];

    /// Stable name used in logs and config keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Rating => "rating",
            Self::RatingScraper => "rating-scraper",
            Self::AvailabilityScraper => "availability-scraper",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two scraper instances. Same state machine, different site and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScraperKind {
    /// Scrapes an aggregate rating and its histogram
    Rating,
    /// Scrapes the list of streaming providers
    Availability,
}

impl ScraperKind {
    /// The rate-limited source this scraper runs under.
    #[must_use]
    pub fn source(&self) -> Source {
        match self {
            Self::Rating => Source::RatingScraper,
            Self::Availability => Source::AvailabilityScraper,
        }
    }
}

impl fmt::Display for ScraperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rating => f.write_str("rating"),
            Self::Availability => f.write_str("availability"),
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, ReelError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ReelError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
