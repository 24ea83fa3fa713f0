//! Secondary rating source, keyed by a cross-reference id.

use crate::error::{Result, SourceError};
use crate::http::build_http_client;
use async_trait::async_trait;
use reelhouse_core::{RatingConfig, Source};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Placeholder the source uses for absent values.
const NOT_AVAILABLE: &str = "N/A";

/// One rating entry in the raw response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RatingEntry {
    /// Rating source name
    #[serde(rename = "Source")]
    pub source: String,
    /// Rating value as published
    #[serde(rename = "Value")]
    pub value: String,
}

/// Raw lookup response. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RatingResponse {
    /// `"True"` or `"False"`
    #[serde(rename = "Response")]
    pub response: Option<String>,
    /// Error text when `response` is `"False"`
    #[serde(rename = "Error")]
    pub error: Option<String>,
    /// Ratings by source
    #[serde(rename = "Ratings")]
    pub ratings: Vec<RatingEntry>,
    /// Directors
    #[serde(rename = "Director")]
    pub director: Option<String>,
    /// Leading actors
    #[serde(rename = "Actors")]
    pub actors: Option<String>,
    /// Certification
    #[serde(rename = "Rated")]
    pub rated: Option<String>,
    /// Box office
    #[serde(rename = "BoxOffice")]
    pub box_office: Option<String>,
}

/// Normalized secondary rating lookup result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryRating {
    /// Ratings keyed by source name
    pub ratings: BTreeMap<String, String>,
    /// Directors
    pub director: Option<String>,
    /// Leading cast
    pub cast: Option<String>,
    /// Certification
    pub certification: Option<String>,
    /// Box office
    pub box_office: Option<String>,
}

fn available(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v != NOT_AVAILABLE)
}

impl RatingResponse {
    /// Convert into a [`SecondaryRating`], treating `N/A` as absent.
    ///
    /// # Errors
    /// Returns [`SourceError::NotFound`] if the source reported no match.
    pub fn into_rating(self, key: &str) -> Result<SecondaryRating> {
        if self.response.as_deref() == Some("False") {
            debug!(key, error = ?self.error, "rating lookup found nothing");
            return Err(SourceError::NotFound {
                origin: Source::Rating,
                key: key.to_string(),
            });
        }

        let ratings = self
            .ratings
            .into_iter()
            .filter(|r| !r.source.is_empty() && r.value != NOT_AVAILABLE)
            .map(|r| (r.source, r.value))
            .collect();

        Ok(SecondaryRating {
            ratings,
            director: available(self.director),
            cast: available(self.actors),
            certification: available(self.rated),
            box_office: available(self.box_office),
        })
    }
}

/// The secondary rating source.
#[async_trait]
pub trait RatingSource: Send + Sync {
    /// Look up ratings by cross-reference id.
    async fn lookup(&self, cross_reference_id: &str) -> Result<SecondaryRating>;
}

/// HTTP client for the rating API.
pub struct RatingClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RatingClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns [`SourceError::MissingCredential`] when no API key is configured.
    pub fn new(config: &RatingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(SourceError::MissingCredential {
                origin: Source::Rating,
            })?;

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl RatingSource for RatingClient {
    async fn lookup(&self, cross_reference_id: &str) -> Result<SecondaryRating> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[("i", cross_reference_id), ("apikey", self.api_key.as_str())],
        )?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::from_status(
                Source::Rating,
                status.as_u16(),
                message,
            ));
        }

        let body = response.text().await?;
        let parsed: RatingResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Decode {
                origin: Source::Rating,
                message: e.to_string(),
            })?;

        parsed.into_rating(cross_reference_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_normalization() {
        let raw = r#"{
            "Response": "True",
            "Ratings": [
                {"Source": "Internet Movie Database", "Value": "8.0/10"},
                {"Source": "Rotten Tomatoes", "Value": "83%"},
                {"Source": "Metacritic", "Value": "N/A"}
            ],
            "Director": "Denis Villeneuve",
            "Actors": "Timothée Chalamet, Rebecca Ferguson",
            "Rated": "PG-13",
            "BoxOffice": "N/A"
        }"#;

        let parsed: RatingResponse = serde_json::from_str(raw).expect("parse response");
        let rating = parsed.into_rating("tt1160419").expect("rating found");

        assert_eq!(rating.ratings.len(), 2);
        assert_eq!(
            rating.ratings.get("Rotten Tomatoes").map(String::as_str),
            Some("83%")
        );
        assert_eq!(rating.certification.as_deref(), Some("PG-13"));
        assert!(rating.box_office.is_none());
    }

    #[test]
    fn test_false_response_is_not_found() {
        let parsed: RatingResponse =
            serde_json::from_str(r#"{"Response": "False", "Error": "Incorrect IMDb ID."}"#)
                .expect("parse response");
        assert!(matches!(
            parsed.into_rating("tt0"),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_client_requires_key() {
        assert!(RatingClient::new(&RatingConfig::default()).is_err());
    }
}
