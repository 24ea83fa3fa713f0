//! Raw HTML page fetching for the scrapers.

use crate::error::Result;
use crate::http::{build_http_client, random_user_agent};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use tracing::debug;

/// A fetched page. Non-success statuses are returned, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl Page {
    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the site throttled the request.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Fetches HTML pages.
///
/// Only transport failures are errors; the caller decides what each
/// status means.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL.
    async fn fetch(&self, url: &str) -> Result<Page>;
}

/// `reqwest`-backed fetcher with a short timeout and rotating user agents.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(url, status, bytes = body.len(), "fetched page");

        Ok(Page { status, body })
    }
}
