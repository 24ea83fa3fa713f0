//! URL discovery and page scraping as an explicit, bounded ladder of rungs.
//!
//! The machine never writes anything itself. It reports what it found and
//! what the caller should cache, and the caller persists both.

use crate::error::{Result, ScrapeError};
use crate::parser::{PageData, PageParser};
use crate::site::SiteDefinition;
use crate::url_builder::{page_url, search_url, slug_with_year, slugify};
use reelhouse_core::{BackoffConfig, CachedUrl, ExternalId};
use reelhouse_lists::ProviderAllowList;
use reelhouse_sources::{Page, PageFetcher, RateLimiter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pages with a mismatching year tolerated before giving up.
pub const MAX_YEAR_ESCALATIONS: u32 = 1;

/// One URL discovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rung {
    /// URL cached by an earlier run
    Cached,
    /// URL derived from the slugified title
    Slug,
    /// First exact-title hit of a site search
    Search,
    /// Slugified title with the release year appended
    SlugWithYear,
}

impl Rung {
    /// Discovery rungs in the order they are tried.
    pub const DISCOVERY: [Rung; 3] = [Rung::Slug, Rung::Search, Rung::SlugWithYear];
}

impl fmt::Display for Rung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => f.write_str("cached"),
            Self::Slug => f.write_str("slug"),
            Self::Search => f.write_str("search"),
            Self::SlugWithYear => f.write_str("slug-with-year"),
        }
    }
}

/// What the machine needs to know about a record.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeRequest<'a> {
    /// Record identity, for logs and errors
    pub external_id: ExternalId,
    /// Display title
    pub title: &'a str,
    /// Release year every discovered page must show
    pub release_year: Option<i32>,
    /// URL cached by an earlier run
    pub cached: Option<&'a CachedUrl>,
}

/// Result of one scrape.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    /// Parsed payload, if a page was found
    pub data: Option<PageData>,
    /// Value the caller should cache; `None` when the cache stays as is
    pub cache_update: Option<CachedUrl>,
    /// Rung that produced the page
    pub rung: Option<Rung>,
    /// HTTP requests issued, retries included
    pub requests: usize,
    /// Sleeps taken after rate-limit responses, in order
    pub backoff_delays: Vec<Duration>,
}

/// Delay before retry number `attempt` (0-based) after a 429.
#[must_use]
pub fn backoff_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    Duration::from_secs(
        config
            .base_delay_secs
            .saturating_add(config.step_secs.saturating_mul(u64::from(attempt))),
    )
}

/// Scraper for one site.
pub struct ScrapeMachine {
    site: Arc<SiteDefinition>,
    fetcher: Arc<dyn PageFetcher>,
    limiter: RateLimiter,
    backoff: BackoffConfig,
}

impl ScrapeMachine {
    /// Create a machine for a compiled site.
    pub fn new(
        site: Arc<SiteDefinition>,
        fetcher: Arc<dyn PageFetcher>,
        limiter: RateLimiter,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            site,
            fetcher,
            limiter,
            backoff,
        }
    }

    /// The site this machine scrapes.
    #[must_use]
    pub fn site(&self) -> &SiteDefinition {
        &self.site
    }

    /// Find the record's page and extract its payload.
    ///
    /// A cached "Not Found" returns immediately without any request. A
    /// cached URL is fetched as is. Otherwise the discovery rungs run in
    /// order until one yields a page showing the record's release year;
    /// if none does, the outcome asks the caller to cache "Not Found".
    /// Transport failures abort without a cache update.
    pub async fn run(
        &self,
        request: &ScrapeRequest<'_>,
        allow_list: &ProviderAllowList,
    ) -> Result<ScrapeOutcome> {
        let kind = self.site.kind;
        let parser = PageParser::new(&self.site);
        let mut outcome = ScrapeOutcome::default();

        match request.cached {
            Some(CachedUrl::NotFound) => {
                debug!(external_id = %request.external_id, %kind, "discovery failed earlier, skipping");
                return Ok(outcome);
            }
            Some(CachedUrl::Found(url)) => {
                let page = self.fetch(url, &mut outcome).await?;
                outcome.rung = Some(Rung::Cached);
                if page.is_success() {
                    outcome.data = Some(parser.page_data(url, &page.body, allow_list)?);
                } else {
                    warn!(
                        external_id = %request.external_id,
                        %kind,
                        url = %url,
                        status = page.status,
                        "cached page unavailable"
                    );
                }
                return Ok(outcome);
            }
            None => {}
        }

        let year = request
            .release_year
            .ok_or(ScrapeError::MissingReleaseYear {
                external_id: request.external_id,
            })?;

        let mut escalations = 0;
        for rung in Rung::DISCOVERY {
            let Some(url) = self
                .candidate_url(rung, request, year, &parser, &mut outcome)
                .await?
            else {
                continue;
            };

            let page = self.fetch(&url, &mut outcome).await?;
            if !page.is_success() {
                debug!(
                    external_id = %request.external_id,
                    %kind,
                    %rung,
                    status = page.status,
                    "rung abandoned"
                );
                continue;
            }

            match parser.release_year(&page.body) {
                Some(found) if found == year => {
                    match parser.page_data(&url, &page.body, allow_list) {
                        Ok(data) => {
                            info!(external_id = %request.external_id, %kind, %rung, url = %url, "page found");
                            outcome.data = Some(data);
                            outcome.rung = Some(rung);
                            outcome.cache_update = Some(CachedUrl::Found(url));
                            return Ok(outcome);
                        }
                        Err(ScrapeError::ShapeMismatch { reason, .. }) => {
                            warn!(external_id = %request.external_id, %kind, %rung, reason = %reason, "unexpected page shape");
                        }
                        Err(e) => return Err(e),
                    }
                }
                found => {
                    debug!(
                        external_id = %request.external_id,
                        %kind,
                        %rung,
                        expected = year,
                        found = ?found,
                        "release year mismatch"
                    );
                }
            }

            if escalations >= MAX_YEAR_ESCALATIONS {
                break;
            }
            escalations += 1;
        }

        info!(external_id = %request.external_id, %kind, "no rung matched, caching not found");
        outcome.cache_update = Some(CachedUrl::NotFound);
        Ok(outcome)
    }

    async fn candidate_url(
        &self,
        rung: Rung,
        request: &ScrapeRequest<'_>,
        year: i32,
        parser: &PageParser<'_>,
        outcome: &mut ScrapeOutcome,
    ) -> Result<Option<String>> {
        match rung {
            Rung::Cached => Ok(request.cached.and_then(CachedUrl::url).map(str::to_string)),
            Rung::Slug => {
                let slug = slugify(request.title);
                Ok((!slug.is_empty()).then(|| page_url(&self.site, &slug)))
            }
            Rung::SlugWithYear => {
                if slugify(request.title).is_empty() {
                    return Ok(None);
                }
                Ok(Some(page_url(&self.site, &slug_with_year(request.title, year))))
            }
            Rung::Search => {
                let Some(url) = search_url(&self.site, request.title) else {
                    return Ok(None);
                };
                let page = self.fetch(&url, outcome).await?;
                if !page.is_success() {
                    debug!(external_id = %request.external_id, status = page.status, "search unavailable");
                    return Ok(None);
                }
                Ok(parser
                    .find_exact(&page.body, request.title)?
                    .map(|hit| hit.url))
            }
        }
    }

    /// One request, retried on 429 with a growing delay.
    ///
    /// Every attempt goes through the limiter, which applies the source's
    /// jitter before the request is sent.
    async fn fetch(&self, url: &str, outcome: &mut ScrapeOutcome) -> Result<Page> {
        let source = self.site.kind.source();
        let mut attempt: u32 = 0;

        loop {
            let page = {
                let _permit = self.limiter.acquire(source).await;
                self.fetcher.fetch(url).await?
            };
            outcome.requests += 1;

            if !page.is_rate_limited() {
                return Ok(page);
            }

            if let Some(max) = self.backoff.max_rate_limit_retries {
                if attempt >= max {
                    return Err(ScrapeError::RateLimitExhausted {
                        url: url.to_string(),
                        retries: attempt,
                    });
                }
            }

            let delay = backoff_delay(&self.backoff, attempt);
            warn!(%source, url, attempt, delay_secs = delay.as_secs(), "rate limited, backing off");
            outcome.backoff_delays.push(delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
