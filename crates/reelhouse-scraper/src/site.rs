//! Compiled site definitions.
//!
//! A `SiteConfig` carries selectors as strings so it can live in TOML.
//! `SiteDefinition` parses them once, up front, so a bad selector fails at
//! startup instead of on the first page.

use crate::error::{Result, ScrapeError};
use reelhouse_core::{ScraperKind, SiteConfig};
use scraper::Selector;

/// What the detail page of a site yields.
#[derive(Debug, Clone)]
pub enum PageSelectors {
    /// Aggregate rating and histogram
    Rating {
        /// Element carrying the weighted average in its `title`
        rating: Option<Selector>,
        /// Histogram bars, lowest bucket first
        histogram: Selector,
    },
    /// Streaming offers
    Availability {
        /// One element per offer
        offer: Selector,
        /// Attribute holding the provider name
        name_attr: String,
    },
}

/// A scrape target with its selectors parsed.
#[derive(Debug, Clone)]
pub struct SiteDefinition {
    /// Which scraper this site serves
    pub kind: ScraperKind,
    /// Site root
    pub base_url: String,
    /// Detail page template with `{base}` and `{slug}`
    pub page_template: String,
    /// Search page template with `{base}` and `{query}`
    pub search_template: Option<String>,
    /// Release year element
    pub year: Selector,
    /// One search result
    pub search_item: Selector,
    /// Title link inside a search result
    pub search_title: Selector,
    /// Detail page payload
    pub page: PageSelectors,
}

impl SiteDefinition {
    /// Parse every selector in `config`.
    pub fn compile(kind: ScraperKind, config: &SiteConfig) -> Result<Self> {
        let page = match kind {
            ScraperKind::Rating => PageSelectors::Rating {
                rating: config
                    .rating_selector
                    .as_deref()
                    .map(|s| parse(kind, "rating", s))
                    .transpose()?,
                histogram: parse(
                    kind,
                    "histogram",
                    required(kind, "histogram", config.histogram_selector.as_deref())?,
                )?,
            },
            ScraperKind::Availability => PageSelectors::Availability {
                offer: parse(
                    kind,
                    "offer",
                    required(kind, "offer", config.offer_selector.as_deref())?,
                )?,
                name_attr: config.offer_name_attr.clone(),
            },
        };

        Ok(Self {
            kind,
            base_url: config.base_url.clone(),
            page_template: config.page_template.clone(),
            search_template: config.search_template.clone(),
            year: parse(kind, "year", &config.year_selector)?,
            search_item: parse(kind, "search item", &config.search_item_selector)?,
            search_title: parse(kind, "search title", &config.search_title_selector)?,
            page,
        })
    }
}

fn required<'a>(kind: ScraperKind, selector: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or(ScrapeError::MissingSelector { kind, selector })
}

fn parse(kind: ScraperKind, selector: &'static str, value: &str) -> Result<Selector> {
    Selector::parse(value).map_err(|e| ScrapeError::InvalidSelector {
        kind,
        selector,
        reason: e.to_string(),
    })
}
