//! Reelhouse Scraper - best-effort scraping of the rating and availability
//! sites.
//!
//! Both scrapers share one [`ScrapeMachine`]; a [`SiteDefinition`] decides
//! which URLs are tried and what is extracted from the detail page.
//!
//! # Example
//!
//! ```rust
//! use reelhouse_core::{ScraperKind, SiteConfig};
//! use reelhouse_scraper::{page_url, slugify, SiteDefinition};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let site = SiteDefinition::compile(ScraperKind::Rating, &SiteConfig::rating_default())?;
//! let url = page_url(&site, &slugify("The Thing"));
//! assert_eq!(url, "https://letterboxd.com/film/the-thing/");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod machine;
pub mod parser;
pub mod site;
pub mod url_builder;

// Re-export commonly used types
pub use error::{Result, ScrapeError};
pub use machine::{backoff_delay, Rung, ScrapeMachine, ScrapeOutcome, ScrapeRequest};
pub use parser::{PageData, PageParser, SearchHit};
pub use site::{PageSelectors, SiteDefinition};
pub use url_builder::{page_url, search_url, slug_with_year, slugify};
