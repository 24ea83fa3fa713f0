//! Reelhouse Sources - Rate limiting and clients for external sources.
//!
//! Every network call in the workspace goes through this crate:
//!
//! - [`limiter`] - per-source concurrency caps, spacing and jitter
//! - [`metadata`] - the primary metadata API (detail, feeds)
//! - [`rating`] - the secondary rating API
//! - [`pages`] - raw HTML fetching for the scrapers
//!
//! Sources are traits so tests can substitute in-process fakes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod http;
pub mod limiter;
pub mod metadata;
pub mod pages;
pub mod rating;

// Re-export commonly used types
pub use error::{Result, SourceError};
pub use limiter::{LimiterStats, Permit, RateLimiter};
pub use metadata::{FeedItem, FeedKind, FeedPage, ItemDetail, MetadataClient, MetadataSource};
pub use pages::{HttpPageFetcher, Page, PageFetcher};
pub use rating::{RatingClient, RatingSource, SecondaryRating};
