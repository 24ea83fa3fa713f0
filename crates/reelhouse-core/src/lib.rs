//! Reelhouse Core - Foundation crate for the catalog ingestion pipeline.
//!
//! This crate provides the shared catalog data model, error handling and
//! configuration that every other Reelhouse crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ExternalId`, `Source`, `Timestamp`)
//! - [`record`] - The catalog record and its field groups
//!
//! # Example
//!
//! ```rust
//! use reelhouse_core::{AppConfig, ExternalId, Source};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let limits = config.limits.for_source(Source::Metadata);
//! assert_eq!(limits.max_concurrent, Some(20));
//!
//! let id: ExternalId = "42".parse()?;
//! assert_eq!(id.get(), 42);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod record;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BackoffConfig, DataConfig, FeedConfig, LimitsConfig, MetadataConfig,
    PipelineConfig, RatingConfig, ScraperConfig, SiteConfig, SourceLimits, SweepConfig,
};
pub use error::{ConfigError, ConfigResult, ReelError, Result};
pub use record::{CachedUrl, CatalogRecord, RecommendedItem, ScrapedRating, StreamingProvider};
pub use types::{ExternalId, ScraperKind, Source, Timestamp};
