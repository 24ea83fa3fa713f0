//! Pipeline error types.

use reelhouse_db::DatabaseError;
use reelhouse_lists::ListError;
use reelhouse_scraper::ScrapeError;
use reelhouse_sources::{FeedKind, SourceError};
use thiserror::Error;

use crate::sweeps::SweepKind;

/// Errors raised while enriching, fetching feeds or sweeping.
///
/// Inside a fan-out these are per-item failures: they are logged and
/// counted, never propagated to the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Store failure
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// External source failure
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Scraper failure
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Reference list failure
    #[error("list error: {0}")]
    List(#[from] ListError),

    /// A feed page could not be fetched; the feed run stopped there
    #[error("{feed} feed aborted after {pages_completed} pages: {source}")]
    FeedAborted {
        /// Feed that stopped
        feed: FeedKind,
        /// Pages fully processed before the failure
        pages_completed: u32,
        /// Page fetch error
        source: SourceError,
    },

    /// Another run of the same sweep is in progress
    #[error("a {0} sweep is already running")]
    SweepAlreadyRunning(SweepKind),

    /// The sweep needs a component that is not configured
    #[error("{kind} sweep needs {component}, which is not configured")]
    NotConfigured {
        /// Sweep that was requested
        kind: SweepKind,
        /// Missing component
        component: &'static str,
    },

    /// A worker task panicked
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
