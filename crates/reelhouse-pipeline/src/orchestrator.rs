//! Paginated discovery feeds fanned out into the enrichment pipeline.

use crate::enrichment::{EnrichOutcome, Enricher};
use crate::error::{PipelineError, Result};
use crate::gate::SourceGate;
use crate::pool::WorkerPool;
use reelhouse_core::{ExternalId, FeedConfig, Source};
use reelhouse_db::Flag;
use reelhouse_sources::{FeedKind, MetadataSource};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-outcome tallies of a batch of pipeline runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Records created
    pub created: usize,
    /// Records that already existed
    pub existing: usize,
    /// Ids missing from the master index
    pub unresolved: usize,
    /// Ban-listed ids
    pub banned: usize,
    /// Items rejected by validation
    pub rejected: usize,
    /// Items whose run failed
    pub failed: usize,
}

impl OutcomeCounts {
    /// Count one result.
    pub fn record(&mut self, result: &Result<EnrichOutcome>) {
        match result {
            Ok(EnrichOutcome::Created) => self.created += 1,
            Ok(EnrichOutcome::AlreadyExists) => self.existing += 1,
            Ok(EnrichOutcome::Unresolved) => self.unresolved += 1,
            Ok(EnrichOutcome::BanListed) => self.banned += 1,
            Ok(EnrichOutcome::Rejected(_)) => self.rejected += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Items counted so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.existing + self.unresolved + self.banned + self.rejected + self.failed
    }
}

/// Result of one feed run.
#[derive(Debug, Clone, Serialize)]
pub struct FeedReport {
    /// Feed that ran
    #[serde(serialize_with = "serialize_feed")]
    pub feed: FeedKind,
    /// Pages requested
    pub pages_requested: u32,
    /// Pages fully processed
    pub pages_completed: u32,
    /// Records whose flag was cleared before the run
    pub flags_reset: u64,
    /// Outcome tallies
    pub outcomes: OutcomeCounts,
}

fn serialize_feed<S: serde::Serializer>(
    feed: &FeedKind,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(feed)
}

/// Runs discovery feeds.
pub struct FeedOrchestrator {
    enricher: Arc<Enricher>,
    metadata: Arc<dyn MetadataSource>,
    gate: SourceGate,
    pool: WorkerPool,
    config: FeedConfig,
}

impl FeedOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        enricher: Arc<Enricher>,
        metadata: Arc<dyn MetadataSource>,
        gate: SourceGate,
        config: FeedConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.workers);
        Self {
            enricher,
            metadata,
            gate,
            pool,
            config,
        }
    }

    /// Flag a feed owns with full-replace semantics.
    #[must_use]
    pub fn flag_for(feed: FeedKind) -> Option<Flag> {
        match feed {
            FeedKind::Popular => Some(Flag::Popular),
            FeedKind::NowPlaying => Some(Flag::NowPlaying),
            FeedKind::Discover => None,
        }
    }

    /// Configured page count for a feed.
    #[must_use]
    pub fn pages_for(&self, feed: FeedKind) -> u32 {
        match feed {
            FeedKind::Popular => self.config.popular_pages,
            FeedKind::NowPlaying => self.config.now_playing_pages,
            FeedKind::Discover => self.config.discover_pages,
        }
    }

    /// Run a feed with its configured page count.
    pub async fn run(&self, feed: FeedKind) -> Result<FeedReport> {
        self.run_pages(feed, self.pages_for(feed)).await
    }

    /// Run a feed over pages `1..=pages`.
    ///
    /// A feed that owns a flag clears it across the catalog before the
    /// first page, so after the run exactly the records confirmed by this
    /// run carry it. A failed page fetch stops the feed.
    pub async fn run_pages(&self, feed: FeedKind, pages: u32) -> Result<FeedReport> {
        let flag = Self::flag_for(feed);
        let mut report = FeedReport {
            feed,
            pages_requested: pages,
            pages_completed: 0,
            flags_reset: 0,
            outcomes: OutcomeCounts::default(),
        };

        if let Some(flag) = flag {
            report.flags_reset = self.enricher.store().reset_flag(flag).await?;
            info!(%feed, %flag, reset = report.flags_reset, "flag cleared before feed run");
        }

        let expected = usize::try_from(pages)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.config.page_size)
            .max(1);
        info!(%feed, pages, "starting feed");

        for page in 1..=pages {
            let feed_page = match self
                .gate
                .call(Source::Metadata, || self.metadata.feed_page(feed, page))
                .await
            {
                Ok(feed_page) => feed_page,
                Err(source) => {
                    error!(
                        %feed,
                        page,
                        pages_completed = report.pages_completed,
                        error = %source,
                        "feed page failed, aborting feed"
                    );
                    return Err(PipelineError::FeedAborted {
                        feed,
                        pages_completed: report.pages_completed,
                        source,
                    });
                }
            };

            let ids: Vec<ExternalId> = feed_page
                .results
                .iter()
                .filter_map(|item| match ExternalId::new(item.id) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        debug!(%feed, page, error = %e, "skipping feed item");
                        None
                    }
                })
                .collect();

            let outcomes = &mut report.outcomes;
            self.pool
                .run(
                    ids,
                    |id| self.enricher.process(id, flag),
                    |result| {
                        if let Err(e) = &result {
                            warn!(%feed, page, error = %e, "item failed");
                        }
                        outcomes.record(&result);
                    },
                )
                .await;

            report.pages_completed = page;
            let percent = (report.outcomes.total() * 100 / expected).min(100);
            info!(%feed, page, pages, percent, "page processed");

            if feed_page.total_pages > 0 && page >= feed_page.total_pages {
                debug!(%feed, page, "feed exhausted");
                break;
            }
        }

        info!(
            %feed,
            pages = report.pages_completed,
            created = report.outcomes.created,
            existing = report.outcomes.existing,
            failed = report.outcomes.failed,
            "feed complete"
        );
        Ok(report)
    }
}
