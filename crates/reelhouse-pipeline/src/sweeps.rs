//! Full-catalog refresh passes, one field group each.

use crate::enrichment::Enricher;
use crate::error::{PipelineError, Result};
use crate::pool::WorkerPool;
use reelhouse_core::{CatalogRecord, ScraperKind, SweepConfig};
use reelhouse_db::{RecordPatch, ReferenceKind};
use reelhouse_scraper::{PageData, ScrapeMachine};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Which field group a sweep refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepKind {
    /// Streaming providers
    Availability,
    /// Recommended items
    Recommendations,
    /// Scraped rating
    Rating,
    /// Secondary ratings and detail fields
    SecondaryRating,
}

impl SweepKind {
    /// All sweeps.
    pub const ALL: [SweepKind; 4] = [
        SweepKind::Availability,
        SweepKind::Recommendations,
        SweepKind::Rating,
        SweepKind::SecondaryRating,
    ];

    /// Stable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Availability => "availability",
            Self::Recommendations => "recommendations",
            Self::Rating => "rating",
            Self::SecondaryRating => "secondary-rating",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown sweep '{s}'"))
    }
}

/// What a sweep did to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The field group was written
    Updated,
    /// Nothing to write for this record
    Skipped,
}

/// Final counts of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    /// Sweep that ran
    pub kind: SweepKind,
    /// Records submitted
    pub attempted: usize,
    /// Records updated
    pub succeeded: usize,
    /// Records with nothing to update
    pub skipped: usize,
    /// Records whose refresh failed
    pub failed: usize,
    /// Wall time
    pub elapsed: Duration,
}

impl SweepSummary {
    fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            attempted: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Share of processed (non-skipped) records that succeeded, in percent.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        let processed = self.succeeded + self.failed;
        if processed == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.succeeded as f64 / processed as f64 * 100.0;
        Some(rate)
    }
}

/// Sweep kinds currently running, shared by every runner that must not
/// overlap.
pub type RunningSweeps = Arc<Mutex<HashSet<SweepKind>>>;

/// Held while a sweep kind runs; a second run of the same kind is refused.
pub struct SweepGuard {
    running: RunningSweeps,
    kind: SweepKind,
}

impl SweepGuard {
    /// Mark `kind` as running.
    pub fn acquire(running: &RunningSweeps, kind: SweepKind) -> Result<Self> {
        let mut held = running.lock().expect("acquire sweep lock");
        if !held.insert(kind) {
            return Err(PipelineError::SweepAlreadyRunning(kind));
        }
        Ok(Self {
            running: Arc::clone(running),
            kind,
        })
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.running.lock() {
            held.remove(&self.kind);
        }
    }
}

/// Runs sweeps over the catalog.
pub struct SweepRunner {
    enricher: Arc<Enricher>,
    availability_scraper: Option<Arc<ScrapeMachine>>,
    pool: WorkerPool,
    config: SweepConfig,
    running: RunningSweeps,
}

impl SweepRunner {
    /// Create a runner.
    pub fn new(enricher: Arc<Enricher>, config: SweepConfig) -> Self {
        Self {
            enricher,
            availability_scraper: None,
            pool: WorkerPool::new(config.workers),
            config,
            running: RunningSweeps::default(),
        }
    }

    /// Share the running-sweep set with other runners, so a kind running
    /// on one of them is refused on all.
    #[must_use]
    pub fn with_running(mut self, running: RunningSweeps) -> Self {
        self.running = running;
        self
    }

    /// Also scrape the availability site during availability sweeps.
    #[must_use]
    pub fn with_availability_scraper(mut self, machine: Arc<ScrapeMachine>) -> Self {
        self.availability_scraper = Some(machine);
        self
    }

    /// Run a sweep over the whole catalog, or over the first `limit`
    /// records.
    pub async fn run(&self, kind: SweepKind, limit: Option<usize>) -> Result<SweepSummary> {
        let _guard = SweepGuard::acquire(&self.running, kind)?;
        self.check_configured(kind)?;

        let mut records = self
            .enricher
            .store()
            .list_all(self.config.list_page_size)
            .await?;
        if let Some(limit) = limit {
            records.truncate(limit);
        }

        let total = records.len();
        let interval = self.config.progress_interval.max(1);
        let started = Instant::now();
        let mut summary = SweepSummary::new(kind);
        info!(sweep = %kind, total, workers = self.pool.workers(), "starting sweep");

        let counts = &mut summary;
        self.pool
            .run(
                records,
                |record| self.refresh(kind, record),
                |result| {
                    counts.attempted += 1;
                    match result {
                        Ok(ItemOutcome::Updated) => counts.succeeded += 1,
                        Ok(ItemOutcome::Skipped) => counts.skipped += 1,
                        Err(e) => {
                            counts.failed += 1;
                            if matches!(e, PipelineError::TaskPanicked(_)) {
                                warn!(sweep = %kind, error = %e, "item panicked");
                            }
                        }
                    }
                    if counts.attempted % interval == 0 {
                        info!(
                            sweep = %kind,
                            done = counts.attempted,
                            total,
                            failed = counts.failed,
                            "sweep progress"
                        );
                    }
                },
            )
            .await;

        summary.elapsed = started.elapsed();
        info!(
            sweep = %kind,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            success_rate = summary.success_rate().unwrap_or(0.0),
            elapsed_secs = summary.elapsed.as_secs(),
            "sweep complete"
        );
        Ok(summary)
    }

    fn check_configured(&self, kind: SweepKind) -> Result<()> {
        match kind {
            SweepKind::Rating if self.enricher.rating_scraper().is_none() => {
                Err(PipelineError::NotConfigured {
                    kind,
                    component: "a rating scraper",
                })
            }
            SweepKind::SecondaryRating if !self.enricher.has_rating_source() => {
                Err(PipelineError::NotConfigured {
                    kind,
                    component: "a rating source",
                })
            }
            _ => Ok(()),
        }
    }

    async fn refresh(&self, kind: SweepKind, record: CatalogRecord) -> Result<ItemOutcome> {
        let id = record.external_id;
        if self.enricher.lists().is_banned(id) {
            debug!(sweep = %kind, external_id = %id, "ban-listed, skipping");
            return Ok(ItemOutcome::Skipped);
        }

        let result = match kind {
            SweepKind::Availability => self.refresh_availability(&record).await,
            SweepKind::Recommendations => self.refresh_recommendations(&record).await,
            SweepKind::Rating => self.refresh_rating(&record).await,
            SweepKind::SecondaryRating => self.refresh_secondary(&record).await,
        };

        if let Err(e) = &result {
            warn!(sweep = %kind, external_id = %id, error = %e, "refresh failed");
        }
        result
    }

    async fn refresh_availability(&self, record: &CatalogRecord) -> Result<ItemOutcome> {
        let id = record.external_id;
        let store = self.enricher.store();
        let detail = self.enricher.fetch_detail(id).await?;
        let mut providers = self.enricher.providers(&detail);

        if let Some(machine) = &self.availability_scraper {
            match self.enricher.scrape(machine, record).await {
                Ok(outcome) => {
                    if let Some(url) = outcome.cache_update {
                        store
                            .apply(
                                id,
                                RecordPatch::CachedUrl {
                                    kind: ScraperKind::Availability,
                                    url,
                                },
                            )
                            .await?;
                    }
                    if let Some(PageData::Providers(scraped)) = outcome.data {
                        providers.extend(scraped);
                    }
                }
                Err(e) => warn!(external_id = %id, error = %e, "availability scrape failed"),
            }
        }

        for provider in &providers {
            store
                .get_or_create_reference(ReferenceKind::Provider, &provider.name)
                .await?;
        }
        store.apply(id, RecordPatch::Providers(providers)).await?;
        Ok(ItemOutcome::Updated)
    }

    async fn refresh_recommendations(&self, record: &CatalogRecord) -> Result<ItemOutcome> {
        let id = record.external_id;
        let detail = self.enricher.fetch_detail(id).await?;
        let items = self.enricher.recommendations(&detail);
        self.enricher
            .store()
            .apply(id, RecordPatch::Recommendations(items))
            .await?;
        Ok(ItemOutcome::Updated)
    }

    async fn refresh_rating(&self, record: &CatalogRecord) -> Result<ItemOutcome> {
        let Some(machine) = self.enricher.rating_scraper() else {
            return Ok(ItemOutcome::Skipped);
        };
        let id = record.external_id;
        let store = self.enricher.store();
        let outcome = self.enricher.scrape(machine, record).await?;

        if let Some(url) = outcome.cache_update {
            store
                .apply(
                    id,
                    RecordPatch::CachedUrl {
                        kind: ScraperKind::Rating,
                        url,
                    },
                )
                .await?;
        }

        match outcome.data {
            Some(PageData::Rating(rating)) => {
                store
                    .apply(id, RecordPatch::ScrapedRating(Some(rating)))
                    .await?;
                Ok(ItemOutcome::Updated)
            }
            _ => Ok(ItemOutcome::Skipped),
        }
    }

    async fn refresh_secondary(&self, record: &CatalogRecord) -> Result<ItemOutcome> {
        let Some(xref) = record.cross_reference_id.as_deref() else {
            return Ok(ItemOutcome::Skipped);
        };
        match self.enricher.lookup_secondary(xref).await? {
            Some(patch) => {
                self.enricher
                    .store()
                    .apply(record.external_id, RecordPatch::SecondaryRating(patch))
                    .await?;
                Ok(ItemOutcome::Updated)
            }
            None => Ok(ItemOutcome::Skipped),
        }
    }
}
