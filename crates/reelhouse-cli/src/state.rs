//! Component wiring shared by every subcommand.

use anyhow::{Context, Result};
use reelhouse_core::{AppConfig, ScraperKind};
use reelhouse_db::{CatalogStore, SqliteCatalogStore};
use reelhouse_lists::ReferenceLists;
use reelhouse_pipeline::{Enricher, FeedOrchestrator, RunningSweeps, SourceGate, SweepRunner};
use reelhouse_scraper::{ScrapeMachine, SiteDefinition};
use reelhouse_sources::{HttpPageFetcher, MetadataClient, MetadataSource, RateLimiter, RatingClient};
use std::sync::Arc;
use tracing::{info, warn};

/// Fully wired pipeline components.
pub struct AppContext {
    /// Loaded configuration
    pub config: AppConfig,
    /// Single-item pipeline
    pub enricher: Arc<Enricher>,
    metadata: Arc<dyn MetadataSource>,
    gate: SourceGate,
    availability_scraper: Arc<ScrapeMachine>,
    running_sweeps: RunningSweeps,
}

impl AppContext {
    /// Open the store, load reference lists and build the source clients.
    ///
    /// The secondary rating source is optional; without an API key the
    /// pipeline skips that step.
    pub async fn init(config: AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data.dir).with_context(|| {
            format!("failed to create data directory {}", config.data.dir.display())
        })?;

        let lists = ReferenceLists::load(&config.data, &config.pipeline)
            .context("failed to load reference lists")?;

        let db_path = config.data.resolve(&config.data.database);
        let store: Arc<dyn CatalogStore> = Arc::new(
            SqliteCatalogStore::connect(&db_path)
                .await
                .context("failed to open catalog database")?,
        );

        let limiter = RateLimiter::new(&config.limits);
        let gate = SourceGate::new(limiter.clone(), config.backoff.clone());

        let metadata: Arc<dyn MetadataSource> = Arc::new(
            MetadataClient::new(&config.metadata).context("failed to build metadata client")?,
        );

        let rating_scraper = scrape_machine(&config, ScraperKind::Rating, &limiter)?;
        let availability_scraper = scrape_machine(&config, ScraperKind::Availability, &limiter)?;

        let mut enricher = Enricher::new(
            store,
            Arc::clone(&metadata),
            lists,
            gate.clone(),
            config.pipeline.clone(),
        )
        .with_watch_region(config.metadata.watch_region.clone())
        .with_rating_scraper(rating_scraper);

        match RatingClient::new(&config.rating) {
            Ok(client) => enricher = enricher.with_rating_source(Arc::new(client)),
            Err(e) => warn!(error = %e, "secondary rating source disabled"),
        }

        info!(
            data_dir = %config.data.dir.display(),
            banned = enricher.lists().banned_count(),
            indexed = enricher.lists().master_index().len(),
            "pipeline ready"
        );

        Ok(Self {
            config,
            enricher: Arc::new(enricher),
            metadata,
            gate,
            availability_scraper,
            running_sweeps: RunningSweeps::default(),
        })
    }

    /// Feed orchestrator over the shared enricher.
    pub fn feeds(&self) -> FeedOrchestrator {
        FeedOrchestrator::new(
            Arc::clone(&self.enricher),
            Arc::clone(&self.metadata),
            self.gate.clone(),
            self.config.feeds.clone(),
        )
    }

    /// Sweep runner over the shared enricher. Runners built here share one
    /// running-sweep set.
    pub fn sweeps(&self) -> SweepRunner {
        SweepRunner::new(Arc::clone(&self.enricher), self.config.sweeps.clone())
            .with_availability_scraper(Arc::clone(&self.availability_scraper))
            .with_running(Arc::clone(&self.running_sweeps))
    }
}

fn scrape_machine(
    config: &AppConfig,
    kind: ScraperKind,
    limiter: &RateLimiter,
) -> Result<Arc<ScrapeMachine>> {
    let site_config = config.scrapers.site(kind);
    let site = SiteDefinition::compile(kind, site_config)
        .with_context(|| format!("invalid {kind} scraper definition"))?;
    let fetcher = HttpPageFetcher::new(site_config.timeout_secs)
        .with_context(|| format!("failed to build {kind} page fetcher"))?;

    Ok(Arc::new(ScrapeMachine::new(
        Arc::new(site),
        Arc::new(fetcher),
        limiter.clone(),
        config.backoff.clone(),
    )))
}
