//! Feed command handler.

use crate::state::AppContext;
use anyhow::{Context, Result};
use reelhouse_pipeline::FeedReport;
use reelhouse_sources::FeedKind;
use tracing::info;

/// Run one discovery feed and print its report.
pub async fn run(ctx: &AppContext, feed: FeedKind, pages: Option<u32>) -> Result<FeedReport> {
    let orchestrator = ctx.feeds();
    let pages = pages.unwrap_or_else(|| orchestrator.pages_for(feed));
    info!(%feed, pages, "fetching feed");

    let report = orchestrator
        .run_pages(feed, pages)
        .await
        .with_context(|| format!("{feed} feed failed"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report)
}
