//! Sweep command handler.

use crate::state::AppContext;
use anyhow::{Context, Result};
use reelhouse_pipeline::{SweepKind, SweepSummary};

/// Run one sweep, optionally over a sample of the catalog.
pub async fn run(ctx: &AppContext, kind: SweepKind, limit: Option<usize>) -> Result<SweepSummary> {
    let summary = ctx
        .sweeps()
        .run(kind, limit)
        .await
        .with_context(|| format!("{kind} sweep failed"))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}
