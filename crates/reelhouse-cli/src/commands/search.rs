//! Single-item search command handler.

use crate::state::AppContext;
use anyhow::Result;
use reelhouse_core::ExternalId;
use reelhouse_pipeline::EnrichOutcome;

/// What to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Resolve through the master index
    Title(String),
    /// Use the id directly
    Id(ExternalId),
}

/// Run the pipeline for one title or id.
pub async fn run(ctx: &AppContext, lookup: Lookup) -> Result<EnrichOutcome> {
    let outcome = match &lookup {
        Lookup::Title(title) => ctx.enricher.search_and_fetch_by_title(title).await?,
        Lookup::Id(id) => ctx.enricher.search_and_fetch_by_id(*id).await?,
    };

    match lookup {
        Lookup::Title(title) => println!("{title}: {outcome}"),
        Lookup::Id(id) => println!("{id}: {outcome}"),
    }
    Ok(outcome)
}
