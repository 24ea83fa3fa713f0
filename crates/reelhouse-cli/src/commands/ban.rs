//! Ban command handler.

use crate::commands::search::Lookup;
use anyhow::{Context, Result};
use reelhouse_core::{AppConfig, ExternalId};
use reelhouse_lists::ReferenceLists;
use tracing::info;

/// Add an id (or a title's id) to the ban-list file, reload the lists and
/// drop the id's cached scrape URLs.
///
/// Removing an already stored record is left to the catalog store's owner.
pub fn run(config: &AppConfig, lookup: Lookup) -> Result<bool> {
    let lists = ReferenceLists::load(&config.data, &config.pipeline)
        .context("failed to load reference lists")?;
    let id = resolve(&lists, &lookup)?;
    let added = lists.ban(id).context("failed to update ban list")?;

    if added {
        info!(external_id = %id, banned = lists.banned_count(), "id banned");
        println!("{id}: banned");
    } else {
        println!("{id}: already banned");
    }
    Ok(added)
}

fn resolve(lists: &ReferenceLists, lookup: &Lookup) -> Result<ExternalId> {
    match lookup {
        Lookup::Id(id) => Ok(*id),
        Lookup::Title(title) => lists
            .master_index()
            .resolve_title(title)
            .with_context(|| format!("title '{title}' is not in the master index")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelhouse_lists::{BanList, IndexEntry, MasterIndex, ProviderAllowList};
    use std::collections::BTreeMap;

    fn lists() -> ReferenceLists {
        let master = MasterIndex::from_entries([IndexEntry {
            id: 42,
            title: "Dune".to_string(),
        }]);
        ReferenceLists::new(
            BanList::default(),
            ProviderAllowList::new(["Tubi TV"], BTreeMap::new()),
            master,
        )
    }

    #[test]
    fn test_resolve_title_through_master_index() {
        let lists = lists();
        let id = resolve(&lists, &Lookup::Title("dune".to_string())).expect("resolve title");
        assert_eq!(id.get(), 42);

        let raw = ExternalId::new(7).expect("valid id");
        assert_eq!(resolve(&lists, &Lookup::Id(raw)).expect("resolve id"), raw);
    }

    #[test]
    fn test_unknown_title_is_an_error() {
        let err = resolve(&lists(), &Lookup::Title("Solaris".to_string()))
            .expect_err("unresolved title");
        assert!(err.to_string().contains("Solaris"));
    }
}
