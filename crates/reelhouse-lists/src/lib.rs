//! Reelhouse Lists - Reference lists loaded at startup.
//!
//! Loads the ban list, the provider allow-list, the master title index and
//! the scrape URL caches into in-memory lookup structures. Missing list files
//! are fatal: enrichment cannot run safely without ban-list semantics.
//!
//! # Example
//!
//! ```rust
//! use reelhouse_lists::{BanList, MasterIndex, ProviderAllowList, ReferenceLists};
//! use std::collections::BTreeMap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bans = BanList::parse("# comment\n13\n", "inline")?;
//! let providers = ProviderAllowList::new(["Tubi TV", "Pluto TV"], BTreeMap::new());
//! let lists = ReferenceLists::new(bans, providers, MasterIndex::default());
//!
//! assert!(lists.is_banned("13".parse()?));
//! assert_eq!(lists.providers().rank("Pluto TV"), Some(1));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod ban_list;
pub mod error;
pub mod master_index;
pub mod providers;
pub mod reference;
pub mod url_cache;

// Re-export commonly used types
pub use ban_list::BanList;
pub use error::{ListError, Result};
pub use master_index::{IndexEntry, MasterIndex};
pub use providers::ProviderAllowList;
pub use reference::ReferenceLists;
pub use url_cache::ScrapeUrlCache;
