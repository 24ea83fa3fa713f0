//! Reelhouse Database Layer
//!
//! Defines the narrow persistence interface the pipeline writes through and
//! ships two implementations of it.
//!
//! # Architecture
//!
//! - **Interface**: [`CatalogStore`] covers lookup, create-once, whole-record
//!   update, field-group patches, paging and shared reference entities
//! - **Field groups**: every post-creation write is a [`RecordPatch`] touching
//!   exactly one group of columns
//! - **Stores**: [`MemoryCatalogStore`] for tests, [`SqliteCatalogStore`]
//!   backed by `SQLx` with embedded migrations
//!
//! # Example
//!
//! ```ignore
//! use reelhouse_db::{CatalogStore, SqliteCatalogStore};
//!
//! let store = SqliteCatalogStore::connect("catalog.db").await?;
//! let total = store.count().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod memory;
pub mod migrations;
pub mod patch;
pub mod sqlite;
pub mod store;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use memory::MemoryCatalogStore;
pub use patch::{Flag, RecordPatch, SecondaryRatingPatch};
pub use sqlite::SqliteCatalogStore;
pub use store::{CatalogStore, ReferenceEntity, ReferenceKind};
