//! Reelhouse Pipeline - turns external ids into catalog records and keeps
//! them fresh.
//!
//! - [`Enricher`] runs the single-item pipeline
//! - [`FeedOrchestrator`] pages through discovery feeds and fans out
//!   pipeline runs
//! - [`SweepRunner`] refreshes one field group across the catalog
//!
//! Every fan-out goes through a [`WorkerPool`] and every API call through a
//! [`SourceGate`]. Per-item failures are logged and counted, never
//! propagated.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod enrichment;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod pool;
pub mod sweeps;

// Re-export commonly used types
pub use enrichment::{EnrichOutcome, Enricher, Rejection};
pub use error::{PipelineError, Result};
pub use gate::SourceGate;
pub use orchestrator::{FeedOrchestrator, FeedReport, OutcomeCounts};
pub use pool::WorkerPool;
pub use sweeps::{
    ItemOutcome, RunningSweeps, SweepGuard, SweepKind, SweepRunner, SweepSummary,
};
