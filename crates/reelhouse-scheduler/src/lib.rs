//! Reelhouse Scheduler - interval scheduling for feed runs and sweeps.
//!
//! Every feed and sweep is a [`JobType`] with an interval in days. The
//! [`Schedule`] keeps one [`ScheduledJob`] per type in a JSON state file and
//! reports which jobs are due.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod jobs;
pub mod scheduler;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use jobs::{JobType, ScheduledJob};
pub use scheduler::{is_job_due, next_run_timestamp, Schedule};
