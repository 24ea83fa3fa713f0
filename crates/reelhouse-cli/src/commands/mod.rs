//! Subcommand handlers.

pub mod ban;
pub mod fetch;
pub mod schedule;
pub mod search;
pub mod sweep;
