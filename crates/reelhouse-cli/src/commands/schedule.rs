//! Scheduler command handlers.

use crate::commands::{fetch, sweep};
use crate::state::AppContext;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use reelhouse_core::AppConfig;
use reelhouse_pipeline::SweepKind;
use reelhouse_scheduler::{JobType, Schedule};
use reelhouse_sources::FeedKind;
use tracing::{error, info};

/// Concrete work behind a job type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    /// Run a discovery feed with its configured page count
    Feed(FeedKind),
    /// Run a full sweep
    Sweep(SweepKind),
}

/// Map a schedulable job onto the pipeline operation it runs.
#[must_use]
pub fn action_for(job: JobType) -> JobAction {
    match job {
        JobType::PopularFeed => JobAction::Feed(FeedKind::Popular),
        JobType::NowPlayingFeed => JobAction::Feed(FeedKind::NowPlaying),
        JobType::DiscoverFeed => JobAction::Feed(FeedKind::Discover),
        JobType::AvailabilitySweep => JobAction::Sweep(SweepKind::Availability),
        JobType::RecommendationsSweep => JobAction::Sweep(SweepKind::Recommendations),
        JobType::RatingSweep => JobAction::Sweep(SweepKind::Rating),
        JobType::SecondaryRatingSweep => JobAction::Sweep(SweepKind::SecondaryRating),
    }
}

/// Print the schedule.
pub fn list(config: &AppConfig) -> Result<()> {
    let path = config.data.resolve(&config.data.schedule_state);
    let schedule = Schedule::load(&path, Utc::now()).context("failed to load schedule")?;
    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}

/// Run every due job in order, recording each success.
///
/// A failed job is logged and left due; the remaining jobs still run.
pub async fn run_due(ctx: &AppContext) -> Result<()> {
    let path = ctx.config.data.resolve(&ctx.config.data.schedule_state);
    let mut schedule = Schedule::load(&path, Utc::now()).context("failed to load schedule")?;

    let due = schedule.due(Utc::now());
    if due.is_empty() {
        info!("no jobs due");
        return Ok(());
    }
    info!(count = due.len(), "running due jobs");

    let mut failed = Vec::new();
    for job in due {
        let result = match action_for(job) {
            JobAction::Feed(feed) => fetch::run(ctx, feed, None).await.map(|_| ()),
            JobAction::Sweep(kind) => sweep::run(ctx, kind, None).await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                schedule.mark_run(job, Utc::now());
                schedule.save(&path).context("failed to save schedule")?;
            }
            Err(e) => {
                error!(%job, error = %e, "scheduled job failed");
                failed.push(job);
            }
        }
    }

    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|job| job.as_str()).collect();
        bail!("{} job(s) failed: {}", failed.len(), names.join(", "));
    }
    Ok(())
}
