//! Job scheduling: determines when jobs are due and persists the schedule.

use crate::error::{Result, SchedulerError};
use crate::jobs::{JobType, ScheduledJob};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Returns true if `next_run_at` is at or before `now`.
///
/// Unparseable timestamps are never due.
#[must_use]
pub fn is_job_due(next_run_at: &str, now: &str) -> bool {
    let next = DateTime::parse_from_rfc3339(next_run_at).ok();
    let current = DateTime::parse_from_rfc3339(now).ok();
    match (next, current) {
        (Some(n), Some(c)) => n <= c,
        _ => false,
    }
}

/// RFC 3339 timestamp for `from + interval_days`.
#[must_use]
pub fn next_run_timestamp(from: DateTime<Utc>, interval_days: u32) -> String {
    (from + Duration::days(i64::from(interval_days))).to_rfc3339()
}

/// Schedule state for every job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// One entry per job type
    pub jobs: Vec<ScheduledJob>,
}

impl Schedule {
    /// A schedule where every job is due at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut schedule = Self { jobs: Vec::new() };
        schedule.fill_missing(now);
        schedule
    }

    /// Load schedule state, or start a fresh schedule if the file is absent.
    ///
    /// Job types missing from an older state file are added as due.
    pub fn load(path: &Path, now: DateTime<Utc>) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no schedule state, starting fresh");
            return Ok(Self::new(now));
        }

        let contents = fs::read_to_string(path).map_err(|source| SchedulerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut schedule: Schedule = serde_json::from_str(&contents)?;
        for job in &schedule.jobs {
            if DateTime::parse_from_rfc3339(&job.next_run_at).is_err() {
                return Err(SchedulerError::InvalidTimestamp(job.next_run_at.clone()));
            }
        }
        schedule.fill_missing(now);
        Ok(schedule)
    }

    /// Write the schedule, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| SchedulerError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Entry for a job type.
    #[must_use]
    pub fn job(&self, job_type: JobType) -> Option<&ScheduledJob> {
        self.jobs.iter().find(|job| job.job_type == job_type)
    }

    /// Enabled jobs whose next run is at or before `now`, in schedule order.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<JobType> {
        let now = now.to_rfc3339();
        self.jobs
            .iter()
            .filter(|job| job.enabled && is_job_due(&job.next_run_at, &now))
            .map(|job| job.job_type)
            .collect()
    }

    /// Record a completed run and push the next run out by the interval.
    pub fn mark_run(&mut self, job_type: JobType, now: DateTime<Utc>) {
        if let Some(job) = self.jobs.iter_mut().find(|job| job.job_type == job_type) {
            job.last_run_at = Some(now.to_rfc3339());
            job.next_run_at = next_run_timestamp(now, job.interval_days);
            info!(job = %job_type, next_run_at = %job.next_run_at, "job run recorded");
        }
    }

    /// Enable or disable a job.
    pub fn set_enabled(&mut self, job_type: JobType, enabled: bool) {
        if let Some(job) = self.jobs.iter_mut().find(|job| job.job_type == job_type) {
            job.enabled = enabled;
        }
    }

    fn fill_missing(&mut self, now: DateTime<Utc>) {
        for job_type in JobType::ALL {
            if self.job(job_type).is_none() {
                self.jobs.push(ScheduledJob {
                    job_type,
                    interval_days: job_type.default_interval_days(),
                    next_run_at: now.to_rfc3339(),
                    last_run_at: None,
                    enabled: true,
                });
            }
        }
    }
}
