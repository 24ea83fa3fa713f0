//! Job type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every schedulable unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobType {
    /// Popular feed run
    PopularFeed,
    /// Now-playing feed run
    NowPlayingFeed,
    /// Discover feed run
    DiscoverFeed,
    /// Streaming availability sweep
    AvailabilitySweep,
    /// Recommendation sweep
    RecommendationsSweep,
    /// Scraped rating sweep
    RatingSweep,
    /// Secondary rating sweep
    SecondaryRatingSweep,
}

impl JobType {
    /// All job types, feeds first.
    pub const ALL: [JobType; 7] = [
        JobType::PopularFeed,
        JobType::NowPlayingFeed,
        JobType::DiscoverFeed,
        JobType::AvailabilitySweep,
        JobType::RecommendationsSweep,
        JobType::RatingSweep,
        JobType::SecondaryRatingSweep,
    ];

    /// Stable name used on the command line and in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PopularFeed => "popular-feed",
            Self::NowPlayingFeed => "now-playing-feed",
            Self::DiscoverFeed => "discover-feed",
            Self::AvailabilitySweep => "availability-sweep",
            Self::RecommendationsSweep => "recommendations-sweep",
            Self::RatingSweep => "rating-sweep",
            Self::SecondaryRatingSweep => "secondary-rating-sweep",
        }
    }

    /// Interval used when a job is first scheduled.
    ///
    /// Feeds change daily; sweeps revisit the whole catalog and run weekly.
    #[must_use]
    pub fn default_interval_days(self) -> u32 {
        match self {
            Self::PopularFeed | Self::NowPlayingFeed | Self::DiscoverFeed => 1,
            Self::AvailabilitySweep
            | Self::RecommendationsSweep
            | Self::RatingSweep
            | Self::SecondaryRatingSweep => 7,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| format!("unknown job '{s}'"))
    }
}

/// Persisted schedule entry for one job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Which job
    pub job_type: JobType,
    /// Days between runs
    pub interval_days: u32,
    /// RFC 3339 time of the next run
    pub next_run_at: String,
    /// RFC 3339 time of the last completed run
    pub last_run_at: Option<String>,
    /// Disabled jobs are never due
    pub enabled: bool,
}
