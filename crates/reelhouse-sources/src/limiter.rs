//! Per-source concurrency caps, call spacing and jitter.
//!
//! Every outbound call acquires a [`Permit`] for its source first. Permits
//! are granted in FIFO order, so no caller starves. A call starts no sooner
//! than `min_interval_ms` after both the previous start and the most recent
//! permit release for its source.

use rand::Rng;
use reelhouse_core::{LimitsConfig, Source, SourceLimits};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as SyncMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::trace;

/// Counters for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Permits currently held
    pub in_flight: usize,
    /// Highest number of permits held at once
    pub peak_in_flight: usize,
    /// Permits granted so far
    pub granted: u64,
}

struct SourceSlot {
    source: Source,
    limits: SourceLimits,
    semaphore: Option<Arc<Semaphore>>,
    next_start: Mutex<Option<Instant>>,
    last_release: SyncMutex<Option<Instant>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    granted: AtomicU64,
}

impl SourceSlot {
    fn new(source: Source, limits: SourceLimits) -> Self {
        let semaphore = limits.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));
        Self {
            source,
            limits,
            semaphore,
            next_start: Mutex::new(None),
            last_release: SyncMutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            granted: AtomicU64::new(0),
        }
    }

    /// Reserve the next start time and return how long to wait for it.
    async fn reserve_start(&self) -> Option<Instant> {
        if self.limits.min_interval_ms == 0 {
            return None;
        }

        let interval = Duration::from_millis(self.limits.min_interval_ms);
        let mut next = self.next_start.lock().await;
        let released = *self.last_release.lock().expect("acquire release lock");
        let start = [*next, released.map(|at| at + interval)]
            .into_iter()
            .flatten()
            .fold(Instant::now(), Instant::max);
        *next = Some(start + interval);
        Some(start)
    }

    fn mark_released(&self) {
        if self.limits.min_interval_ms == 0 {
            return;
        }
        if let Ok(mut last) = self.last_release.lock() {
            *last = Some(Instant::now());
        }
    }
}

/// Rate limiter shared by every component that calls an external source.
#[derive(Clone)]
pub struct RateLimiter {
    metadata: Arc<SourceSlot>,
    rating: Arc<SourceSlot>,
    rating_scraper: Arc<SourceSlot>,
    availability_scraper: Arc<SourceSlot>,
}

impl RateLimiter {
    /// Build a limiter from configured per-source limits.
    #[must_use]
    pub fn new(limits: &LimitsConfig) -> Self {
        let build =
            |source: Source| Arc::new(SourceSlot::new(source, limits.for_source(source).clone()));
        Self {
            metadata: build(Source::Metadata),
            rating: build(Source::Rating),
            rating_scraper: build(Source::RatingScraper),
            availability_scraper: build(Source::AvailabilityScraper),
        }
    }

    /// A limiter that never waits. Useful in tests.
    #[must_use]
    pub fn unlimited() -> Self {
        let open = SourceLimits::default();
        Self::new(&LimitsConfig {
            metadata: open.clone(),
            rating: open.clone(),
            rating_scraper: open.clone(),
            availability_scraper: open,
        })
    }

    fn slot(&self, source: Source) -> &Arc<SourceSlot> {
        match source {
            Source::Metadata => &self.metadata,
            Source::Rating => &self.rating,
            Source::RatingScraper => &self.rating_scraper,
            Source::AvailabilityScraper => &self.availability_scraper,
        }
    }

    /// Wait for a concurrency slot, then for the spacing interval, then for
    /// a random jitter.
    ///
    /// The returned permit releases the slot on drop.
    pub async fn acquire(&self, source: Source) -> Permit {
        let slot = Arc::clone(self.slot(source));

        let permit = match &slot.semaphore {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        if let Some(start) = slot.reserve_start().await {
            tokio::time::sleep_until(start).await;
        }

        if slot.limits.jitter_ms > 0 {
            let jitter = rand::thread_rng().gen_range(0..=slot.limits.jitter_ms);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        let in_flight = slot.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        slot.peak.fetch_max(in_flight, Ordering::SeqCst);
        slot.granted.fetch_add(1, Ordering::SeqCst);
        trace!(source = %slot.source, in_flight, "permit granted");

        Permit {
            slot,
            _permit: permit,
        }
    }

    /// Current counters for a source.
    #[must_use]
    pub fn stats(&self, source: Source) -> LimiterStats {
        let slot = self.slot(source);
        LimiterStats {
            in_flight: slot.in_flight.load(Ordering::SeqCst),
            peak_in_flight: slot.peak.load(Ordering::SeqCst),
            granted: slot.granted.load(Ordering::SeqCst),
        }
    }

    /// Configured limits for a source.
    #[must_use]
    pub fn limits(&self, source: Source) -> &SourceLimits {
        &self.slot(source).limits
    }
}

/// Held while a call to a source is in flight.
pub struct Permit {
    slot: Arc<SourceSlot>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Permit {
    /// Source this permit belongs to.
    #[must_use]
    pub fn source(&self) -> Source {
        self.slot.source
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.slot.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.slot.mark_released();
    }
}
