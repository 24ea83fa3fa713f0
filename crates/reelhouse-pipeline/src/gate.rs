//! Rate-limited calls to the API sources.

use reelhouse_core::{BackoffConfig, Source};
use reelhouse_scraper::backoff_delay;
use reelhouse_sources::{RateLimiter, SourceError};
use std::future::Future;
use tracing::warn;

/// Wraps every API call in a limiter permit and retries 429s with the
/// configured backoff.
#[derive(Clone)]
pub struct SourceGate {
    limiter: RateLimiter,
    backoff: BackoffConfig,
}

impl SourceGate {
    /// Create a gate.
    #[must_use]
    pub fn new(limiter: RateLimiter, backoff: BackoffConfig) -> Self {
        Self { limiter, backoff }
    }

    /// Gate without limits or backoff delays worth waiting for. Useful in tests.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(RateLimiter::unlimited(), BackoffConfig::default())
    }

    /// The underlying limiter.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Backoff settings.
    #[must_use]
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Run `call` under a permit for `source`, retrying while it reports a
    /// rate limit. Any other error is returned as is.
    pub async fn call<T, F, Fut>(&self, source: Source, mut call: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let result = {
                let _permit = self.limiter.acquire(source).await;
                call().await
            };

            match result {
                Err(e) if e.is_rate_limited() => {
                    if let Some(max) = self.backoff.max_rate_limit_retries {
                        if attempt >= max {
                            return Err(e);
                        }
                    }
                    let delay = backoff_delay(&self.backoff, attempt);
                    warn!(%source, attempt, delay_secs = delay.as_secs(), "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limited_calls() {
        let gate = SourceGate::unlimited();
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let value = gate
            .call(Source::Metadata, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SourceError::RateLimited {
                        origin: Source::Metadata,
                        status: 429,
                    })
                } else {
                    Ok(7)
                }
            })
            .await
            .expect("eventually succeeds");

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(25));
        assert_eq!(gate.limiter().stats(Source::Metadata).granted, 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let gate = SourceGate::unlimited();
        let calls = AtomicU32::new(0);

        let err = gate
            .call(Source::Rating, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SourceError::Upstream {
                    origin: Source::Rating,
                    status: 500,
                    message: "boom".to_string(),
                })
            })
            .await
            .expect_err("upstream error");

        assert!(matches!(err, SourceError::Upstream { status: 500, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cap() {
        let gate = SourceGate::new(
            RateLimiter::unlimited(),
            BackoffConfig {
                max_rate_limit_retries: Some(1),
                ..BackoffConfig::default()
            },
        );
        let calls = AtomicU32::new(0);

        let err = gate
            .call(Source::Metadata, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SourceError::RateLimited {
                    origin: Source::Metadata,
                    status: 429,
                })
            })
            .await
            .expect_err("cap reached");

        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
