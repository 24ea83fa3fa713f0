//! Bounded fan-out shared by feeds and sweeps.

use crate::error::{PipelineError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Runs one future per item with at most `workers` in flight.
///
/// Errors and panics are turned into a failed item result; nothing an item
/// does can stop the run.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Pool with the given concurrency (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Configured concurrency.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task` for every item, handing each result to `on_complete` in
    /// completion order.
    pub async fn run<I, T, F, Fut, C>(&self, items: I, task: F, mut on_complete: C)
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: FnMut(Result<T>),
    {
        let mut futures = FuturesUnordered::new();

        for item in items {
            futures.push(AssertUnwindSafe(task(item)).catch_unwind());

            while futures.len() >= self.workers {
                if let Some(result) = futures.next().await {
                    on_complete(flatten(result));
                }
            }
        }

        while let Some(result) = futures.next().await {
            on_complete(flatten(result));
        }
    }
}

fn flatten<T>(result: std::result::Result<Result<T>, Box<dyn Any + Send>>) -> Result<T> {
    match result {
        Ok(inner) => inner,
        Err(panic) => Err(PipelineError::TaskPanicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut done = 0;

        WorkerPool::new(3)
            .run(
                0..10,
                |_| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                |result: Result<()>| {
                    assert!(result.is_ok());
                    done += 1;
                },
            )
            .await;

        assert_eq!(done, 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_errors_and_panics_are_isolated() {
        let mut ok = 0;
        let mut failed = Vec::new();

        WorkerPool::new(2)
            .run(
                0..5,
                |i| async move {
                    match i {
                        1 => Err(PipelineError::TaskPanicked("simulated".to_string())),
                        3 => panic!("item {i} blew up"),
                        _ => Ok(i),
                    }
                },
                |result| match result {
                    Ok(_) => ok += 1,
                    Err(e) => failed.push(e.to_string()),
                },
            )
            .await;

        assert_eq!(ok, 3);
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().any(|m| m.contains("item 3 blew up")));
    }

    #[test]
    fn test_zero_workers_means_one() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }
}
