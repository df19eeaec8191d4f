//! Bounded-concurrency fan-out.
//!
//! # Responsibilities
//! - Run one fetch per input item with at most K fetches in flight
//! - Return results in input order regardless of completion order
//!
//! # Design Decisions
//! - `min(K, N)` workers claim indices from a shared atomic cursor
//! - Workers are futures polled concurrently inside the caller's task, so
//!   items and the fetch function are borrowed rather than moved into spawned tasks
//! - Each worker keeps its own `(index, value)` buffer; buffers are merged into
//!   a pre-sized vector at the end, so result slots need no lock
//! - Fail fast: the first error drops every sibling worker, aborting in-flight
//!   fetches and claiming no further indices

use futures_util::future::try_join_all;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// A fan-out task failed; no partial results are returned.
#[derive(Debug, Error)]
#[error("fan-out task {index} failed: {error}")]
pub struct FanOutError<E: fmt::Display> {
    /// Position of the failing item in the input.
    pub index: usize,
    pub error: E,
}

/// Fetch every item with bounded concurrency, preserving input order.
///
/// A `concurrency` of zero is treated as one.
pub async fn fan_out<I, T, E, F, Fut>(
    items: &[I],
    concurrency: usize,
    fetch: F,
) -> Result<Vec<T>, FanOutError<E>>
where
    E: fmt::Display,
    F: Fn(&I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let workers = concurrency.max(1).min(items.len());
    let cursor = &AtomicUsize::new(0);
    let fetch = &fetch;

    tracing::debug!(tasks = items.len(), workers, "Starting fan-out");

    let worker = |_| async move {
        let mut done = Vec::new();
        loop {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(item) = items.get(index) else {
                return Ok(done);
            };
            match fetch(item).await {
                Ok(value) => done.push((index, value)),
                Err(error) => return Err(FanOutError { index, error }),
            }
        }
    };

    let batches = try_join_all((0..workers).map(worker)).await?;

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (index, value) in batches.into_iter().flatten() {
        slots[index] = Some(value);
    }
    let results: Vec<T> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), items.len());
    Ok(results)
}
