//! Bounded-concurrency fan-out executor
//!
//! This module provides the one generic concurrency primitive the pipeline
//! is built on: run an asynchronous operation over an ordered collection of
//! work items with at most `limit` operations in flight, and hand back the
//! results in input order regardless of completion order.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

use crate::{MirrorError, Result};

/// Maps `op` over `items` with at most `limit` operations in flight.
///
/// Guarantees:
/// - `result[i]` corresponds to `items[i]` regardless of completion order.
/// - At most `limit` operations run concurrently; inputs smaller than the
///   limit run with effective concurrency equal to the input size.
/// - The first operation to fail aborts the batch: operations already in
///   flight are allowed to settle, no new ones are started, and the call
///   returns that first error.
/// - An empty input resolves immediately to an empty vector.
///
/// A `limit` of zero is a programming error and returns
/// [`MirrorError::InvalidArgument`] before any operation is invoked.
pub async fn map_with_concurrency<T, R, F, Fut>(items: Vec<T>, limit: usize, op: F) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if limit == 0 {
        return Err(MirrorError::InvalidArgument(
            "concurrency limit must be a positive integer".to_string(),
        ));
    }

    let total = items.len();
    let mut results: Vec<Option<R>> = Vec::with_capacity(total);
    results.resize_with(total, || None);

    let mut pending = items.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    // Tagging goes through one closure so the priming and refill pushes
    // share a single future type.
    let tag = |index: usize, fut: Fut| async move { (index, fut.await) };

    // Prime the window.
    for (index, item) in pending.by_ref().take(limit) {
        in_flight.push(tag(index, op(item)));
    }

    let mut first_error: Option<MirrorError> = None;

    while let Some((index, outcome)) = in_flight.next().await {
        match outcome {
            Ok(value) => {
                results[index] = Some(value);
                // Schedule the next item only while the batch is healthy.
                if first_error.is_none() {
                    if let Some((next_index, item)) = pending.next() {
                        in_flight.push(tag(next_index, op(item)));
                    }
                }
            }
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }

    // Every slot was filled: each input index was scheduled exactly once and
    // the error path returned above.
    Ok(results
        .into_iter()
        .map(|slot| slot.expect("bounded map result slot filled"))
        .collect())
}
