//! Bounded-concurrency batch runner.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

/// In-flight ceiling for tag and upload batches.
pub const MAX_CONCURRENT: usize = 3;

/// Run `op` over every item with at most `limit` operations in flight.
///
/// A new operation starts as soon as one finishes. `on_complete` is called
/// once per finished operation with `(completed, total)`, in completion
/// order. Returns when every operation has finished; an item's outcome is
/// its own business, so nothing here can cut a batch short.
pub async fn run_bounded<T, F, Fut, P>(items: Vec<T>, limit: usize, op: F, mut on_complete: P) -> usize
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
    P: FnMut(usize, usize),
{
    let total = items.len();
    let mut queue = items.into_iter();
    let mut in_flight = FuturesUnordered::new();
    for item in queue.by_ref().take(limit.max(1)) {
        in_flight.push(op(item));
    }

    let mut completed = 0;
    while in_flight.next().await.is_some() {
        completed += 1;
        on_complete(completed, total);
        if let Some(item) = queue.next() {
            in_flight.push(op(item));
        }
    }
    completed
}
