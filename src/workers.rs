//! Bounded Worker Pool
//!
//! Every per-device phase of a scan (probe, collect, dispatch) runs through
//! [`run_bounded`], so the number of sockets open at once never exceeds the
//! configured limit no matter how large the subnet is.

use futures_util::stream::{self, StreamExt};
use std::future::Future;

/// Runs `task` for every item with at most `limit` futures in flight.
///
/// Results come back in completion order. A `limit` of zero is treated as one.
pub async fn run_bounded<I, T, F, Fut>(items: I, limit: usize, task: F) -> Vec<T>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(task)
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
