//!
//! Bounded concurrency for keyed requests.
//!
use crate::Result;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;

/// Run `f` once for every key with at most `limit` futures in flight.
///
/// Waits for every future to finish. The outcome of each call is stored under its key,
/// so a failing key never hides the results of the others. A `limit` of zero is treated as one.
pub async fn run_bounded<K, V, I, F, Fut>(keys: I, limit: usize, f: F) -> BTreeMap<K, Result<V>>
where
    K: Ord + Clone,
    I: IntoIterator<Item = K>,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V>>,
{
    let f = &f;
    futures_util::stream::iter(keys)
        .map(|key| async move {
            let outcome = f(key.clone()).await;
            (key, outcome)
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
