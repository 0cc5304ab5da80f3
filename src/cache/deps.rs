//! Tag collector for the response cache.
//!
//! Handlers call [`record`] for every content item or listing that shapes the
//! response. The middleware wraps the handler in [`with_collector`] and stores
//! the response under the collected tags, so a later `invalidate_tags` on any
//! of them evicts it.

use std::cell::RefCell;
use std::collections::BTreeSet;

use super::CacheTag;

tokio::task_local! {
    static TAGS: RefCell<BTreeSet<String>>;
}

/// Record a tag for the response being built. A no-op outside a collector.
pub fn record(tag: impl Into<CacheTag>) {
    let tag = tag.into().to_string();
    let _ = TAGS.try_with(|tags| {
        tags.borrow_mut().insert(tag);
    });
}

/// Tags recorded so far in the current collector scope.
pub fn collect() -> Vec<String> {
    TAGS.try_with(|tags| tags.borrow().iter().cloned().collect())
        .unwrap_or_default()
}

/// Run `f` with a fresh collector and return its output with the recorded
/// tags, sorted and deduplicated.
pub async fn with_collector<F, R>(f: F) -> (R, Vec<String>)
where
    F: std::future::Future<Output = R>,
{
    TAGS.scope(RefCell::new(BTreeSet::new()), async move {
        let result = f.await;
        (result, collect())
    })
    .await
}
