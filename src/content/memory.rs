//! Fixed in-process content source for tests and local runs.

use std::sync::{
    RwLock,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{ContentError, ContentItem, ContentSource};

/// Content source over a fixed list. Popularity is list order.
#[derive(Debug, Default)]
pub struct MemoryContentSource {
    items: RwLock<Vec<ContentItem>>,
    failing: AtomicBool,
}

impl MemoryContentSource {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: RwLock::new(items),
            failing: AtomicBool::new(false),
        }
    }

    pub fn replace(&self, items: Vec<ContentItem>) {
        *self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = items;
    }

    /// Make every call fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Result<Vec<ContentItem>, ContentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContentError::Transport("source unavailable".to_string()));
        }
        Ok(self
            .items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn list_published(&self) -> Result<Vec<ContentItem>, ContentError> {
        self.snapshot()
    }

    async fn list_popular(
        &self,
        _since_days: u32,
        limit: usize,
    ) -> Result<Vec<ContentItem>, ContentError> {
        let mut items = self.snapshot()?;
        items.truncate(limit);
        Ok(items)
    }

    async fn list_updated_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<ContentItem>, ContentError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|item| item.updated_at >= since)
            .collect())
    }

    async fn find(&self, id: &str) -> Result<Option<ContentItem>, ContentError> {
        Ok(self.snapshot()?.into_iter().find(|item| item.id == id))
    }
}
