//! Mutation entry point for the cache tier.
//!
//! When content changes, the page cache drops every entry tagged with the
//! item or its listings while the edge purges the item's URLs and bans the
//! same tags. Both run side by side. Afterwards the evicted pages can be
//! re-warmed so the next visitor does not pay for the render.

use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    cache::{CacheTag, PageCache, tag_strings},
    content::ContentKind,
    edge::{EdgePurger, PurgeSummary},
    warmup::{Warmer, WarmupReport},
};

const TARGET: &str = "folio::invalidation";

/// Identifies one changed content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: String,
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Post, id)
    }

    pub fn category(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Category, id)
    }

    pub fn tag(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Tag, id)
    }

    pub fn page(id: impl Into<String>) -> Self {
        Self::new(ContentKind::Page, id)
    }

    /// Every cache tag that may reference this item.
    pub fn tags(&self) -> Vec<String> {
        tag_strings(&CacheTag::for_change(self.kind, &self.id))
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.entity_prefix(), self.id)
    }
}

/// What one invalidation did. `cache_removed` is `None` when the page cache
/// could not be reached.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationOutcome {
    pub tags: Vec<String>,
    pub cache_removed: Option<u64>,
    pub edge: PurgeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup: Option<WarmupReport>,
}

pub struct InvalidationService {
    cache: Arc<PageCache>,
    edge: EdgePurger,
    warmer: Option<Arc<Warmer>>,
}

impl InvalidationService {
    pub fn new(cache: Arc<PageCache>, edge: EdgePurger) -> Self {
        Self {
            cache,
            edge,
            warmer: None,
        }
    }

    /// Re-warm evicted pages after each invalidation.
    pub fn with_warmer(mut self, warmer: Arc<Warmer>) -> Self {
        self.warmer = Some(warmer);
        self
    }

    /// Evicts everything derived from `item` from both cache layers. Never
    /// fails: an unreachable layer is logged and reported in the outcome.
    pub async fn content_changed(&self, item: &ContentRef) -> InvalidationOutcome {
        let tags = item.tags();
        let (cache_removed, edge) = tokio::join!(
            self.invalidate_page_cache(&tags),
            self.edge.purge_content(item.kind, &item.id),
        );

        let warmup = match &self.warmer {
            Some(warmer) => Some(warmer.warm_tags(&tags).await),
            None => None,
        };

        info!(
            target: TARGET,
            item = %item,
            cache_removed = ?cache_removed,
            edge_sent = edge.sent,
            edge_failed = edge.failed,
            "content invalidated"
        );
        InvalidationOutcome {
            tags,
            cache_removed,
            edge,
            warmup,
        }
    }

    /// Evicts arbitrary tags from both layers, optionally re-warming them.
    pub async fn invalidate_tags(&self, tags: &[String], warm: bool) -> InvalidationOutcome {
        let (cache_removed, edge) = tokio::join!(
            self.invalidate_page_cache(tags),
            self.edge.ban_tags(tags),
        );

        let warmup = match (&self.warmer, warm) {
            (Some(warmer), true) => Some(warmer.warm_tags(tags).await),
            _ => None,
        };

        InvalidationOutcome {
            tags: tags.to_vec(),
            cache_removed,
            edge,
            warmup,
        }
    }

    async fn invalidate_page_cache(&self, tags: &[String]) -> Option<u64> {
        match self.cache.invalidate_tags(tags).await {
            Ok(removed) => Some(removed),
            Err(err) => {
                warn!(
                    target: TARGET,
                    error = %err,
                    tags = tags.len(),
                    "page cache invalidation failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        cache::{CacheConfig, CachedResponse},
        edge::{EdgeError, EdgeRequest, EdgeTransport, EdgeVerb},
        kv::{KvNode, MemoryNode, ReplicatedKv},
    };

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<EdgeRequest>>,
    }

    #[async_trait]
    impl EdgeTransport for Recording {
        async fn send(&self, request: &EdgeRequest) -> Result<u16, EdgeError> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(200)
        }
    }

    fn cache(node: Arc<MemoryNode>) -> Arc<PageCache> {
        let kv = Arc::new(ReplicatedKv::new(node));
        Arc::new(PageCache::new(kv, CacheConfig::default()))
    }

    #[test]
    fn post_change_tags() {
        assert_eq!(
            ContentRef::post("42").tags(),
            vec!["post:42", "posts", "categories", "tags", "homepage"]
        );
    }

    #[tokio::test]
    async fn content_change_clears_both_layers() {
        let node = Arc::new(MemoryNode::new("memory"));
        let cache = cache(node);
        let response = CachedResponse::new(200, "<p>post</p>");
        cache
            .cache_response("/posts/hello", &response, &["post:42".to_string()], None)
            .await
            .expect("store");
        cache
            .cache_response("/about", &response, &["page:1".to_string()], None)
            .await
            .expect("store");

        let transport = Arc::new(Recording::default());
        let service = InvalidationService::new(cache.clone(), EdgePurger::new(transport.clone()));

        let outcome = service.content_changed(&ContentRef::post("42")).await;

        assert_eq!(outcome.cache_removed, Some(1));
        assert!(cache.get_cached_response("/posts/hello").await.expect("lookup").is_none());
        assert!(cache.get_cached_response("/about").await.expect("lookup").is_some());

        let requests = transport.requests.lock().expect("lock").clone();
        assert_eq!(
            requests.iter().filter(|r| r.verb == EdgeVerb::Purge).count(),
            5
        );
        assert_eq!(outcome.edge.failed, 0);
    }

    #[tokio::test]
    async fn post_change_spares_other_categories() {
        let node = Arc::new(MemoryNode::new("memory"));
        let cache = cache(node.clone());
        let response = CachedResponse::new(200, "<p>x</p>");
        cache
            .cache_response("/posts/42", &response, &["post:42".to_string()], None)
            .await
            .expect("store");
        cache
            .cache_response("/categories/7", &response, &["category:7".to_string()], None)
            .await
            .expect("store");

        let transport = Arc::new(Recording::default());
        let service = InvalidationService::new(cache.clone(), EdgePurger::new(transport));
        let tags = ["post:42", "posts", "homepage"].map(String::from);

        let outcome = service.invalidate_tags(&tags, false).await;

        assert_eq!(outcome.cache_removed, Some(1));
        assert!(cache.get_cached_response("/posts/42").await.expect("lookup").is_none());
        assert!(
            cache
                .get_cached_response("/categories/7")
                .await
                .expect("lookup")
                .is_some()
        );
        for tag in &tags {
            let key = cache.config().tag_key(tag);
            assert!(node.smembers(&key).await.expect("members").is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_cache_still_purges_edge() {
        let node = Arc::new(MemoryNode::new("memory"));
        node.set_available(false);
        let transport = Arc::new(Recording::default());
        let service = InvalidationService::new(cache(node), EdgePurger::new(transport.clone()));

        let outcome = service.content_changed(&ContentRef::page("about")).await;

        assert_eq!(outcome.cache_removed, None);
        assert_eq!(outcome.edge.sent, 3);
    }
}
