//! Content read models the cache tier depends on.
//!
//! The CMS owns posts, categories, tags and pages. The warmer and the
//! invalidation service only need to list them and map ids to public URLs,
//! which is what [`ContentSource`] exposes.

mod api;
mod memory;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub use api::ApiContentSource;
pub use memory::MemoryContentSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Category,
    Tag,
    Page,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [Self::Post, Self::Category, Self::Tag, Self::Page];

    /// Prefix of entity tags, e.g. `post` in `post:42`.
    pub fn entity_prefix(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Page => "page",
        }
    }

    /// Collection tag and path segment, e.g. `posts`.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Category => "categories",
            Self::Tag => "tags",
            Self::Page => "pages",
        }
    }

    pub fn from_entity_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.entity_prefix() == prefix)
    }

    pub fn from_collection(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.collection() == raw)
    }

    /// Public listing path, e.g. `/posts`.
    pub fn listing_path(self) -> String {
        format!("/{}", self.collection())
    }

    /// Public path of one item.
    pub fn public_path(self, slug: &str) -> String {
        format!("/{}/{slug}", self.collection())
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_prefix())
    }
}

/// One content item as seen by the cache tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Number of published posts; only reported for categories and tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_count: Option<u64>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, updated_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            updated_at,
            post_count: None,
        }
    }

    pub fn with_post_count(mut self, count: u64) -> Self {
        self.post_count = Some(count);
        self
    }

    /// Categories and tags without posts render empty listings and are not
    /// worth warming. Items that report no count always qualify.
    pub fn has_posts(&self) -> bool {
        self.post_count.is_none_or(|count| count > 0)
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Transport(String),
    #[error("content api answered {status} for `{url}`")]
    Status { status: u16, url: String },
    #[error("invalid content payload: {0}")]
    Payload(String),
}

/// Read access to one kind of content.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Every published (or visible) item.
    async fn list_published(&self) -> Result<Vec<ContentItem>, ContentError>;

    /// Most viewed items over the last `since_days` days, best first.
    async fn list_popular(
        &self,
        since_days: u32,
        limit: usize,
    ) -> Result<Vec<ContentItem>, ContentError>;

    async fn list_updated_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<ContentItem>, ContentError>;

    async fn find(&self, id: &str) -> Result<Option<ContentItem>, ContentError>;
}

/// The four content sources the warmer walks.
#[derive(Clone)]
pub struct ContentCatalog {
    pub posts: Arc<dyn ContentSource>,
    pub categories: Arc<dyn ContentSource>,
    pub tags: Arc<dyn ContentSource>,
    pub pages: Arc<dyn ContentSource>,
}

impl ContentCatalog {
    /// Catalog backed by the CMS read API.
    pub fn from_settings(settings: &crate::config::ContentSettings) -> Result<Self, ContentError> {
        let client = ApiContentSource::client(settings.timeout)?;
        let source = |kind: ContentKind| -> Arc<dyn ContentSource> {
            Arc::new(ApiContentSource::new(
                client.clone(),
                settings.api_base_url.clone(),
                kind,
            ))
        };
        Ok(Self {
            posts: source(ContentKind::Post),
            categories: source(ContentKind::Category),
            tags: source(ContentKind::Tag),
            pages: source(ContentKind::Page),
        })
    }

    pub fn source(&self, kind: ContentKind) -> &Arc<dyn ContentSource> {
        match kind {
            ContentKind::Post => &self.posts,
            ContentKind::Category => &self.categories,
            ContentKind::Tag => &self.tags,
            ContentKind::Page => &self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_vocabulary_round_trips() {
        for kind in ContentKind::ALL {
            assert_eq!(ContentKind::from_entity_prefix(kind.entity_prefix()), Some(kind));
            assert_eq!(ContentKind::from_collection(kind.collection()), Some(kind));
        }
        assert_eq!(ContentKind::from_collection("authors"), None);
    }

    #[test]
    fn paths_follow_collection_names() {
        assert_eq!(ContentKind::Category.listing_path(), "/categories");
        assert_eq!(ContentKind::Post.public_path("hello-world"), "/posts/hello-world");
    }

    #[test]
    fn items_without_count_qualify() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert!(ContentItem::new("1", "a", now).has_posts());
        assert!(ContentItem::new("1", "a", now).with_post_count(3).has_posts());
        assert!(!ContentItem::new("1", "a", now).with_post_count(0).has_posts());
    }

    #[test]
    fn item_json_shape() {
        let json = serde_json::json!({
            "id": "7",
            "slug": "rust",
            "updated_at": "2026-01-02T03:04:05Z",
            "post_count": 4
        });
        let item: ContentItem = serde_json::from_value(json).expect("item");
        assert_eq!(item.slug, "rust");
        assert_eq!(item.post_count, Some(4));
    }
}
