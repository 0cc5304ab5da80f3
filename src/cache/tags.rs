//! Tag vocabulary shared by the page cache, the edge and the warmer.
//!
//! Tags are plain strings on the wire (`post:42`, `posts`, `homepage`).
//! [`CacheTag`] is the parsed form used when a tag has to be mapped back to
//! content.

use std::fmt;

use crate::content::ContentKind;

pub const HOMEPAGE: &str = "homepage";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// One content item, e.g. `post:42`.
    Entity { kind: ContentKind, id: String },
    /// Every listing of a kind, e.g. `posts`.
    Collection(ContentKind),
    Homepage,
    /// Anything outside the known vocabulary.
    Custom(String),
}

impl CacheTag {
    pub fn entity(kind: ContentKind, id: impl Into<String>) -> Self {
        Self::Entity {
            kind,
            id: id.into(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == HOMEPAGE {
            return Self::Homepage;
        }
        if let Some(kind) = ContentKind::from_collection(raw) {
            return Self::Collection(kind);
        }
        if let Some((prefix, id)) = raw.split_once(':')
            && let Some(kind) = ContentKind::from_entity_prefix(prefix)
            && !id.is_empty()
        {
            return Self::entity(kind, id);
        }
        Self::Custom(raw.to_string())
    }

    /// Tags a mutation of `kind`/`id` has to invalidate: the item itself plus
    /// every coarse listing that can embed it.
    pub fn for_change(kind: ContentKind, id: &str) -> Vec<Self> {
        let entity = Self::entity(kind, id);
        match kind {
            ContentKind::Post => vec![
                entity,
                Self::Collection(ContentKind::Post),
                Self::Collection(ContentKind::Category),
                Self::Collection(ContentKind::Tag),
                Self::Homepage,
            ],
            ContentKind::Category => vec![
                entity,
                Self::Collection(ContentKind::Category),
                Self::Collection(ContentKind::Post),
            ],
            ContentKind::Tag => vec![
                entity,
                Self::Collection(ContentKind::Tag),
                Self::Collection(ContentKind::Post),
            ],
            ContentKind::Page => vec![entity, Self::Collection(ContentKind::Page), Self::Homepage],
        }
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity { kind, id } => write!(f, "{}:{id}", kind.entity_prefix()),
            Self::Collection(kind) => f.write_str(kind.collection()),
            Self::Homepage => f.write_str(HOMEPAGE),
            Self::Custom(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for CacheTag {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

pub fn to_strings(tags: &[CacheTag]) -> Vec<String> {
    tags.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vocabulary() {
        assert_eq!(
            CacheTag::parse("post:42"),
            CacheTag::entity(ContentKind::Post, "42")
        );
        assert_eq!(
            CacheTag::parse("categories"),
            CacheTag::Collection(ContentKind::Category)
        );
        assert_eq!(CacheTag::parse(" homepage "), CacheTag::Homepage);
        assert_eq!(
            CacheTag::parse("author:9"),
            CacheTag::Custom("author:9".to_string())
        );
        assert_eq!(CacheTag::parse("post:"), CacheTag::Custom("post:".to_string()));
    }

    #[test]
    fn display_round_trips_known_tags() {
        for raw in ["post:42", "tag:rust", "pages", "homepage", "custom-thing"] {
            assert_eq!(CacheTag::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn post_change_touches_listings_and_homepage() {
        let tags = to_strings(&CacheTag::for_change(ContentKind::Post, "42"));
        assert_eq!(tags, vec!["post:42", "posts", "categories", "tags", "homepage"]);
    }

    #[test]
    fn category_change_touches_post_listings() {
        let tags = to_strings(&CacheTag::for_change(ContentKind::Category, "7"));
        assert_eq!(tags, vec!["category:7", "categories", "posts"]);
    }
}
