//! Full-page cache.
//!
//! Serialized response snapshots live in the replicated KV store, keyed by
//! the SHA-256 of the canonical request and indexed by tag so a content
//! change can evict every page that embeds it:
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 3600
//! compression_enabled = true
//! compression_threshold_bytes = 10240
//! key_prefix = "folio:"
//! ```

mod compression;
mod config;
pub mod deps;
mod entry;
mod keys;
mod middleware;
mod store;
mod tags;

use thiserror::Error;

use crate::kv::KvError;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedResponse, SAFE_HEADERS, TAGS_HEADER, retain_safe_headers};
pub use keys::{CacheKey, canonical_url};
pub use middleware::{CacheState, STATUS_HEADER, WARMUP_HEADER, page_cache_layer};
pub use store::{CacheStats, PageCache};
pub use tags::{CacheTag, HOMEPAGE, to_strings as tag_strings};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("failed to encode cache entry: {0}")]
    Encode(String),
    #[error("failed to decode cache entry: {0}")]
    Decode(String),
    #[error("gzip failure: {0}")]
    Compression(String),
    #[error("entry `{key}` decompressed to {actual} bytes, expected {expected}")]
    LengthMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },
}
