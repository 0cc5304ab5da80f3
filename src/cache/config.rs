//! Page cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 3_600;
const DEFAULT_COMPRESSION_THRESHOLD: usize = 10 * 1024;
const DEFAULT_KEY_PREFIX: &str = "folio:";
const DEFAULT_STATS_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store responses through the page cache.
    pub enabled: bool,
    /// TTL applied when the caller does not pass one.
    pub default_ttl: Duration,
    pub compression_enabled: bool,
    /// Bodies strictly larger than this many bytes are gzip-compressed.
    pub compression_threshold: usize,
    /// Namespace prepended to every key the cache writes.
    pub key_prefix: String,
    /// Lifetime of the hit/miss counters.
    pub stats_ttl: Duration,
    /// Largest body the middleware buffers for storage.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            compression_enabled: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            stats_ttl: Duration::from_secs(DEFAULT_STATS_TTL_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl: settings.default_ttl,
            compression_enabled: settings.compression_enabled,
            compression_threshold: settings.compression_threshold,
            key_prefix: settings.key_prefix.clone(),
            stats_ttl: settings.stats_ttl,
            max_body_bytes: settings.max_body_bytes,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Threshold to hand to the entry encoder, `None` when compression is off.
    pub fn compress_above(&self) -> Option<usize> {
        self.compression_enabled
            .then_some(self.compression_threshold)
    }

    pub(crate) fn page_key(&self, key: &str) -> String {
        format!("{}page:{key}", self.key_prefix)
    }

    pub(crate) fn page_prefix(&self) -> String {
        format!("{}page:", self.key_prefix)
    }

    pub(crate) fn tag_key(&self, tag: &str) -> String {
        format!("{}tag:{tag}", self.key_prefix)
    }

    pub(crate) fn tag_prefix(&self) -> String {
        format!("{}tag:", self.key_prefix)
    }

    pub(crate) fn stats_key(&self, counter: &str) -> String {
        format!("{}stats:{counter}", self.key_prefix)
    }
}
