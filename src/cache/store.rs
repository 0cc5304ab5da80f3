//! Full-page cache over the replicated KV store.
//!
//! Layout inside the configured namespace:
//!
//! - `page:<sha256>` holds one JSON [`CacheEntry`] with its own TTL.
//! - `tag:<tag>` is a set of page keys, the reverse index used by
//!   [`PageCache::invalidate_tags`]. Its TTL only ever grows.
//! - `stats:hits` / `stats:misses` are counters that expire after the
//!   configured stats window.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::kv::{KeyTtl, ReplicatedKv};

use super::{CacheConfig, CacheEntry, CacheError, CacheKey, CachedResponse};

const TARGET: &str = "folio::cache";
const DELETE_CHUNK: usize = 500;

const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
const METRIC_CACHE_STORE: &str = "folio_cache_store_total";
const METRIC_CACHE_INVALIDATED: &str = "folio_cache_invalidated_total";

const STATS_HITS: &str = "hits";
const STATS_MISSES: &str = "misses";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_keys: u64,
    pub tag_sets: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    fn new(total_keys: u64, tag_sets: u64, hits: u64, misses: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Self {
            total_keys,
            tag_sets,
            hits,
            misses,
            hit_rate,
        }
    }
}

pub struct PageCache {
    kv: Arc<ReplicatedKv>,
    config: CacheConfig,
}

impl PageCache {
    pub fn new(kv: Arc<ReplicatedKv>, config: CacheConfig) -> Self {
        Self { kv, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn kv(&self) -> &Arc<ReplicatedKv> {
        &self.kv
    }

    /// Store `response` under the canonical form of `key` and register it
    /// under every tag. `ttl` defaults to the configured TTL.
    pub async fn cache_response(
        &self,
        key: &str,
        response: &CachedResponse,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> Result<CacheKey, CacheError> {
        let key = CacheKey::canonical(key);
        self.store(&key, response, tags, ttl).await?;
        Ok(key)
    }

    /// Store under an already canonical key.
    ///
    /// The entry write is the only step that can fail the call. A tag that
    /// cannot be registered afterwards is logged and skipped; the entry then
    /// lives untagged until its TTL runs out.
    pub async fn store(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry::build(
            key.as_str(),
            response,
            tags,
            ttl,
            self.config.compress_above(),
        )?;
        let encoded = entry.encode()?;
        let page_key = self.config.page_key(key.as_str());

        self.kv.set_ex(&page_key, &encoded, ttl).await?;
        counter!(METRIC_CACHE_STORE).increment(1);
        debug!(
            target: TARGET,
            key = %key,
            bytes = entry.original_len,
            stored_bytes = entry.payload.len(),
            compressed = entry.compressed,
            tags = tags.len(),
            "stored page"
        );

        for tag in tags {
            if let Err(err) = self.register_tag(tag, &page_key, ttl).await {
                warn!(
                    target: TARGET,
                    key = %key,
                    tag = %tag,
                    error = %err,
                    "tag registration failed; entry stays untagged until expiry"
                );
            }
        }

        Ok(())
    }

    async fn register_tag(&self, tag: &str, page_key: &str, ttl: Duration) -> Result<(), CacheError> {
        let tag_key = self.config.tag_key(tag);
        self.kv.sadd(&tag_key, page_key).await?;

        match self.kv.ttl(&tag_key).await? {
            KeyTtl::Expires(left) if left >= ttl => {}
            _ => self.kv.expire(&tag_key, ttl).await?,
        }
        Ok(())
    }

    /// Look up the canonical form of `key`.
    pub async fn get_cached_response(&self, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        self.lookup(&CacheKey::canonical(key)).await
    }

    /// Look up an already canonical key, counting the hit or miss. An entry
    /// that no longer decodes is dropped and reported as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let page_key = self.config.page_key(key.as_str());
        let Some(raw) = self.kv.get(&page_key).await? else {
            self.count(STATS_MISSES, METRIC_CACHE_MISS).await;
            return Ok(None);
        };

        match CacheEntry::decode(&raw).and_then(CacheEntry::into_response) {
            Ok(response) => {
                self.count(STATS_HITS, METRIC_CACHE_HIT).await;
                Ok(Some(response))
            }
            Err(err) => {
                warn!(target: TARGET, key = %key, error = %err, "dropping unreadable entry");
                if let Err(err) = self.kv.del(&[page_key]).await {
                    debug!(target: TARGET, key = %key, error = %err, "failed to drop entry");
                }
                self.count(STATS_MISSES, METRIC_CACHE_MISS).await;
                Ok(None)
            }
        }
    }

    /// Raw stored entry for inspection, without touching the counters.
    pub async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let page_key = self.config.page_key(key.as_str());
        match self.kv.get(&page_key).await? {
            Some(raw) => CacheEntry::decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn count(&self, stat: &str, metric: &'static str) {
        counter!(metric).increment(1);
        let key = self.config.stats_key(stat);
        if let Err(err) = self.kv.incr(&key, self.config.stats_ttl).await {
            debug!(target: TARGET, stat, error = %err, "failed to bump stats counter");
        }
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let key = CacheKey::canonical(key);
        let removed = self.kv.del(&[self.config.page_key(key.as_str())]).await?;
        counter!(METRIC_CACHE_INVALIDATED).increment(removed);
        Ok(removed > 0)
    }

    /// Delete every entry registered under any of `tags`, then the tag sets
    /// themselves. Returns how many entries were removed.
    ///
    /// Tags are processed in order and a failing tag does not stop the rest.
    /// The call only fails when every tag failed.
    pub async fn invalidate_tags(&self, tags: &[String]) -> Result<u64, CacheError> {
        let mut removed = 0;
        let mut first_error = None;
        let mut failed = 0;

        for tag in tags {
            match self.invalidate_tag(tag).await {
                Ok(count) => removed += count,
                Err(err) => {
                    warn!(
                        target: TARGET,
                        tag = %tag,
                        error = %err,
                        "invalidation partial failure"
                    );
                    failed += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        if failed > 0
            && failed == tags.len()
            && let Some(err) = first_error
        {
            return Err(err);
        }

        counter!(METRIC_CACHE_INVALIDATED).increment(removed);
        debug!(target: TARGET, tags = tags.len(), removed, failed, "invalidated tags");
        Ok(removed)
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, CacheError> {
        let tag_key = self.config.tag_key(tag);
        let members = self.kv.smembers(&tag_key).await?;

        let mut removed = 0;
        for chunk in members.chunks(DELETE_CHUNK) {
            removed += self.kv.del(chunk).await?;
        }
        self.kv.del(&[tag_key]).await?;
        Ok(removed)
    }

    /// Delete every key in the cache namespace: pages, tag sets and stats.
    /// Returns how many keys were removed.
    pub async fn flush_all(&self) -> Result<u64, CacheError> {
        let keys = self.kv.scan_prefix(&self.config.key_prefix).await?;
        let mut removed = 0;
        for chunk in keys.chunks(DELETE_CHUNK) {
            removed += self.kv.del(chunk).await?;
        }
        warn!(target: TARGET, removed, "flushed page cache");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let total_keys = self.kv.scan_prefix(&self.config.page_prefix()).await?.len() as u64;
        let tag_sets = self.kv.scan_prefix(&self.config.tag_prefix()).await?.len() as u64;
        let hits = self.read_counter(STATS_HITS).await?;
        let misses = self.read_counter(STATS_MISSES).await?;
        Ok(CacheStats::new(total_keys, tag_sets, hits, misses))
    }

    async fn read_counter(&self, stat: &str) -> Result<u64, CacheError> {
        let raw = self.kv.get(&self.config.stats_key(stat)).await?;
        Ok(raw
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|text| text.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Whether a response may be stored: 2xx, no cookies being set, and not
    /// an event stream.
    pub fn should_store_response(status: u16, headers: &[(String, String)]) -> bool {
        if !(200..300).contains(&status) {
            return false;
        }
        let sets_cookie = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("set-cookie"));
        let streams = headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("content-type")
                && value
                    .to_ascii_lowercase()
                    .starts_with("text/event-stream")
        });
        !sets_cookie && !streams
    }
}
