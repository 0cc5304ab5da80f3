//! Page cache round trips against a real Redis.
//!
//! - Marked `#[ignore]`; run with `cargo test -- --ignored` after starting
//!   Redis on `FOLIO_TEST_REDIS_HOST` (default `127.0.0.1:6379`).
//! - Uses database 15 and a per-run key prefix, flushed at the end.

use std::sync::Arc;
use std::time::Duration;

use folio_cache::cache::{CacheConfig, CachedResponse, PageCache};
use folio_cache::config::NodeSettings;
use folio_cache::kv::{RedisNode, ReplicatedKv};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

fn node_settings() -> NodeSettings {
    let raw = std::env::var("FOLIO_TEST_REDIS_HOST").unwrap_or_else(|_| "127.0.0.1:6379".into());
    let (host, port) = raw.split_once(':').unwrap_or((raw.as_str(), "6379"));
    NodeSettings {
        host: host.to_string(),
        port: port.parse().unwrap_or(6379),
        password: None,
        db: 15,
    }
}

fn cache() -> TestResult<PageCache> {
    let node = RedisNode::new(&node_settings())?;
    let kv = Arc::new(ReplicatedKv::new(Arc::new(node)));
    let config = CacheConfig {
        key_prefix: format!("folio-test:{}:", uuid::Uuid::new_v4()),
        ..Default::default()
    };
    Ok(PageCache::new(kv, config))
}

#[tokio::test]
#[ignore]
async fn live_store_lookup_and_invalidate() -> TestResult<()> {
    let cache = cache()?;
    cache.kv().connect().await?;

    let body = "x".repeat(20_000);
    let response = CachedResponse::new(200, body.clone()).with_header("content-type", "text/html");
    cache
        .cache_response(
            "https://blog.example.com/posts/live?b=2&a=1",
            &response,
            &["post:live".to_string(), "posts".to_string()],
            Some(Duration::from_secs(60)),
        )
        .await?;

    let hit = cache
        .get_cached_response("https://blog.example.com/posts/live?a=1&b=2")
        .await?
        .ok_or("expected a hit")?;
    assert_eq!(hit.body.len(), body.len());
    assert_eq!(hit.header("content-type"), Some("text/html"));

    let removed = cache.invalidate_tags(&["post:live".to_string()]).await?;
    assert_eq!(removed, 1);
    assert!(
        cache
            .get_cached_response("https://blog.example.com/posts/live?a=1&b=2")
            .await?
            .is_none()
    );

    let stats = cache.stats().await?;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    cache.flush_all().await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_cluster_reports_master_health() -> TestResult<()> {
    let cache = cache()?;
    let nodes = cache.kv().cluster_nodes().await;
    assert_eq!(nodes.len(), 1);
    let rendered = serde_json::to_value(&nodes)?;
    assert_eq!(rendered[0]["role"], "master");
    Ok(())
}
