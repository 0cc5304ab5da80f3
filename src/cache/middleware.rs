//! Response path integration.
//!
//! Serves GET hits straight from the page cache and stores cacheable misses
//! under the tags the handler recorded through [`deps::record`]. Any cache
//! failure is logged and the request falls through to the handler.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::{CacheKey, CachedResponse, PageCache, TAGS_HEADER, deps};

const TARGET: &str = "folio::cache::middleware";

/// Sent by the warmer. Such requests skip the lookup so the handler runs and
/// the stored copy is refreshed.
pub const WARMUP_HEADER: &str = "x-cache-warmup";
pub const STATUS_HEADER: &str = "x-cache";

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub cache: Arc<PageCache>,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(state): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.cache.config().is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = request_key(&request);
    let warming = request.headers().contains_key(WARMUP_HEADER);

    if !warming {
        match state.cache.lookup(&key).await {
            Ok(Some(cached)) => {
                debug!(target: TARGET, outcome = "hit", "serving cached response");
                return build_response(cached);
            }
            Ok(None) => {
                debug!(target: TARGET, outcome = "miss", "cache miss, executing handler");
            }
            Err(err) => {
                warn!(target: TARGET, error = %err, "page cache unavailable; bypassing");
                return next.run(request).await;
            }
        }
    }

    let (response, tags) = deps::with_collector(next.run(request)).await;

    let headers = header_pairs(response.headers());
    if !PageCache::should_store_response(response.status().as_u16(), &headers) {
        return response;
    }

    let limit = state.cache.config().max_body_bytes;
    if !fits_in_cache(&response, limit) {
        debug!(target: TARGET, limit, "response body too large or unbounded; not caching");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(target: TARGET, error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers,
        body: bytes.clone(),
    };

    match state.cache.store(&key, &cached, &tags, None).await {
        Ok(()) => debug!(target: TARGET, tags = tags.len(), warming, "stored response"),
        Err(err) => warn!(target: TARGET, error = %err, "failed to store response"),
    }

    if !tags.is_empty()
        && let Ok(value) = HeaderValue::from_str(&tags.join(" "))
    {
        parts.headers.insert(TAGS_HEADER, value);
    }
    parts
        .headers
        .insert(STATUS_HEADER, HeaderValue::from_static("MISS"));

    Response::from_parts(parts, Body::from(bytes))
}

/// Cache identity of a request: its path and query plus the representation
/// it asks for.
fn request_key(request: &Request<Body>) -> CacheKey {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    CacheKey::for_request(target, &[("accept", representation(request.headers()))])
}

fn representation(headers: &HeaderMap) -> &'static str {
    let json = headers
        .get("accept")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if json { "json" } else { "html" }
}

/// Only bodies with a known upper bound within `limit` are buffered.
fn fits_in_cache(response: &Response, limit: usize) -> bool {
    response
        .body()
        .size_hint()
        .upper()
        .and_then(|upper| usize::try_from(upper).ok())
        .is_some_and(|upper| upper <= limit)
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .header(STATUS_HEADER, "HIT")
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_html_requests_get_distinct_keys() {
        let html = Request::builder()
            .uri("/posts/hello")
            .body(Body::empty())
            .unwrap();
        let json = Request::builder()
            .uri("/posts/hello")
            .header("Accept", "application/json")
            .body(Body::empty())
            .unwrap();
        assert_ne!(request_key(&html), request_key(&json));
    }

    #[test]
    fn query_order_does_not_split_keys() {
        let a = Request::builder()
            .uri("/tags?page=2&sort=new")
            .body(Body::empty())
            .unwrap();
        let b = Request::builder()
            .uri("/tags?sort=new&page=2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_key(&a), request_key(&b));
    }

    #[test]
    fn only_bounded_bodies_within_the_limit_fit() {
        let small = Response::new(Body::from("0123456789"));
        assert!(fits_in_cache(&small, 10));
        assert!(!fits_in_cache(&small, 9));
    }

    #[test]
    fn build_response_marks_hits() {
        let response = build_response(
            CachedResponse::new(200, "ok").with_header("content-type", "text/plain"),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[STATUS_HEADER], "HIT");
        assert_eq!(response.headers()["content-type"], "text/plain");
    }
}
