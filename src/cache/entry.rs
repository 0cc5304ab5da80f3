//! Stored response snapshots.

use std::{collections::BTreeMap, time::Duration};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{CacheError, compression};

/// Response headers that are safe to replay to any client. Everything else,
/// in particular anything carrying session or auth state, is dropped.
pub const SAFE_HEADERS: &[&str] = &[
    "content-type",
    "content-encoding",
    "cache-control",
    "etag",
    "last-modified",
];

/// Header carrying an entry's tags on restored responses, so the edge can
/// ban by tag.
pub const TAGS_HEADER: &str = "x-cache-tags";

/// Response as handed to and returned from the page cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serialized form of one cached response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    #[serde(with = "payload")]
    pub payload: Vec<u8>,
    pub compressed: bool,
    pub original_len: usize,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Snapshot `response`, gzip-compressing the body when `compress_above`
    /// is set and the body is strictly larger than it.
    pub fn build(
        key: &str,
        response: &CachedResponse,
        tags: &[String],
        ttl: Duration,
        compress_above: Option<usize>,
    ) -> Result<Self, CacheError> {
        let body = response.body.as_ref();
        let compressed = compress_above.is_some_and(|threshold| body.len() > threshold);
        let payload = if compressed {
            compression::compress(body)?
        } else {
            body.to_vec()
        };

        Ok(Self {
            key: key.to_string(),
            payload,
            compressed,
            original_len: body.len(),
            status: response.status,
            headers: retain_safe_headers(&response.headers),
            tags: tags.to_vec(),
            cached_at: OffsetDateTime::now_utc(),
            ttl_seconds: ttl.as_secs(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self).map_err(|err| CacheError::Encode(err.to_string()))
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(raw).map_err(|err| CacheError::Decode(err.to_string()))
    }

    /// Restore the original response, verifying the body length. The
    /// entry's tags come back as an [`TAGS_HEADER`] header.
    pub fn into_response(self) -> Result<CachedResponse, CacheError> {
        let body = if self.compressed {
            compression::decompress(&self.payload, self.original_len)?
        } else {
            self.payload
        };

        if body.len() != self.original_len {
            return Err(CacheError::LengthMismatch {
                key: self.key,
                expected: self.original_len,
                actual: body.len(),
            });
        }

        let mut headers: Vec<(String, String)> = self.headers.into_iter().collect();
        if !self.tags.is_empty() {
            headers.push((TAGS_HEADER.to_string(), self.tags.join(" ")));
        }

        Ok(CachedResponse {
            status: self.status,
            headers,
            body: Bytes::from(body),
        })
    }
}

/// Keep only replay-safe headers, lowercasing their names.
pub fn retain_safe_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.to_ascii_lowercase();
            SAFE_HEADERS
                .contains(&name.as_str())
                .then(|| (name, value.clone()))
        })
        .collect()
}

mod payload {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse::new(200, body.to_string())
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_header("Set-Cookie", "session=abc")
            .with_header("Authorization", "Bearer t")
            .with_header("ETag", "\"v1\"")
            .with_header("X-Request-Id", "r-1")
    }

    #[test]
    fn only_safe_headers_survive() {
        let entry = CacheEntry::build("k", &response("hi"), &[], Duration::from_secs(60), None)
            .expect("entry");
        let names: Vec<&str> = entry.headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["content-type", "etag"]);
    }

    #[test]
    fn small_bodies_stay_plain() {
        let entry = CacheEntry::build(
            "k",
            &response("short"),
            &[],
            Duration::from_secs(60),
            Some(10),
        )
        .expect("entry");
        assert!(!entry.compressed);
        assert_eq!(entry.payload, b"short");
    }

    #[test]
    fn threshold_is_exclusive() {
        let body = "x".repeat(10);
        let entry = CacheEntry::build("k", &response(&body), &[], Duration::from_secs(60), Some(10))
            .expect("entry");
        assert!(!entry.compressed);
    }

    #[test]
    fn json_payload_is_base64() {
        let entry = CacheEntry::build(
            "k",
            &CachedResponse::new(200, "hello"),
            &["posts".to_string()],
            Duration::from_secs(60),
            None,
        )
        .expect("entry");
        let raw = entry.encode().expect("encode");
        let json: serde_json::Value = serde_json::from_slice(&raw).expect("json");
        assert_eq!(json["payload"], "aGVsbG8=");
        assert_eq!(json["tags"], serde_json::json!(["posts"]));
        assert_eq!(json["ttl_seconds"], 60);
    }

    #[test]
    fn restored_response_carries_tags_header() {
        let entry = CacheEntry::build(
            "k",
            &CachedResponse::new(200, "hello"),
            &["post:1".to_string(), "posts".to_string()],
            Duration::from_secs(60),
            None,
        )
        .expect("entry");
        let restored = entry.into_response().expect("restore");
        assert_eq!(restored.header("X-Cache-Tags"), Some("post:1 posts"));
    }

    #[test]
    fn length_mismatch_is_detected() {
        let mut entry = CacheEntry::build(
            "k",
            &CachedResponse::new(200, "hello"),
            &[],
            Duration::from_secs(60),
            None,
        )
        .expect("entry");
        entry.original_len = 6;
        let err = entry.into_response().expect_err("mismatch");
        assert!(matches!(
            err,
            CacheError::LengthMismatch {
                expected: 6,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn corrupted_json_is_a_decode_error() {
        let err = CacheEntry::decode(b"{not json").expect_err("decode");
        assert!(matches!(err, CacheError::Decode(_)));
    }
}
