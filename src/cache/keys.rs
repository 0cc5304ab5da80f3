//! Cache key canonicalization.
//!
//! A key is the SHA-256 digest of a request's canonical URL plus its vary
//! dimensions. Keys are shared by every process talking to the store, so the
//! digest has to be stable across builds and hosts.

use std::fmt;

use sha2::{Digest, Sha256};
use url::{Url, form_urlencoded};

const PATH_BASE: &str = "http://origin.invalid";

/// Canonical identity of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Canonicalize a raw key (absolute URL, path, or opaque string).
    pub fn canonical(raw: &str) -> Self {
        Self::for_request(raw, &[])
    }

    /// Canonicalize a request URL together with the headers it varies on.
    pub fn for_request(raw: &str, vary: &[(&str, &str)]) -> Self {
        let mut identity = canonical_url(raw);

        if !vary.is_empty() {
            let mut dims: Vec<(String, &str)> = vary
                .iter()
                .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
                .collect();
            dims.sort();
            identity.push_str("|vary:");
            for (name, value) in dims {
                identity.push_str(&name);
                identity.push('=');
                identity.push_str(value);
                identity.push(';');
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a URL or path: lowercase scheme and host, drop default ports and
/// fragments, sort query pairs. Paths stay path-only. Anything that is not a
/// URL is only trimmed.
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw.starts_with('/') {
        return match Url::parse(PATH_BASE).and_then(|base| base.join(raw)) {
            Ok(url) => path_and_query(&url),
            Err(_) => raw.to_string(),
        };
    }

    match Url::parse(raw) {
        Ok(url) if url.has_host() => {
            let mut origin = format!("{}://", url.scheme());
            if let Some(host) = url.host_str() {
                origin.push_str(host);
            }
            if let Some(port) = url.port() {
                origin.push(':');
                origin.push_str(&port.to_string());
            }
            origin.push_str(&path_and_query(&url));
            origin
        }
        _ => raw.to_string(),
    }
}

fn path_and_query(url: &Url) -> String {
    let mut out = url.path().to_string();
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs.is_empty() {
        pairs.sort();
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        out.push('?');
        out.push_str(&query);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_sorts_query_and_drops_fragment() {
        assert_eq!(
            canonical_url("HTTPS://Blog.Example.com:443/posts?b=2&a=1#comments"),
            "https://blog.example.com/posts?a=1&b=2"
        );
    }

    #[test]
    fn canonical_url_keeps_non_default_port() {
        assert_eq!(
            canonical_url("http://localhost:8080/feed"),
            "http://localhost:8080/feed"
        );
    }

    #[test]
    fn canonical_path_stays_relative() {
        assert_eq!(canonical_url("/tags/rust?page=2&sort=new"), "/tags/rust?page=2&sort=new");
        assert_eq!(canonical_url("/tags/rust?sort=new&page=2"), "/tags/rust?page=2&sort=new");
    }

    #[test]
    fn opaque_keys_are_trimmed() {
        assert_eq!(canonical_url("  k1 "), "k1");
    }

    #[test]
    fn equivalent_urls_share_a_key() {
        let a = CacheKey::canonical("https://blog.example.com/posts?a=1&b=2");
        let b = CacheKey::canonical("https://BLOG.example.com/posts?b=2&a=1#top");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn vary_dimensions_split_keys() {
        let gzip = CacheKey::for_request("/posts", &[("Accept-Encoding", "gzip")]);
        let plain = CacheKey::for_request("/posts", &[("accept-encoding", "identity")]);
        let none = CacheKey::canonical("/posts");
        assert_ne!(gzip, plain);
        assert_ne!(gzip, none);
    }

    #[test]
    fn vary_order_does_not_matter() {
        let a = CacheKey::for_request("/", &[("accept-language", "en"), ("accept-encoding", "br")]);
        let b = CacheKey::for_request("/", &[("Accept-Encoding", "br"), ("Accept-Language", "en")]);
        assert_eq!(a, b);
    }
}
