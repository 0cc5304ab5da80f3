//! Content source backed by the CMS JSON read API.
//!
//! Endpoints, relative to the configured base URL (`.../api/v1/`):
//!
//! - `GET {kind}?status=published`
//! - `GET {kind}/popular?days=D&limit=N`
//! - `GET {kind}?updated_since=RFC3339`
//! - `GET {kind}/{id}` (404 means unknown)
//!
//! Lists come back as `{"data": [...]}` and single items as `{"data": {...}}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;
use url::Url;

use super::{ContentError, ContentItem, ContentKind, ContentSource};

const TARGET: &str = "folio::content::api";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Clone, Debug)]
pub struct ApiContentSource {
    client: Client,
    base: Url,
    kind: ContentKind,
}

impl ApiContentSource {
    pub fn new(client: Client, base: Url, kind: ContentKind) -> Self {
        Self { client, base, kind }
    }

    pub fn client(timeout: Duration) -> Result<Client, ContentError> {
        Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| ContentError::Transport(err.to_string()))
    }

    pub fn user_agent() -> &'static str {
        concat!("folio-cache/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, suffix: &str, query: &[(&str, String)]) -> Result<Url, ContentError> {
        let path = if suffix.is_empty() {
            self.kind.collection().to_string()
        } else {
            format!("{}/{suffix}", self.kind.collection())
        };
        let mut url = self
            .base
            .join(&path)
            .map_err(|err| ContentError::Transport(format!("invalid url `{path}`: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ContentError> {
        debug!(target: TARGET, kind = %self.kind, url = %url, "fetching content");
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| ContentError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ContentError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| ContentError::Transport(err.to_string()))?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|err| ContentError::Payload(format!("{url}: {err}")))?;
        Ok(Some(envelope.data))
    }

    async fn fetch_list(&self, url: Url) -> Result<Vec<ContentItem>, ContentError> {
        Ok(self.fetch(url).await?.unwrap_or_default())
    }
}

#[async_trait]
impl ContentSource for ApiContentSource {
    async fn list_published(&self) -> Result<Vec<ContentItem>, ContentError> {
        let url = self.url("", &[("status", "published".to_string())])?;
        self.fetch_list(url).await
    }

    async fn list_popular(
        &self,
        since_days: u32,
        limit: usize,
    ) -> Result<Vec<ContentItem>, ContentError> {
        let url = self.url(
            "popular",
            &[
                ("days", since_days.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        let mut items = self.fetch_list(url).await?;
        items.truncate(limit);
        Ok(items)
    }

    async fn list_updated_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<ContentItem>, ContentError> {
        let since = since
            .format(&Rfc3339)
            .map_err(|err| ContentError::Payload(err.to_string()))?;
        let url = self.url("", &[("updated_since", since)])?;
        self.fetch_list(url).await
    }

    async fn find(&self, id: &str) -> Result<Option<ContentItem>, ContentError> {
        let url = self.url(id, &[])?;
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn source(server: &MockServer, kind: ContentKind) -> ApiContentSource {
        let base = Url::parse(&server.url("/api/v1/")).expect("base");
        let client = ApiContentSource::client(Duration::from_secs(5)).expect("client");
        ApiContentSource::new(client, base, kind)
    }

    #[tokio::test]
    async fn lists_published_items() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/posts")
                .query_param("status", "published");
            then.status(200).header("content-type", "application/json")
                .body(json!({
                "data": [
                    {"id": "1", "slug": "hello", "updated_at": "2026-01-01T00:00:00Z"},
                    {"id": "2", "slug": "world", "updated_at": "2026-01-02T00:00:00Z"}
                ]
            }).to_string());
        });

        let items = source(&server, ContentKind::Post)
            .list_published()
            .await
            .expect("items");
        mock.assert();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].slug, "world");
    }

    #[tokio::test]
    async fn popular_passes_window_and_limit() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/posts/popular")
                .query_param("days", "30")
                .query_param("limit", "1");
            then.status(200).header("content-type", "application/json")
                .body(json!({
                "data": [
                    {"id": "9", "slug": "top", "updated_at": "2026-01-01T00:00:00Z"},
                    {"id": "8", "slug": "next", "updated_at": "2026-01-01T00:00:00Z"}
                ]
            }).to_string());
        });

        let items = source(&server, ContentKind::Post)
            .list_popular(30, 1)
            .await
            .expect("items");
        mock.assert();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "9");
    }

    #[tokio::test]
    async fn find_maps_404_to_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/tags/404");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/tags/7");
            then.status(200).header("content-type", "application/json")
                .body(json!({
                "data": {"id": "7", "slug": "rust", "updated_at": "2026-01-01T00:00:00Z", "post_count": 3}
            }).to_string());
        });

        let tags = source(&server, ContentKind::Tag);
        assert!(tags.find("404").await.expect("lookup").is_none());
        let found = tags.find("7").await.expect("lookup").expect("present");
        assert_eq!(found.post_count, Some(3));
    }

    #[tokio::test]
    async fn server_errors_surface_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/pages");
            then.status(503);
        });

        let err = source(&server, ContentKind::Page)
            .list_published()
            .await
            .expect_err("unavailable");
        assert!(matches!(err, ContentError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_payload_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/categories");
            then.status(200).body("[]");
        });

        let err = source(&server, ContentKind::Category)
            .list_published()
            .await
            .expect_err("no envelope");
        assert!(matches!(err, ContentError::Payload(_)));
    }
}
