use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use url::Url;

use crate::cache::WARMUP_HEADER;

use super::WarmupError;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Bytes,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues the warming GETs.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, WarmupError>;
}

/// reqwest fetcher. Every request carries `X-Cache-Warmup: 1` so the page
/// cache renders a fresh copy instead of answering from its own store.
#[derive(Clone, Debug)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, WarmupError> {
        let client = Client::builder()
            .user_agent(concat!("folio-cache-warmer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| WarmupError::fetch("<client>", err.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, WarmupError> {
        let response = self
            .client
            .get(url.clone())
            .header(WARMUP_HEADER, "1")
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| WarmupError::fetch(url.as_str(), err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| WarmupError::fetch(url.as_str(), err.to_string()))?;
        Ok(FetchedPage { status, body })
    }
}
