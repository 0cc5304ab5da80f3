//! Cache warming.
//!
//! The warmer never writes to the cache directly. It issues real GET requests
//! against the public site so that the origin renders each page and both the
//! page cache and the edge populate themselves on the normal response path.

mod fetcher;
mod orchestrator;
mod run;
mod sitemap;

use thiserror::Error;

use crate::content::ContentError;

pub use fetcher::{FetchedPage, HttpPageFetcher, PageFetcher};
pub use orchestrator::Warmer;
pub use run::{WarmFailure, WarmKind, WarmTarget, WarmupReport, WarmupRun};
pub use sitemap::{SitemapDocument, parse_sitemap};

#[derive(Debug, Error)]
pub enum WarmupError {
    #[error("request to `{url}` failed: {message}")]
    Fetch { url: String, message: String },
    #[error("`{url}` answered {status}")]
    Status { url: String, status: u16 },
    #[error("invalid sitemap: {0}")]
    Sitemap(String),
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl WarmupError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}
