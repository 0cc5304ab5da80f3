use std::{
    collections::HashSet,
    fmt,
    time::{Duration, Instant},
};

use serde::{Serialize, Serializer};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmKind {
    Homepage,
    Feed,
    Post,
    Category,
    Tag,
    Page,
    Listing,
    Api,
    Sitemap,
}

impl From<crate::content::ContentKind> for WarmKind {
    fn from(kind: crate::content::ContentKind) -> Self {
        use crate::content::ContentKind;
        match kind {
            ContentKind::Post => Self::Post,
            ContentKind::Category => Self::Category,
            ContentKind::Tag => Self::Tag,
            ContentKind::Page => Self::Page,
        }
    }
}

impl fmt::Display for WarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Homepage => "homepage",
            Self::Feed => "feed",
            Self::Post => "post",
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Page => "page",
            Self::Listing => "listing",
            Self::Api => "api",
            Self::Sitemap => "sitemap",
        };
        f.write_str(label)
    }
}

/// One URL to warm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmTarget {
    pub url: String,
    pub kind: WarmKind,
    pub tags: Vec<String>,
}

impl WarmTarget {
    pub fn new(url: impl Into<String>, kind: WarmKind) -> Self {
        Self {
            url: url.into(),
            kind,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmFailure {
    pub url: String,
    pub kind: WarmKind,
    pub error: String,
}

/// Book-keeping for one orchestration call.
#[derive(Debug)]
pub struct WarmupRun {
    id: Uuid,
    started: Instant,
    seen: HashSet<String>,
    warmed: Vec<WarmTarget>,
    failed: Vec<WarmFailure>,
    batches: usize,
}

impl Default for WarmupRun {
    fn default() -> Self {
        Self::new()
    }
}

impl WarmupRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
            seen: HashSet::new(),
            warmed: Vec::new(),
            failed: Vec::new(),
            batches: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns false when `url` was already attempted in this run.
    pub fn claim(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    pub fn record_success(&mut self, target: WarmTarget) {
        self.warmed.push(target);
    }

    pub fn record_failure(&mut self, url: impl Into<String>, kind: WarmKind, error: impl fmt::Display) {
        self.failed.push(WarmFailure {
            url: url.into(),
            kind,
            error: error.to_string(),
        });
    }

    pub fn finish_batch(&mut self) {
        self.batches += 1;
    }

    pub fn warmed(&self) -> &[WarmTarget] {
        &self.warmed
    }

    pub fn failed(&self) -> &[WarmFailure] {
        &self.failed
    }

    pub fn into_report(self) -> WarmupReport {
        WarmupReport {
            run_id: self.id,
            warmed_count: self.warmed.len(),
            failed_count: self.failed.len(),
            urls: self.warmed.into_iter().map(|target| target.url).collect(),
            errors: self.failed,
            batches: self.batches,
            duration: self.started.elapsed(),
        }
    }
}

/// Summary of one warming run.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupReport {
    pub run_id: Uuid,
    pub warmed_count: usize,
    pub failed_count: usize,
    pub urls: Vec<String>,
    pub errors: Vec<WarmFailure>,
    pub batches: usize,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
