use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    cache::CacheTag,
    config::EdgeSettings,
    content::ContentKind,
};

use super::{
    BAN_URL_HEADER, CACHE_TAGS_HEADER, EdgeError, EdgeRequest, EdgeTransport, EdgeVerb,
    HttpEdgeTransport, PURGE_METHOD_HEADER,
};

const TARGET: &str = "folio::edge";
const METRIC_EDGE_REQUEST: &str = "folio_edge_request_total";
const API_PREFIX: &str = "/api/v1";

/// Outcome of one purge operation, for logging and CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub sent: usize,
    pub failed: usize,
}

impl PurgeSummary {
    fn merge(&mut self, other: PurgeSummary) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Issues PURGE and BAN commands against the edge accelerator. Every
/// operation is best effort: failures are logged and counted, never raised.
#[derive(Clone)]
pub struct EdgePurger {
    transport: Option<Arc<dyn EdgeTransport>>,
}

impl EdgePurger {
    pub fn new(transport: Arc<dyn EdgeTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A purger that never sends anything.
    pub fn disabled() -> Self {
        Self { transport: None }
    }

    pub fn from_settings(settings: &EdgeSettings) -> Result<Self, EdgeError> {
        if !settings.enabled {
            return Ok(Self::disabled());
        }
        let transport = HttpEdgeTransport::from_settings(settings)?;
        info!(
            target: TARGET,
            base = %transport.base(),
            public_host = %settings.public_host,
            "edge purging enabled"
        );
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn purge_url(&self, url: &str) -> PurgeSummary {
        self.send(EdgeRequest {
            verb: EdgeVerb::Purge,
            path: url.to_string(),
            headers: vec![(PURGE_METHOD_HEADER, "exact".to_string())],
        })
        .await
    }

    pub async fn purge_urls<S: AsRef<str>>(&self, urls: &[S]) -> PurgeSummary {
        let mut summary = PurgeSummary::default();
        for url in urls {
            summary.merge(self.purge_url(url.as_ref()).await);
        }
        summary
    }

    pub async fn ban_pattern(&self, pattern: &str) -> PurgeSummary {
        self.send(EdgeRequest {
            verb: EdgeVerb::Ban,
            path: "/".to_string(),
            headers: vec![(BAN_URL_HEADER, pattern.to_string())],
        })
        .await
    }

    /// Bans every object whose `X-Cache-Tags` matches any of `tags`.
    pub async fn ban_tags<S: AsRef<str>>(&self, tags: &[S]) -> PurgeSummary {
        if tags.is_empty() {
            return PurgeSummary::default();
        }
        self.send(EdgeRequest {
            verb: EdgeVerb::Ban,
            path: "/".to_string(),
            headers: vec![(CACHE_TAGS_HEADER, tag_ban_expression(tags))],
        })
        .await
    }

    pub async fn purge_post(&self, id: &str) -> PurgeSummary {
        self.purge_content(ContentKind::Post, id).await
    }

    pub async fn purge_category(&self, id: &str) -> PurgeSummary {
        self.purge_content(ContentKind::Category, id).await
    }

    pub async fn purge_tag(&self, id: &str) -> PurgeSummary {
        self.purge_content(ContentKind::Tag, id).await
    }

    pub async fn purge_page(&self, id: &str) -> PurgeSummary {
        self.purge_content(ContentKind::Page, id).await
    }

    /// Bans everything the edge holds.
    pub async fn purge_all(&self) -> PurgeSummary {
        self.ban_pattern(".*").await
    }

    /// Purges the API and public URLs of one item and bans its tags.
    pub async fn purge_content(&self, kind: ContentKind, id: &str) -> PurgeSummary {
        if !self.is_enabled() {
            return PurgeSummary::default();
        }
        let mut summary = self.purge_urls(&purge_paths(kind, id)).await;
        summary.merge(self.ban_tags(&ban_tags(kind, id)).await);
        debug!(
            target: TARGET,
            kind = %kind,
            id,
            sent = summary.sent,
            failed = summary.failed,
            "content purged at edge"
        );
        summary
    }

    async fn send(&self, request: EdgeRequest) -> PurgeSummary {
        let Some(transport) = &self.transport else {
            return PurgeSummary::default();
        };

        let outcome = match transport.send(&request).await {
            Ok(status) if (200..300).contains(&status) => Ok(()),
            Ok(status) => Err(EdgeError::Status {
                verb: request.verb,
                path: request.path.clone(),
                status,
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                counter!(METRIC_EDGE_REQUEST, "outcome" => "ok").increment(1);
                debug!(
                    target: TARGET,
                    verb = %request.verb,
                    path = %request.path,
                    "edge request accepted"
                );
                PurgeSummary { sent: 1, failed: 0 }
            }
            Err(err) => {
                counter!(METRIC_EDGE_REQUEST, "outcome" => "error").increment(1);
                warn!(
                    target: TARGET,
                    verb = %request.verb,
                    path = %request.path,
                    error = %err,
                    "edge request failed"
                );
                PurgeSummary { sent: 1, failed: 1 }
            }
        }
    }
}

/// Exact URLs to purge when one item changes.
pub(crate) fn purge_paths(kind: ContentKind, id: &str) -> Vec<String> {
    let collection = kind.collection();
    let mut paths = vec![format!("{API_PREFIX}/{collection}/{id}")];
    match kind {
        ContentKind::Post => {
            paths.push(format!("{API_PREFIX}/posts"));
            paths.push(format!("{API_PREFIX}/categories"));
            paths.push(format!("{API_PREFIX}/tags"));
        }
        ContentKind::Category | ContentKind::Tag => {
            paths.push(format!("{API_PREFIX}/{collection}"));
        }
        ContentKind::Page => {}
    }
    paths.push(format!("/{collection}/{id}"));
    paths
}

/// Tags to ban when one item changes.
pub(crate) fn ban_tags(kind: ContentKind, id: &str) -> Vec<String> {
    let mut tags = vec![CacheTag::entity(kind, id)];
    match kind {
        ContentKind::Post => {
            tags.push(CacheTag::Collection(ContentKind::Post));
            tags.push(CacheTag::Homepage);
        }
        ContentKind::Category | ContentKind::Tag => {
            tags.push(CacheTag::Collection(kind));
            tags.push(CacheTag::Collection(ContentKind::Post));
        }
        ContentKind::Page => {
            tags.push(CacheTag::Collection(ContentKind::Page));
            tags.push(CacheTag::Homepage);
        }
    }
    tags.iter().map(ToString::to_string).collect()
}

/// Matches whole tags inside the space-separated `X-Cache-Tags` value, so
/// `post:4` does not also hit `post:42`.
fn tag_ban_expression<S: AsRef<str>>(tags: &[S]) -> String {
    let alternation = tags
        .iter()
        .map(|tag| escape_regex(tag.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    format!(r"(^|\s)({alternation})(\s|$)")
}

fn escape_regex(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<EdgeRequest>>,
        status: u16,
    }

    impl Recording {
        fn answering(status: u16) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                status,
            })
        }

        fn requests(&self) -> Vec<EdgeRequest> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl EdgeTransport for Recording {
        async fn send(&self, request: &EdgeRequest) -> Result<u16, EdgeError> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(self.status)
        }
    }

    #[test]
    fn category_paths_and_tags() {
        assert_eq!(
            purge_paths(ContentKind::Category, "3"),
            vec!["/api/v1/categories/3", "/api/v1/categories", "/categories/3"]
        );
        assert_eq!(
            ban_tags(ContentKind::Category, "3"),
            vec!["category:3", "categories", "posts"]
        );
    }

    #[test]
    fn page_paths_and_tags() {
        assert_eq!(
            purge_paths(ContentKind::Page, "about"),
            vec!["/api/v1/pages/about", "/pages/about"]
        );
        assert_eq!(
            ban_tags(ContentKind::Page, "about"),
            vec!["page:about", "pages", "homepage"]
        );
    }

    #[test]
    fn tag_expression_escapes_metacharacters() {
        assert_eq!(
            tag_ban_expression(&["post:1", "c++", "a.b"]),
            r"(^|\s)(post:1|c\+\+|a\.b)(\s|$)"
        );
    }

    #[test]
    fn tag_expression_is_anchored_to_whole_tags() {
        assert_eq!(tag_ban_expression(&["post:4"]), r"(^|\s)(post:4)(\s|$)");
    }

    #[tokio::test]
    async fn purge_tag_sends_exact_set() {
        let transport = Recording::answering(200);
        let purger = EdgePurger::new(transport.clone());

        let summary = purger.purge_tag("9").await;
        assert_eq!(summary, PurgeSummary { sent: 4, failed: 0 });

        let requests = transport.requests();
        let purged: Vec<_> = requests
            .iter()
            .filter(|request| request.verb == EdgeVerb::Purge)
            .map(|request| request.path.as_str())
            .collect();
        assert_eq!(purged, vec!["/api/v1/tags/9", "/api/v1/tags", "/tags/9"]);
        assert!(
            requests
                .iter()
                .filter(|request| request.verb == EdgeVerb::Purge)
                .all(|request| request.header(PURGE_METHOD_HEADER) == Some("exact"))
        );
        let ban = requests.last().expect("ban");
        assert_eq!(ban.verb, EdgeVerb::Ban);
        assert_eq!(ban.header(CACHE_TAGS_HEADER), Some(r"(^|\s)(tag:9|tags|posts)(\s|$)"));
    }

    #[tokio::test]
    async fn error_statuses_are_counted_not_raised() {
        let transport = Recording::answering(405);
        let purger = EdgePurger::new(transport.clone());

        let summary = purger.purge_urls(&["/a", "/b"]).await;
        assert_eq!(summary, PurgeSummary { sent: 2, failed: 2 });
    }

    #[tokio::test]
    async fn purge_all_bans_everything() {
        let transport = Recording::answering(200);
        let purger = EdgePurger::new(transport.clone());

        purger.purge_all().await;
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header(BAN_URL_HEADER), Some(".*"));
    }

    #[tokio::test]
    async fn disabled_purger_is_a_no_op() {
        let purger = EdgePurger::disabled();
        assert_eq!(purger.purge_post("1").await, PurgeSummary::default());
        assert_eq!(purger.ban_pattern("/x").await, PurgeSummary::default());
        assert!(!purger.is_enabled());
    }

    #[tokio::test]
    async fn empty_tag_list_sends_nothing() {
        let transport = Recording::answering(200);
        let purger = EdgePurger::new(transport.clone());
        let none: [&str; 0] = [];
        assert_eq!(purger.ban_tags(&none).await, PurgeSummary::default());
        assert!(transport.requests().is_empty());
    }
}
