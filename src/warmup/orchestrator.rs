use std::{future::Future, sync::Arc, time::Duration};

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, sleep};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cache::{CacheTag, HOMEPAGE},
    config::WarmupSettings,
    content::{ContentCatalog, ContentItem, ContentKind},
};

use super::{
    HttpPageFetcher, PageFetcher, SitemapDocument, WarmKind, WarmTarget, WarmupError,
    WarmupReport, WarmupRun, parse_sitemap,
};

const TARGET: &str = "folio::warmup";
const METRIC_WARM_URL: &str = "folio_warm_url_total";
const METRIC_WARM_PASS_MS: &str = "folio_warm_pass_ms";

/// Repopulates the caches by requesting pages through the public site.
pub struct Warmer {
    settings: WarmupSettings,
    catalog: ContentCatalog,
    fetcher: Arc<dyn PageFetcher>,
}

impl Warmer {
    pub fn new(
        settings: WarmupSettings,
        catalog: ContentCatalog,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            settings,
            catalog,
            fetcher,
        }
    }

    pub fn from_settings(
        settings: &WarmupSettings,
        catalog: ContentCatalog,
    ) -> Result<Self, WarmupError> {
        Ok(Self::new(
            settings.clone(),
            catalog,
            Arc::new(HttpPageFetcher::new()?),
        ))
    }

    pub fn settings(&self) -> &WarmupSettings {
        &self.settings
    }

    /// Warms the homepage, the feed, popular and published posts, non-empty
    /// categories and tags, pages and the API listings, in that order.
    pub async fn warm_all(&self) -> WarmupReport {
        let mut run = WarmupRun::new();
        info!(target: TARGET, run_id = %run.id(), "full warm started");

        self.warm_path(&mut run, "/", WarmKind::Homepage, vec![HOMEPAGE.to_string()])
            .await;
        self.warm_path(&mut run, &self.settings.feed_path, WarmKind::Feed, Vec::new())
            .await;
        run.finish_batch();

        let popular = self
            .catalog
            .posts
            .list_popular(self.settings.popular_window_days, self.settings.popular_limit)
            .await;
        self.warm_listing(&mut run, ContentKind::Post, "posts/popular", popular, |_| true)
            .await;

        for kind in ContentKind::ALL {
            let items = self.catalog.source(kind).list_published().await;
            let phase = format!("{}/published", kind.collection());
            self.warm_listing(&mut run, kind, &phase, items, ContentItem::has_posts)
                .await;
        }

        for endpoint in &self.settings.api_endpoints {
            self.warm_path(&mut run, endpoint, WarmKind::Api, Vec::new())
                .await;
        }
        run.finish_batch();

        self.finish("full", run)
    }

    /// Warms a single URL (absolute, or a path relative to the site).
    pub async fn warm_url(&self, url: &str, kind: WarmKind, tags: Vec<String>) -> WarmupReport {
        let mut run = WarmupRun::new();
        self.warm_path(&mut run, url, kind, tags).await;
        run.finish_batch();
        self.finish("single", run)
    }

    /// Replays every sitemap URL in rate-limited batches. A sitemap index is
    /// followed one level deep.
    pub async fn warm_sitemap(&self) -> WarmupReport {
        let mut run = WarmupRun::new();
        let sitemap_url = self.settings.sitemap_url.clone();

        let urls = match self.sitemap_urls(&sitemap_url).await {
            Ok(urls) => urls,
            Err(err) => {
                warn!(
                    target: TARGET,
                    url = %sitemap_url,
                    error = %err,
                    "sitemap unavailable"
                );
                run.record_failure(sitemap_url.as_str(), WarmKind::Sitemap, err);
                return self.finish("sitemap", run);
            }
        };

        let batch_size = self.settings.batch_size.get();
        for (index, batch) in urls.chunks(batch_size).enumerate() {
            if index > 0 {
                sleep(self.settings.batch_delay).await;
            }
            for url in batch {
                self.warm_path(&mut run, url, WarmKind::Sitemap, Vec::new())
                    .await;
            }
            run.finish_batch();
            debug!(
                target: TARGET,
                batch = index + 1,
                size = batch.len(),
                "sitemap batch warmed"
            );
        }

        self.finish("sitemap", run)
    }

    /// Warms the homepage and content updated within the recent window.
    pub async fn warm_recently_updated(&self) -> WarmupReport {
        let mut run = WarmupRun::new();
        self.warm_path(&mut run, "/", WarmKind::Homepage, vec![HOMEPAGE.to_string()])
            .await;

        let since = OffsetDateTime::now_utc() - self.settings.recent_window;
        for kind in ContentKind::ALL {
            let items = self.catalog.source(kind).list_updated_since(since).await;
            let phase = format!("{}/updated", kind.collection());
            self.warm_listing(&mut run, kind, &phase, items, |_| true)
                .await;
        }
        run.finish_batch();

        self.finish("recent", run)
    }

    /// Warms exactly one URL per tag: the item page for entity tags, the
    /// listing for collection tags, `/` for the homepage tag.
    pub async fn warm_tags<S: AsRef<str>>(&self, tags: &[S]) -> WarmupReport {
        let mut run = WarmupRun::new();

        for raw in tags {
            let raw = raw.as_ref();
            match CacheTag::parse(raw) {
                CacheTag::Entity { kind, id } => {
                    match self.catalog.source(kind).find(&id).await {
                        Ok(Some(item)) => {
                            self.warm_path(
                                &mut run,
                                &kind.public_path(&item.slug),
                                kind.into(),
                                vec![raw.to_string()],
                            )
                            .await;
                        }
                        Ok(None) => {
                            debug!(target: TARGET, tag = raw, "tagged item no longer exists");
                        }
                        Err(err) => {
                            run.record_failure(raw, kind.into(), WarmupError::from(err));
                        }
                    }
                }
                CacheTag::Collection(kind) => {
                    self.warm_path(
                        &mut run,
                        &kind.listing_path(),
                        WarmKind::Listing,
                        vec![raw.to_string()],
                    )
                    .await;
                }
                CacheTag::Homepage => {
                    self.warm_path(&mut run, "/", WarmKind::Homepage, vec![raw.to_string()])
                        .await;
                }
                CacheTag::Custom(_) => {
                    debug!(target: TARGET, tag = raw, "tag has no warmable url");
                }
            }
        }
        run.finish_batch();

        self.finish("tags", run)
    }

    /// Runs [`Warmer::warm_recently_updated`] every `interval` until
    /// `shutdown` resolves. Shutdown is observed between passes. Returns the
    /// number of completed passes.
    pub async fn run_schedule<F>(&self, interval: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        info!(
            target: TARGET,
            interval_secs = interval.as_secs(),
            "scheduled warming started"
        );
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.warm_recently_updated().await;
                    passes += 1;
                }
            }
        }
        info!(target: TARGET, passes, "scheduled warming stopped");
        passes
    }

    async fn sitemap_urls(&self, sitemap_url: &Url) -> Result<Vec<String>, WarmupError> {
        match self.fetch_sitemap(sitemap_url).await? {
            SitemapDocument::UrlSet(urls) => Ok(urls),
            SitemapDocument::Index(children) => {
                let mut urls = Vec::new();
                for child in children {
                    let child_url = self.resolve(&child)?;
                    match self.fetch_sitemap(&child_url).await {
                        Ok(SitemapDocument::UrlSet(found)) => urls.extend(found),
                        Ok(SitemapDocument::Index(_)) => {
                            warn!(target: TARGET, url = %child_url, "nested sitemap index ignored");
                        }
                        Err(err) => {
                            warn!(
                                target: TARGET,
                                url = %child_url,
                                error = %err,
                                "child sitemap unavailable"
                            );
                        }
                    }
                }
                Ok(urls)
            }
        }
    }

    async fn fetch_sitemap(&self, url: &Url) -> Result<SitemapDocument, WarmupError> {
        let page = self
            .fetcher
            .fetch(url, self.settings.sitemap_timeout)
            .await?;
        if !page.is_success() {
            return Err(WarmupError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        let body = std::str::from_utf8(&page.body)
            .map_err(|err| WarmupError::Sitemap(format!("{url}: {err}")))?;
        parse_sitemap(body)
    }

    async fn warm_listing<P>(
        &self,
        run: &mut WarmupRun,
        kind: ContentKind,
        phase: &str,
        items: Result<Vec<ContentItem>, crate::content::ContentError>,
        keep: P,
    ) where
        P: Fn(&ContentItem) -> bool,
    {
        let items = match items {
            Ok(items) => items,
            Err(err) => {
                warn!(target: TARGET, phase, error = %err, "content listing failed");
                run.record_failure(phase, kind.into(), WarmupError::from(err));
                return;
            }
        };

        for item in items.iter().filter(|item| keep(*item)) {
            let tags = vec![CacheTag::entity(kind, item.id.clone()).to_string()];
            self.warm_path(run, &kind.public_path(&item.slug), kind.into(), tags)
                .await;
        }
        run.finish_batch();
    }

    async fn warm_path(&self, run: &mut WarmupRun, path: &str, kind: WarmKind, tags: Vec<String>) {
        let url = match self.resolve(path) {
            Ok(url) => url,
            Err(err) => {
                counter!(METRIC_WARM_URL, "outcome" => "error").increment(1);
                run.record_failure(path, kind, err);
                return;
            }
        };
        if !run.claim(url.as_str()) {
            return;
        }

        let outcome = match self.fetcher.fetch(&url, self.settings.page_timeout).await {
            Ok(page) if page.is_success() => Ok(()),
            Ok(page) => Err(WarmupError::Status {
                url: url.to_string(),
                status: page.status,
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                counter!(METRIC_WARM_URL, "outcome" => "ok").increment(1);
                debug!(target: TARGET, url = %url, kind = %kind, "warmed");
                run.record_success(WarmTarget::new(url.as_str(), kind).with_tags(tags));
            }
            Err(err) => {
                counter!(METRIC_WARM_URL, "outcome" => "error").increment(1);
                debug!(target: TARGET, url = %url, kind = %kind, error = %err, "warm failed");
                run.record_failure(url.as_str(), kind, err);
            }
        }
    }

    fn resolve(&self, path: &str) -> Result<Url, WarmupError> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        self.settings
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| WarmupError::fetch(path, err.to_string()))
    }

    fn finish(&self, mode: &'static str, run: WarmupRun) -> WarmupReport {
        let report = run.into_report();
        histogram!(METRIC_WARM_PASS_MS, "mode" => mode)
            .record(report.duration.as_secs_f64() * 1000.0);
        info!(
            target: TARGET,
            mode,
            run_id = %report.run_id,
            warmed = report.warmed_count,
            failed = report.failed_count,
            batches = report.batches,
            elapsed_ms = report.duration.as_millis() as u64,
            "warm pass finished"
        );
        report
    }
}
