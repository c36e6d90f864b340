//! The crawl loop: discovery, change detection, extraction, storage.

use std::collections::VecDeque;
use std::sync::Arc;

use docent::models::Embedder;
use docent::stores::{RecordStore, VectorCollection};
use docent::tenant::TenantContext;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::canonical;
use crate::error::HarvestError;
use crate::extract::{PageExtraction, extract_page};
use crate::fetch::{DynamicRenderer, PageFetcher};
use crate::pipeline::{ContentPipeline, PageRef, PipelineStats};
use crate::robots::RobotsPolicy;
use crate::sitemap::{SitemapEntry, conventional_sitemap_urls, parse_sitemap};
use crate::tracker::{ChangeStatus, ChangeTracker};

/// Pages with fewer extracted items than this try the render fallback.
const THIN_PAGE_ITEMS: usize = 3;
/// Nested sitemap indexes are followed at most this deep.
const MAX_SITEMAP_DEPTH: usize = 3;

#[derive(Clone, Debug)]
pub struct CrawlConfig {
    pub domain: String,
    pub start_url: String,
    pub sitemap_url: Option<String>,
    pub max_depth: usize,
    pub max_links_per_page: usize,
    pub respect_robots: bool,
    pub aggressive_discovery: bool,
    pub job_id: Option<String>,
}

impl CrawlConfig {
    pub fn new(domain: impl Into<String>, start_url: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            start_url: start_url.into(),
            sitemap_url: None,
            max_depth: 999,
            max_links_per_page: 1_000,
            respect_robots: true,
            aggressive_discovery: true,
            job_id: None,
        }
    }
}

/// Run summary emitted as JSON by the CLI entrypoints.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CrawlStats {
    pub urls_checked: u64,
    pub urls_new: u64,
    pub urls_modified: u64,
    pub urls_unchanged: u64,
    pub urls_failed: u64,
    pub urls_discovered: u64,
    pub pages_processed: u64,
    pub items_extracted: u64,
    #[serde(flatten)]
    pub pipeline: PipelineStats,
}

pub struct Crawler {
    config: CrawlConfig,
    fetcher: PageFetcher,
    collection: VectorCollection,
    pipeline: ContentPipeline,
    tracker: Option<ChangeTracker>,
    robots: Option<RobotsPolicy>,
    discovered: FxHashSet<String>,
    processing: FxHashSet<String>,
    processed: FxHashSet<String>,
    stats: CrawlStats,
}

impl Crawler {
    /// Builds a crawler for one tenant.
    ///
    /// Passing `records` turns on incremental change detection (the
    /// updater); without it every page is extracted (the initial spider).
    pub async fn new(
        tenant: &TenantContext,
        collection_name: &str,
        embedder: Arc<dyn Embedder>,
        config: CrawlConfig,
        records: Option<RecordStore>,
        renderer: Option<Arc<dyn DynamicRenderer>>,
    ) -> Result<Self, HarvestError> {
        if config.start_url.is_empty() {
            return Err(HarvestError::Arguments("start_url is required".into()));
        }
        let collection = VectorCollection::open(&tenant.vector_store_path, collection_name).await?;
        let pipeline = ContentPipeline::new(embedder, tenant.resource_id.clone(), "scrape");
        Ok(Self {
            fetcher: PageFetcher::new(renderer)?,
            collection,
            pipeline,
            tracker: records.map(ChangeTracker::new),
            robots: None,
            discovered: FxHashSet::default(),
            processing: FxHashSet::default(),
            processed: FxHashSet::default(),
            stats: CrawlStats::default(),
            config,
        })
    }

    /// Runs the crawl to completion and returns the stats summary.
    pub async fn run(mut self) -> Result<CrawlStats, HarvestError> {
        let start = Url::parse(&self.config.start_url)
            .map_err(|e| HarvestError::Arguments(format!("start-url: {e}")))?;

        info!(
            domain = %self.config.domain,
            start = %start,
            incremental = self.tracker.is_some(),
            job_id = self.config.job_id.as_deref().unwrap_or("-"),
            "crawl starting"
        );

        if self.config.respect_robots {
            self.load_robots(&start).await;
        }

        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        frontier.push_back((start.to_string(), 0));
        for url in self.discover_sitemap_urls(&start).await {
            frontier.push_back((url, 0));
        }

        while let Some((url, depth)) = frontier.pop_front() {
            let Some(canonical_url) = canonical::canonicalize(&url) else {
                continue;
            };
            if self.processed.contains(&canonical_url) || self.processing.contains(&canonical_url)
            {
                continue;
            }
            if !self.allowed_by_robots(&canonical_url) {
                continue;
            }
            self.processing.insert(canonical_url.clone());

            match self.process_page(&canonical_url, depth).await {
                Ok(links) => {
                    self.processed.insert(canonical_url.clone());
                    for link in links {
                        frontier.push_back((link, depth + 1));
                    }
                }
                Err(e) => {
                    warn!(url = %canonical_url, error = %e, "page failed");
                    self.stats.urls_failed += 1;
                }
            }
            self.processing.remove(&canonical_url);
        }

        self.pipeline.flush(&self.collection).await?;
        self.stats.pipeline = self.pipeline.stats;
        self.stats.urls_discovered = self.discovered.len() as u64;

        let total_documents = self.collection.count().await?;
        info!(
            checked = self.stats.urls_checked,
            new = self.stats.urls_new,
            modified = self.stats.urls_modified,
            unchanged = self.stats.urls_unchanged,
            failed = self.stats.urls_failed,
            chunks_stored = self.stats.pipeline.chunks_stored,
            total_documents,
            "crawl complete"
        );
        self.collection.close_handle().await;

        Ok(self.stats)
    }

    /// Fetches, change-detects, extracts, stores, and returns the links to
    /// follow from this page.
    async fn process_page(
        &mut self,
        url: &str,
        depth: usize,
    ) -> Result<Vec<String>, HarvestError> {
        let parsed = Url::parse(url).map_err(|e| HarvestError::Fetch(e.to_string()))?;
        let page = self.fetcher.fetch(&parsed).await?;
        self.stats.urls_checked += 1;

        if page.status == 404 {
            return Err(HarvestError::Fetch("404 not found".into()));
        }
        if page.status != 200 {
            debug!(url, status = page.status, "skipping non-200 response");
            return Ok(Vec::new());
        }
        if !page.is_html() || page.body.is_empty() {
            debug!(url, content_type = %page.content_type, "skipping non-HTML response");
            return Ok(Vec::new());
        }

        let mut extraction = extract_page(&page.body, self.config.aggressive_discovery);

        // Incremental mode: decide before any extraction work sticks.
        let status = match &self.tracker {
            Some(tracker) => tracker.check_and_record(url, &extraction.cleaned_body).await?,
            None => ChangeStatus::New,
        };
        match status {
            ChangeStatus::New => self.stats.urls_new += 1,
            ChangeStatus::Modified => self.stats.urls_modified += 1,
            ChangeStatus::Unchanged => {
                self.stats.urls_unchanged += 1;
                debug!(url, "unchanged; following links only");
                return Ok(self.collect_links(&parsed, &extraction, depth));
            }
        }

        // Thin static HTML: one shot through the dynamic renderer.
        if extraction.items.len() < THIN_PAGE_ITEMS && self.fetcher.has_renderer() {
            match self.fetcher.render(&parsed).await {
                Ok(rendered) => {
                    debug!(url, "thin page re-extracted through renderer");
                    extraction = extract_page(&rendered, self.config.aggressive_discovery);
                }
                Err(e) => warn!(url, error = %e, "render fallback failed"),
            }
        }

        let page_ref = PageRef {
            url: url.to_string(),
            domain: parsed.host_str().unwrap_or(&self.config.domain).to_string(),
            title: extraction.title.clone(),
        };
        for item in &extraction.items {
            self.stats.items_extracted += 1;
            self.pipeline
                .process_item(&self.collection, &page_ref, item)
                .await?;
        }
        self.stats.pages_processed += 1;

        Ok(self.collect_links(&parsed, &extraction, depth))
    }

    /// Filters, canonicalizes, and priority-orders a page's outbound links.
    fn collect_links(
        &mut self,
        base: &Url,
        extraction: &PageExtraction,
        depth: usize,
    ) -> Vec<String> {
        if depth >= self.config.max_depth {
            return Vec::new();
        }

        let mut candidates: Vec<String> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();

        let mut consider = |raw: &str, candidates: &mut Vec<String>, seen: &mut FxHashSet<String>| {
            if raw.starts_with("javascript:")
                || raw.starts_with("mailto:")
                || raw.starts_with("tel:")
                || raw.starts_with('#')
            {
                return;
            }
            let Ok(absolute) = base.join(raw) else {
                return;
            };
            let Some(canonical_url) = canonical::canonicalize(absolute.as_str()) else {
                return;
            };
            if !canonical::should_process(&canonical_url, &self.config.domain)
                || !canonical::should_follow(&canonical_url)
            {
                return;
            }
            if self.processed.contains(&canonical_url)
                || self.processing.contains(&canonical_url)
            {
                return;
            }
            if seen.insert(canonical_url.clone()) {
                candidates.push(canonical_url);
            }
        };

        for raw in &extraction.links {
            consider(raw, &mut candidates, &mut seen);
        }
        if self.config.aggressive_discovery {
            for candidate in canonical::pagination_candidates(base.as_str()) {
                consider(&candidate, &mut candidates, &mut seen);
            }
        }

        candidates.sort_by_key(|url| std::cmp::Reverse(canonical::link_priority(url)));
        candidates.truncate(self.config.max_links_per_page);

        for url in &candidates {
            self.discovered.insert(url.clone());
        }
        candidates
    }

    async fn load_robots(&mut self, start: &Url) {
        let Some(host) = start.host_str() else {
            return;
        };
        let robots_url = format!("{}://{}/robots.txt", start.scheme(), host);
        match Url::parse(&robots_url) {
            Ok(url) => match self.fetcher.fetch(&url).await {
                Ok(page) if page.status == 200 => {
                    self.robots = Some(RobotsPolicy::parse(&page.body));
                    info!("robots.txt loaded");
                }
                Ok(_) | Err(_) => debug!("no robots.txt; crawling unrestricted"),
            },
            Err(_) => {}
        }
    }

    fn allowed_by_robots(&self, url: &str) -> bool {
        let Some(robots) = &self.robots else {
            return true;
        };
        match Url::parse(url) {
            Ok(parsed) => robots.allows(parsed.path()),
            Err(_) => true,
        }
    }

    /// Resolves sitemap page URLs: the explicit sitemap if given, otherwise
    /// the conventional locations, following nested indexes.
    async fn discover_sitemap_urls(&mut self, start: &Url) -> Vec<String> {
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        match &self.config.sitemap_url {
            Some(explicit) => queue.push_back((explicit.clone(), 0)),
            None => {
                for url in conventional_sitemap_urls(start) {
                    queue.push_back((url, 0));
                }
            }
        }

        let mut seen_sitemaps: FxHashSet<String> = FxHashSet::default();
        let mut pages = Vec::new();

        while let Some((sitemap_url, depth)) = queue.pop_front() {
            if depth > MAX_SITEMAP_DEPTH || !seen_sitemaps.insert(sitemap_url.clone()) {
                continue;
            }
            let Ok(url) = Url::parse(&sitemap_url) else {
                continue;
            };
            let body = match self.fetcher.fetch(&url).await {
                Ok(page) if page.status == 200 => page.body,
                Ok(_) | Err(_) => continue,
            };
            let entries = parse_sitemap(&body);
            let mut found = 0usize;
            for entry in entries {
                match entry {
                    SitemapEntry::Nested(nested) => queue.push_back((nested, depth + 1)),
                    SitemapEntry::Page(page_url) => {
                        let Some(canonical_url) = canonical::canonicalize(&page_url) else {
                            continue;
                        };
                        if canonical::should_process(&canonical_url, &self.config.domain)
                            && canonical::should_follow(&canonical_url)
                        {
                            self.discovered.insert(canonical_url.clone());
                            pages.push(canonical_url);
                            found += 1;
                        }
                    }
                }
            }
            if found > 0 {
                info!(sitemap = %sitemap_url, urls = found, "sitemap urls queued");
            }
        }

        pages
    }
}
