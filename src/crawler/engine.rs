//! Crawl Engine
//!
//! Drives the pagination controller and the extraction pipeline over the
//! categories of one site, applying the article limit, link filters,
//! retries, crawl-policy checks and run-wide deduplication.

use crate::config::{CategoryConfig, FieldSelector, PaginationConfig, SiteConfig};
use crate::crawler::collector::ArticleCollector;
use crate::crawler::record::ArticleRecord;
use crate::crawler::stats::CategoryStats;
use crate::crawler::CrawlReport;
use crate::extract::{ArticleDetail, ArticleDraft, CompiledArticle, CompiledSelectors};
use crate::fetch::{
    fetch_with_retry, HttpFetcher, PageFetcher, RetryPolicy, ScriptDriver, ScriptSession,
};
use crate::pagination::{NextPage, PageObservation, PageOutcome, PaginationController, StopReason};
use crate::robots::{AllowAll, PolicyChecker, PolicyDecision, RobotsPolicy};
use crate::{ConfigError, NewsprintError, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Crawls the categories of one site
pub struct CrawlEngine {
    site: Arc<SiteConfig>,
    fetcher: Arc<dyn PageFetcher>,
    policy: Arc<dyn PolicyChecker>,
    script: Option<Arc<dyn ScriptDriver>>,
    retry: RetryPolicy,
    page_delay: Duration,
    collector: ArticleCollector,
    config_hash: Option<String>,
}

/// Everything one category crawl produced
struct CategoryRun {
    stats: CategoryStats,
    records: Vec<ArticleRecord>,
}

/// Output of extracting one document, computed without holding the parsed
/// document across an await point
struct PageExtraction {
    container_matches: usize,
    next_link: Option<Url>,
    drafts: Vec<ArticleDraft>,
    dropped: usize,
}

fn extract_page(
    selectors: &CompiledSelectors,
    body: &str,
    page_url: &Url,
    base_url: &Url,
) -> PageExtraction {
    let document = Html::parse_document(body);
    let mut drafts = Vec::new();
    let mut dropped = 0;

    for result in selectors.drafts(&document, base_url) {
        match result {
            Ok(draft) => drafts.push(draft),
            Err(d) => {
                debug!("Dropped article #{} on {}: {}", d.position, page_url, d.reason);
                dropped += 1;
            }
        }
    }

    PageExtraction {
        container_matches: selectors.container_count(&document),
        next_link: selectors.next_link(&document, page_url),
        drafts,
        dropped,
    }
}

/// Outcome of following one listing link to its article page
enum Detail {
    Read(ArticleDetail),
    /// The body was already emitted under another link
    Repeated,
    Missing,
}

impl CrawlEngine {
    /// Creates an engine with the HTTP fetcher and, when the site asks for
    /// it, the robots.txt policy
    pub fn new(site: SiteConfig) -> Result<Self> {
        let fetcher = HttpFetcher::from_settings(&site.crawl)?;
        let policy: Arc<dyn PolicyChecker> = if site.crawl.respect_robots {
            Arc::new(RobotsPolicy::new(
                fetcher.client().clone(),
                site.crawl.user_agent.clone(),
            ))
        } else {
            Arc::new(AllowAll)
        };
        Ok(Self::with_collaborators(site, Arc::new(fetcher), policy))
    }

    /// Creates an engine with explicit fetch and policy collaborators
    pub fn with_collaborators(
        site: SiteConfig,
        fetcher: Arc<dyn PageFetcher>,
        policy: Arc<dyn PolicyChecker>,
    ) -> Self {
        let retry = RetryPolicy::from_settings(&site.crawl);
        let page_delay = site.crawl.page_delay;
        Self {
            site: Arc::new(site),
            fetcher,
            policy,
            script: None,
            retry,
            page_delay,
            collector: ArticleCollector::new(),
            config_hash: None,
        }
    }

    /// Sets the driver used by script-triggered pagination
    pub fn with_script_driver(mut self, driver: Arc<dyn ScriptDriver>) -> Self {
        self.script = Some(driver);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the pause between successive listing pages of a category
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Records the configuration fingerprint in every report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Links emitted so far by this engine
    pub fn collector(&self) -> &ArticleCollector {
        &self.collector
    }

    /// Crawls the requested categories
    ///
    /// # Arguments
    ///
    /// * `categories` - Category names; empty means every category in
    ///   document order
    /// * `limit` - Article limit per category; 0 means unlimited
    /// * `max_pages` - Listing pages per category; zero or negative means one
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Articles in category order plus per-category stats.
    ///   Page and category failures are recorded in the stats.
    /// * `Err(NewsprintError::Config)` - An unknown category was requested;
    ///   nothing is fetched in that case
    pub async fn crawl(
        &self,
        categories: &[String],
        limit: usize,
        max_pages: i64,
    ) -> Result<CrawlReport> {
        let selected = self.resolve_categories(categories)?;
        let started_at = Utc::now();

        info!(
            "Crawling {} ({} categories, limit {}, max pages {})",
            self.site.site_name,
            selected.len(),
            if limit == 0 {
                "none".to_string()
            } else {
                limit.to_string()
            },
            max_pages.max(1)
        );

        let concurrency = self.site.crawl.category_concurrency.max(1);
        let runs: Vec<CategoryRun> = stream::iter(selected)
            .map(|category| self.crawl_category(category, limit, max_pages))
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = CrawlReport {
            site_id: self.site.site_name.clone(),
            config_hash: self.config_hash.clone(),
            started_at,
            finished_at: Utc::now(),
            articles: Vec::new(),
            categories: Vec::new(),
        };
        for run in runs {
            report.articles.extend(run.records);
            report.categories.push(run.stats);
        }

        info!(
            "Finished {}: {} articles from {} categories",
            report.site_id,
            report.articles.len(),
            report.categories.len()
        );

        Ok(report)
    }

    fn resolve_categories(&self, requested: &[String]) -> Result<Vec<&CategoryConfig>> {
        if requested.is_empty() {
            return Ok(self.site.categories.values().collect());
        }

        requested
            .iter()
            .map(|name| {
                self.site
                    .category(name)
                    .ok_or_else(|| NewsprintError::Config(ConfigError::UnknownCategory(name.clone())))
            })
            .collect()
    }

    async fn crawl_category(&self, category: &CategoryConfig, limit: usize, max_pages: i64) -> CategoryRun {
        let mut run = CategoryRun {
            stats: CategoryStats::new(&category.name),
            records: Vec::new(),
        };

        let next_selector = match &category.pagination {
            PaginationConfig::NextButton { selector, attr } => {
                Some(FieldSelector::with_attr(selector.clone(), attr.clone()))
            }
            _ => None,
        };
        let compiled = CompiledSelectors::compile(&category.selectors, next_selector.as_ref())
            .and_then(|selectors| {
                let article = category
                    .article
                    .as_ref()
                    .map(CompiledArticle::compile)
                    .transpose()?;
                Ok((selectors, article))
            });
        let (selectors, article) = match compiled {
            Ok(compiled) => compiled,
            Err(e) => {
                error!("Category {} cannot be crawled: {}", category.name, e);
                run.stats.fail(e.to_string());
                return run;
            }
        };

        info!(
            "Category {} ({} pagination) from {}",
            category.name,
            category.pagination.kind_name(),
            category.url
        );

        let mut controller =
            PaginationController::new(category.url.clone(), category.pagination.clone(), max_pages);
        let mut session: Option<Box<dyn ScriptSession>> = None;
        let mut delay = self.page_delay;

        loop {
            let next = controller.next_page();
            let (page_url, body) = match next {
                NextPage::Done(reason) => {
                    debug!("Category {} stopped: {}", category.name, reason);
                    break;
                }
                NextPage::Fetch(url) => {
                    if !self.admit(&url, &mut delay, &mut controller, &mut run.stats).await {
                        continue;
                    }
                    self.pace(&run.stats, delay).await;
                    run.stats.pages_requested += 1;
                    match fetch_with_retry(self.fetcher.as_ref(), &url, &self.retry).await {
                        Ok(page) => (page.final_url, page.body),
                        Err(e) => {
                            warn!("Giving up on {}: {}", url, e);
                            run.stats.pages_failed += 1;
                            run.stats.errors.push(e.to_string());
                            controller.record(PageOutcome::FetchFailed);
                            continue;
                        }
                    }
                }
                NextPage::Open(url) => {
                    let Some(driver) = &self.script else {
                        error!(
                            "Category {} needs a script driver for script-triggered pagination",
                            category.name
                        );
                        run.stats
                            .fail("script-triggered-load pagination requires a script driver");
                        break;
                    };
                    if !self.admit(&url, &mut delay, &mut controller, &mut run.stats).await {
                        continue;
                    }
                    run.stats.pages_requested += 1;
                    let opened = match driver.open(&url).await {
                        Ok(mut s) => s.html().await.map(|html| (s, html)),
                        Err(e) => Err(e),
                    };
                    match opened {
                        Ok((s, html)) => {
                            session = Some(s);
                            (url, html)
                        }
                        Err(e) => {
                            warn!("Could not open {}: {}", url, e);
                            run.stats.pages_failed += 1;
                            run.stats.errors.push(e.to_string());
                            controller.record(PageOutcome::FetchFailed);
                            continue;
                        }
                    }
                }
                NextPage::Trigger {
                    selector,
                    iteration,
                } => {
                    let Some(live) = session.as_mut() else {
                        controller.record(PageOutcome::FetchFailed);
                        continue;
                    };
                    self.pace(&run.stats, delay).await;
                    run.stats.pages_requested += 1;
                    debug!("Trigger {} #{} on {}", selector, iteration, category.url);
                    match live.trigger(&selector).await {
                        Ok(false) => {
                            controller.record(PageOutcome::TriggerMissing);
                            continue;
                        }
                        Ok(true) => match live.html().await {
                            Ok(html) => (category.url.clone(), html),
                            Err(e) => {
                                run.stats.pages_failed += 1;
                                run.stats.errors.push(e.to_string());
                                controller.record(PageOutcome::FetchFailed);
                                continue;
                            }
                        },
                        Err(e) => {
                            warn!("Trigger {} failed on {}: {}", selector, category.url, e);
                            run.stats.pages_failed += 1;
                            run.stats.errors.push(e.to_string());
                            controller.record(PageOutcome::FetchFailed);
                            continue;
                        }
                    }
                }
            };

            run.stats.pages_fetched += 1;
            let page = extract_page(&selectors, &body, &page_url, &self.site.base_url);
            debug!(
                "{}: {} containers, {} drafts, {} dropped",
                page_url,
                page.container_matches,
                page.drafts.len(),
                page.dropped
            );

            controller.record(PageOutcome::Observed(PageObservation {
                container_matches: page.container_matches,
                next_link: page.next_link,
            }));

            run.stats.articles_found += page.drafts.len();
            run.stats.articles_dropped += page.dropped;

            for draft in page.drafts {
                if limit > 0 && run.records.len() >= limit {
                    break;
                }
                if let Err(reason) = self.site.filters.accepts(&draft.link, &self.site.base_url) {
                    debug!("Filtered {}: {}", draft.link, reason);
                    run.stats.articles_filtered += 1;
                    continue;
                }
                if !self.collector.insert(draft.link.as_str()) {
                    run.stats.duplicates += 1;
                    continue;
                }
                let link = draft.link.clone();
                let record = ArticleRecord::from_draft(&self.site.site_name, &category.name, draft);
                let detail = match &article {
                    Some(rules) => {
                        self.read_article(rules, &link, &mut delay, &mut run.stats)
                            .await
                    }
                    None => Detail::Missing,
                };
                let record = match detail {
                    Detail::Read(detail) => record.with_detail(detail),
                    Detail::Missing => record,
                    Detail::Repeated => {
                        debug!("Same body already collected; skipping {}", link);
                        run.stats.duplicates += 1;
                        continue;
                    }
                };
                run.records.push(record);
            }

            if limit > 0 && run.records.len() >= limit {
                controller.finish(StopReason::LimitReached);
            }
        }

        run.stats.articles_kept = run.records.len();
        run.stats.settle(controller.stop_reason());

        info!(
            "Category {}: {} articles, {} pages ({} failed, {} skipped), stop: {}",
            category.name,
            run.stats.articles_kept,
            run.stats.pages_fetched,
            run.stats.pages_failed,
            run.stats.pages_skipped,
            run.stats
                .stop_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        run
    }

    /// Consults the crawl policy, raising `delay` to its crawl-delay hint
    async fn allowed(&self, url: &Url, delay: &mut Duration) -> bool {
        match self.policy.check(url).await {
            PolicyDecision::Allowed { crawl_delay } => {
                if let Some(hint) = crawl_delay {
                    if hint > *delay {
                        debug!("Raising page delay to {:?} per crawl policy", hint);
                        *delay = hint;
                    }
                }
                true
            }
            PolicyDecision::Denied => {
                warn!("Skipping {}: {}", url, NewsprintError::PolicyDenied { url: url.to_string() });
                false
            }
        }
    }

    /// Consults the crawl policy for a listing page; records a denial and
    /// returns false if the URL must be skipped
    async fn admit(
        &self,
        url: &Url,
        delay: &mut Duration,
        controller: &mut PaginationController,
        stats: &mut CategoryStats,
    ) -> bool {
        if self.allowed(url, delay).await {
            return true;
        }
        stats.pages_skipped += 1;
        controller.record(PageOutcome::Denied);
        false
    }

    /// Fetches and extracts the article page behind a listing link
    ///
    /// A denied or failed article page keeps its listing entry.
    async fn read_article(
        &self,
        rules: &CompiledArticle,
        link: &Url,
        delay: &mut Duration,
        stats: &mut CategoryStats,
    ) -> Detail {
        if !self.allowed(link, delay).await {
            stats.details_skipped += 1;
            return Detail::Missing;
        }
        self.pace(stats, *delay).await;

        let page = match fetch_with_retry(self.fetcher.as_ref(), link, &self.retry).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Article page {} unavailable: {}", link, e);
                stats.details_failed += 1;
                stats.errors.push(e.to_string());
                return Detail::Missing;
            }
        };
        stats.details_fetched += 1;

        let detail = rules.extract(&page.body, &page.final_url);
        if detail.content.is_empty() {
            debug!("No article body found on {}", link);
        } else if !self.collector.insert_body(&detail.content_hash) {
            return Detail::Repeated;
        }
        Detail::Read(detail)
    }

    /// Sleeps between successive requests of one category
    async fn pace(&self, stats: &CategoryStats, delay: Duration) {
        if stats.pages_requested > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
