// Two-phase crawl: discover article links (from seed pages or a feed),
// then render and extract each article and append accepted records to the
// article log. Phase 1 completes before phase 2 starts; per-URL failures
// are recorded in the report and never abort the run.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use pressgraph_common::{
    normalize_url, ArticleRecord, CrawlSettings, CrawlTarget, ExtractionError,
    ExtractionShapeError, FetchError, SourceType,
};

use crate::article_log::ArticleLog;
use crate::discovery::{discover_links, SeedOutcome};
use crate::dispatcher::{Dispatcher, MemoryGauge, ProcMemoryGauge};
use crate::extractor::{extraction_instruction, extraction_schema};
use crate::feed::discover_feed_links;
use crate::resolver::resolve;
use crate::traits::{ArticleExtractor, Fetcher, RenderOptions, RenderedPage};

// --- Reports ---

#[derive(Debug)]
pub enum ArticleOutcome {
    /// Record accepted and appended to the log.
    Extracted,
    /// The extractor produced no content.
    Empty,
    FetchFailed(FetchError),
    ExtractionFailed(String),
    Shape(ExtractionShapeError),
    LogFailed(String),
}

#[derive(Debug)]
pub struct ArticleReport {
    pub url: String,
    pub outcome: ArticleOutcome,
}

#[derive(Debug)]
pub struct TargetReport {
    pub source_id: i64,
    pub name: String,
    pub source_type: SourceType,
    pub seeds: Vec<(String, SeedOutcome)>,
    /// Set when an RSS feed could not be downloaded or parsed.
    pub feed_error: Option<FetchError>,
    pub candidates: usize,
    pub articles: Vec<ArticleReport>,
}

impl TargetReport {
    fn new(target: &CrawlTarget) -> Self {
        Self {
            source_id: target.source_id,
            name: target.name.clone(),
            source_type: target.source_type,
            seeds: Vec::new(),
            feed_error: None,
            candidates: 0,
            articles: Vec::new(),
        }
    }

    pub fn extracted(&self) -> usize {
        self.articles
            .iter()
            .filter(|a| matches!(a.outcome, ArticleOutcome::Extracted))
            .count()
    }
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    pub targets: Vec<TargetReport>,
}

impl CrawlReport {
    pub fn extracted(&self) -> usize {
        self.targets.iter().map(TargetReport::extracted).sum()
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for target in &self.targets {
            writeln!(
                f,
                "=== {} [{}] #{} ===",
                target.name, target.source_type, target.source_id
            )?;
            if let Some(e) = &target.feed_error {
                writeln!(f, "[ERROR] feed - {e}")?;
            }
            for (seed, outcome) in &target.seeds {
                match outcome {
                    SeedOutcome::Scanned { candidates } => {
                        writeln!(f, "[OK] seed - {seed}: {candidates} links")?
                    }
                    SeedOutcome::NoSelectorMatch => writeln!(f, "No selectors matched in {seed}")?,
                    SeedOutcome::Failed(e) => writeln!(f, "[ERROR] seed - {seed}: {e}")?,
                }
            }
            for article in &target.articles {
                match &article.outcome {
                    ArticleOutcome::Extracted => writeln!(f, "[OK] article - {}", article.url)?,
                    ArticleOutcome::Empty => {
                        writeln!(f, "No content extracted from {}", article.url)?
                    }
                    ArticleOutcome::FetchFailed(e) => {
                        writeln!(f, "[ERROR] article - {}: {e}", article.url)?
                    }
                    ArticleOutcome::ExtractionFailed(msg) | ArticleOutcome::LogFailed(msg) => {
                        writeln!(f, "[ERROR] article - {}: {msg}", article.url)?
                    }
                    ArticleOutcome::Shape(e) => writeln!(f, "[SHAPE] article - {e}")?,
                }
            }
            writeln!(
                f,
                "Successfully extracted content from {} of {} articles",
                target.extracted(),
                target.articles.len()
            )?;
        }
        write!(f, "Total extracted: {}", self.extracted())
    }
}

// --- Pipeline ---

pub struct CrawlPipeline {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ArticleExtractor>,
    log: Arc<ArticleLog>,
    settings: CrawlSettings,
    gauge: Arc<dyn MemoryGauge>,
    schema: serde_json::Value,
    instruction: String,
}

impl CrawlPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ArticleExtractor>,
        log: Arc<ArticleLog>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            log,
            settings,
            gauge: Arc::new(ProcMemoryGauge),
            schema: extraction_schema(),
            instruction: extraction_instruction(),
        }
    }

    pub fn with_gauge(mut self, gauge: Arc<dyn MemoryGauge>) -> Self {
        self.gauge = gauge;
        self
    }

    /// Crawl every target in catalog order with one visited set for the run.
    pub async fn crawl(&self, targets: &[CrawlTarget]) -> CrawlReport {
        let mut visited = HashSet::new();
        let mut report = CrawlReport::default();
        for target in targets {
            report.targets.push(self.crawl_target(target, &mut visited).await);
        }
        info!(
            targets = report.targets.len(),
            extracted = report.extracted(),
            "Crawl complete"
        );
        report
    }

    pub async fn crawl_target(
        &self,
        target: &CrawlTarget,
        visited: &mut HashSet<String>,
    ) -> TargetReport {
        info!(
            source_id = target.source_id,
            name = target.name.as_str(),
            url = target.url.as_str(),
            source_type = %target.source_type,
            "Crawling target"
        );
        match target.source_type {
            SourceType::Html => self.crawl_html(target, visited).await,
            SourceType::Rss => self.crawl_rss(target, visited).await,
        }
    }

    async fn crawl_html(&self, target: &CrawlTarget, visited: &mut HashSet<String>) -> TargetReport {
        let mut report = TargetReport::new(target);
        let timeout = self.settings.request_timeout();

        let seed_dispatcher = self.dispatcher(self.settings.seed_max_in_flight);
        let discovery = discover_links(
            self.fetcher.as_ref(),
            &seed_dispatcher,
            std::slice::from_ref(&target.url),
            &target.selectors,
            &RenderOptions::seed(&target.selectors, timeout),
            visited,
        )
        .await;
        report.seeds = discovery.seeds;
        report.candidates = discovery.candidates.len();

        if discovery.candidates.is_empty() {
            info!(name = target.name.as_str(), "No article links found");
            return report;
        }

        let urls: Vec<String> = discovery.candidates.into_iter().map(|c| c.url).collect();
        let article_dispatcher = self
            .dispatcher(self.settings.article_max_in_flight)
            .with_rate_limit(self.settings.html_rate_limit.clone());
        let options = RenderOptions::article(self.settings.render_delay, timeout);
        report.articles = self
            .extract_articles(target, &article_dispatcher, urls, &options, visited)
            .await;
        report
    }

    async fn crawl_rss(&self, target: &CrawlTarget, visited: &mut HashSet<String>) -> TargetReport {
        let mut report = TargetReport::new(target);
        let links = match discover_feed_links(self.fetcher.as_ref(), &target.url).await {
            Ok(links) => links,
            Err(e) => {
                warn!(url = target.url.as_str(), error = %e, "Feed discovery failed");
                report.feed_error = Some(e);
                return report;
            }
        };
        report.candidates = links.len();
        if links.is_empty() {
            return report;
        }

        let dispatcher = self
            .dispatcher(self.settings.article_max_in_flight)
            .with_rate_limit(self.settings.rss_rate_limit.clone());
        let options = RenderOptions::feed_article(self.settings.request_timeout());
        report.articles = self
            .extract_articles(target, &dispatcher, links, &options, visited)
            .await;
        report
    }

    fn dispatcher(&self, max_in_flight: usize) -> Dispatcher {
        Dispatcher::new(max_in_flight, &self.settings).with_gauge(self.gauge.clone())
    }

    /// Phase 2: render every article, run extraction, then resolve and
    /// append the results one at a time.
    async fn extract_articles(
        &self,
        target: &CrawlTarget,
        dispatcher: &Dispatcher,
        urls: Vec<String>,
        options: &RenderOptions,
        visited: &mut HashSet<String>,
    ) -> Vec<ArticleReport> {
        info!(name = target.name.as_str(), articles = urls.len(), "Extracting articles");
        let fetched = dispatcher.fetch_all(self.fetcher.as_ref(), urls, options).await;

        let extracted: Vec<(String, Result<(RenderedPage, _), FetchError>)> =
            stream::iter(fetched.into_iter().map(|(url, result)| async move {
                match result {
                    Ok(page) => {
                        let raw = self
                            .extractor
                            .extract(&page, &self.schema, &self.instruction)
                            .await;
                        (url, Ok((page, raw)))
                    }
                    Err(e) => (url, Err(e)),
                }
            }))
            .buffer_unordered(self.settings.article_max_in_flight.max(1))
            .collect()
            .await;

        let mut reports = Vec::with_capacity(extracted.len());
        for (url, result) in extracted {
            visited.insert(normalize_url(&url));
            let outcome = match result {
                Err(e) => {
                    warn!(url = url.as_str(), error = %e, "Article fetch failed");
                    ArticleOutcome::FetchFailed(e)
                }
                Ok((page, raw)) => self.accept(target, &url, page, raw).await,
            };
            reports.push(ArticleReport { url, outcome });
        }

        let ok = reports
            .iter()
            .filter(|r| matches!(r.outcome, ArticleOutcome::Extracted))
            .count();
        info!(name = target.name.as_str(), extracted = ok, total = reports.len(), "Articles processed");
        reports
    }

    async fn accept(
        &self,
        target: &CrawlTarget,
        url: &str,
        page: RenderedPage,
        raw: Result<pressgraph_common::RawExtraction, ExtractionError>,
    ) -> ArticleOutcome {
        let raw = match raw {
            Ok(raw) => raw,
            Err(ExtractionError::Shape(e)) => {
                error!(url, error = %e, "Extraction shape violation");
                return ArticleOutcome::Shape(e);
            }
            Err(e) => {
                warn!(url, error = %e, "Extraction failed");
                return ArticleOutcome::ExtractionFailed(e.to_string());
            }
        };

        let record = match resolve(raw, url) {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(url, "No content extracted");
                return ArticleOutcome::Empty;
            }
            Err(e) => {
                error!(url, error = %e, "Extraction shape violation");
                return ArticleOutcome::Shape(e);
            }
        };

        let article = ArticleRecord::from_extraction(
            record,
            url,
            page.markdown,
            target.name.as_str(),
            target.description.as_str(),
            Utc::now(),
        );
        match self.log.append(&article).await {
            Ok(()) => ArticleOutcome::Extracted,
            Err(e) => {
                warn!(url, error = %e, "Failed to append article");
                ArticleOutcome::LogFailed(e.to_string())
            }
        }
    }
}
