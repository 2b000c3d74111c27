// Capability seams for the crawl pipeline.
//
// Fetcher renders pages and downloads feeds; ArticleExtractor turns one
// rendered page into raw extraction output. Both are injected so the
// pipeline runs against MockFetcher / MockExtractor in tests.

use std::time::Duration;

use async_trait::async_trait;

use pressgraph_common::{ExtractionError, FetchError, RawExtraction};

/// Regions left out of the markdown of seed and HTML article pages.
pub const PAGE_CHROME_TAGS: &[&str] = &[
    "header",
    "footer",
    "form",
    "nav",
    ".cookie-banner",
    ".privacy-preference",
];

/// Feed article pages keep their header region.
pub const FEED_ARTICLE_CHROME_TAGS: &[&str] = &["form", "footer", "nav"];

/// How a page is rendered before capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Wait until one of these selectors is present.
    pub wait_for_selectors: Vec<String>,
    /// Tags or CSS selectors left out of the markdown. `RenderedPage::html`
    /// keeps them so selectors still see the whole page.
    pub excluded_tags: Vec<String>,
    pub scan_full_page: bool,
    pub remove_overlays: bool,
    pub delay_before_capture: Duration,
    pub timeout: Duration,
}

impl RenderOptions {
    /// Seed pages: wait for the list regions, page chrome out of the markdown.
    pub fn seed(selectors: &[String], timeout: Duration) -> Self {
        Self {
            wait_for_selectors: selectors.to_vec(),
            excluded_tags: owned(PAGE_CHROME_TAGS),
            scan_full_page: false,
            remove_overlays: false,
            delay_before_capture: Duration::ZERO,
            timeout,
        }
    }

    /// Article pages behind an HTML seed: full scan, overlays removed,
    /// settle delay before capture.
    pub fn article(delay: Duration, timeout: Duration) -> Self {
        Self {
            wait_for_selectors: Vec::new(),
            excluded_tags: owned(PAGE_CHROME_TAGS),
            scan_full_page: true,
            remove_overlays: true,
            delay_before_capture: delay,
            timeout,
        }
    }

    /// Article pages linked from a feed.
    pub fn feed_article(timeout: Duration) -> Self {
        Self {
            wait_for_selectors: Vec::new(),
            excluded_tags: owned(FEED_ARTICLE_CHROME_TAGS),
            scan_full_page: false,
            remove_overlays: false,
            delay_before_capture: Duration::ZERO,
            timeout,
        }
    }
}

fn owned(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

/// A successfully rendered page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    /// Final URL after redirects.
    pub url: String,
    /// The full render, nothing removed.
    pub html: String,
    pub markdown: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Render a page and return its HTML and markdown.
    async fn fetch(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, FetchError>;

    /// Download a feed document without rendering.
    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// Run schema-constrained extraction over one page. An extractor that
    /// returns nothing reports `RawExtraction::Empty`, not an error.
    async fn extract(
        &self,
        page: &RenderedPage,
        schema: &serde_json::Value,
        instruction: &str,
    ) -> Result<RawExtraction, ExtractionError>;
}
