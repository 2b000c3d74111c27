// Test doubles for the crawl pipeline.
//
// - MockFetcher (Fetcher): HashMap-based URL → page / feed document
// - MockExtractor (ArticleExtractor): HashMap-based URL → raw extraction
// - FixedMemoryGauge (MemoryGauge): constant usage reading
//
// MemoryGraph (GraphStore) lives in pressgraph-graph and is re-exported here.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use pressgraph_common::{ExtractionError, FetchError, RawExtraction};

use crate::dispatcher::MemoryGauge;
use crate::traits::{ArticleExtractor, Fetcher, RenderOptions, RenderedPage};

pub use pressgraph_graph::memory::MemoryGraph;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Returns registered pages and feeds; unregistered URLs fail to render.
/// Builder pattern: `.on_page()`, `.on_html()`, `.on_feed()`, `.flaky()`, `.hanging()`.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, RenderedPage>,
    feeds: HashMap<String, Vec<u8>>,
    /// url → failures left before the page is served.
    flaky: Mutex<HashMap<String, u32>>,
    /// urls whose fetch never completes.
    hanging: HashSet<String>,
    calls: Mutex<Vec<(String, RenderOptions)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str, markdown: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            RenderedPage {
                url: url.to_string(),
                html: html.to_string(),
                markdown: markdown.to_string(),
            },
        );
        self
    }

    /// A page whose markdown is irrelevant (seed pages).
    pub fn on_html(self, url: &str, html: &str) -> Self {
        self.on_page(url, html, "")
    }

    pub fn on_feed(mut self, url: &str, document: &str) -> Self {
        self.feeds.insert(url.to_string(), document.as_bytes().to_vec());
        self
    }

    /// Fail the first `times` fetches of `url`, then serve it normally.
    pub fn flaky(self, url: &str, times: u32) -> Self {
        self.flaky.lock().unwrap().insert(url.to_string(), times);
        self
    }

    /// Never answer for `url`.
    pub fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    // --- Assertion helpers ---

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    pub fn options_for(&self, url: &str) -> Option<RenderOptions> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, o)| o.clone())
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        if self.hanging.contains(url) {
            return std::future::pending().await;
        }

        if let Some(left) = self.flaky.lock().unwrap().get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(FetchError::Render {
                    url: url.to_string(),
                    message: "transient failure".to_string(),
                });
            }
        }

        self.pages.get(url).cloned().ok_or_else(|| FetchError::Render {
            url: url.to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.feeds.get(url).cloned().ok_or_else(|| FetchError::Feed {
            url: url.to_string(),
            message: "HTTP 404 Not Found".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

enum Scripted {
    Raw(RawExtraction),
    Fail(String),
}

/// Returns the registered extraction for a page URL; unregistered pages
/// produce `RawExtraction::Empty`.
#[derive(Default)]
pub struct MockExtractor {
    results: HashMap<String, Scripted>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a JSON payload as the extractor would return it.
    pub fn on_json(mut self, url: &str, json: serde_json::Value) -> Self {
        self.results
            .insert(url.to_string(), Scripted::Raw(RawExtraction::from_value(json)));
        self
    }

    pub fn on_raw(mut self, url: &str, raw: RawExtraction) -> Self {
        self.results.insert(url.to_string(), Scripted::Raw(raw));
        self
    }

    pub fn failing(mut self, url: &str, message: &str) -> Self {
        self.results
            .insert(url.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleExtractor for MockExtractor {
    async fn extract(
        &self,
        page: &RenderedPage,
        _schema: &serde_json::Value,
        _instruction: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.results.get(&page.url) {
            Some(Scripted::Raw(raw)) => Ok(raw.clone()),
            Some(Scripted::Fail(message)) => Err(ExtractionError::Call {
                url: page.url.clone(),
                message: message.clone(),
            }),
            None => Ok(RawExtraction::Empty),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedMemoryGauge
// ---------------------------------------------------------------------------

pub struct FixedMemoryGauge(pub f64);

impl MemoryGauge for FixedMemoryGauge {
    fn used_percent(&self) -> f64 {
        self.0
    }
}
