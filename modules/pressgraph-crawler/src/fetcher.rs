use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserlessClient, BrowserlessError, RenderRequest};
use scraper::{Html, Selector};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use pressgraph_common::FetchError;

use crate::traits::{Fetcher, RenderOptions, RenderedPage};

const FEED_TIMEOUT: Duration = Duration::from_secs(15);

// --- Browserless fetcher ---

/// Renders pages through a Browserless service. The rendered HTML is kept
/// whole for selector matching; excluded regions are stripped only from the
/// copy converted to markdown.
pub struct BrowserlessFetcher {
    client: BrowserlessClient,
    http: reqwest::Client,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>) -> anyhow::Result<Self> {
        let client = BrowserlessClient::new(base_url, token)?;
        let http = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .user_agent("pressgraph/0.1")
            .build()?;
        info!(base_url, "Using BrowserlessFetcher");
        Ok(Self { client, http })
    }

    /// Fails when the render service cannot be reached.
    pub async fn check(&self) -> Result<(), BrowserlessError> {
        self.client.ping().await
    }
}

#[async_trait]
impl Fetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, FetchError> {
        let request = RenderRequest {
            wait_for_selector: (!options.wait_for_selectors.is_empty())
                .then(|| options.wait_for_selectors.join(", ")),
            delay_before_capture: options.delay_before_capture,
            scan_full_page: options.scan_full_page,
            remove_overlays: options.remove_overlays,
            timeout: options.timeout,
        };

        let raw = self.client.content(url, &request).await.map_err(|e| match e {
            BrowserlessError::Timeout(secs) => FetchError::Timeout {
                url: url.to_string(),
                secs,
            },
            other => FetchError::Render {
                url: url.to_string(),
                message: other.to_string(),
            },
        })?;

        if raw.trim().is_empty() {
            return Err(FetchError::Render {
                url: url.to_string(),
                message: "empty document".to_string(),
            });
        }

        let page = render_page(url, raw, &options.excluded_tags);
        info!(url, bytes = page.html.len(), "Rendered page");
        Ok(page)
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let fail = |message: String| FetchError::Feed {
            url: url.to_string(),
            message,
        };
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }
        let bytes = resp.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Pair the untouched render with markdown of its non-excluded content.
pub fn render_page(url: &str, html: String, excluded: &[String]) -> RenderedPage {
    let markdown = to_markdown(&strip_regions(&html, excluded), url);
    if markdown.trim().is_empty() {
        warn!(url, "Empty content after Readability extraction");
    }
    RenderedPage {
        url: url.to_string(),
        html,
        markdown,
    }
}

/// Remove every element matching one of `excluded` (tag names or CSS
/// selectors). Unparseable selectors are ignored.
pub fn strip_regions(html: &str, excluded: &[String]) -> String {
    if excluded.is_empty() {
        return html.to_string();
    }
    let mut document = Html::parse_document(html);
    let mut doomed = Vec::new();
    for raw in excluded {
        match Selector::parse(raw) {
            Ok(selector) => doomed.extend(document.select(&selector).map(|el| el.id())),
            Err(_) => warn!(selector = raw.as_str(), "Ignoring invalid exclusion selector"),
        }
    }
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    document.html()
}

fn to_markdown(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_regions_are_removed() {
        let html = r#"<html><body>
            <header><a href="/home">Home</a></header>
            <nav><a href="/about">About</a></nav>
            <div class="cookie-banner">Accept cookies</div>
            <main><a href="/news/1">Story</a></main>
            <footer>Footer</footer>
        </body></html>"#;
        let excluded: Vec<String> = crate::traits::PAGE_CHROME_TAGS
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stripped = strip_regions(html, &excluded);
        assert!(stripped.contains("/news/1"));
        assert!(!stripped.contains("/home"));
        assert!(!stripped.contains("/about"));
        assert!(!stripped.contains("Accept cookies"));
        assert!(!stripped.contains("Footer"));
    }

    #[test]
    fn form_wrapped_page_keeps_its_lists_for_discovery() {
        let html = r#"<html><body><form id="aspnetForm">
            <nav><a href="/about">About</a></nav>
            <ul class="news-list"><li><a href="/news/1">Quarterly results</a></li></ul>
        </form></body></html>"#;
        let excluded: Vec<String> = crate::traits::PAGE_CHROME_TAGS
            .iter()
            .map(|s| s.to_string())
            .collect();

        let page = render_page("https://x.com/", html.to_string(), &excluded);

        assert_eq!(page.html, html);
        let links =
            crate::discovery::links_in_regions(&page.html, &page.url, &[".news-list".into()]);
        assert_eq!(links, Some(vec!["https://x.com/news/1".to_string()]));
        assert!(!page.markdown.contains("About"));
    }

    #[tokio::test]
    async fn unreachable_render_service_fails_the_check() {
        let fetcher = BrowserlessFetcher::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(fetcher.check().await, Err(BrowserlessError::Setup(_))));
    }

    #[test]
    fn nested_exclusions_do_not_panic() {
        let html = "<html><body><footer><nav><a href='/x'>x</a></nav></footer><p>keep</p></body></html>";
        let stripped = strip_regions(html, &["footer".into(), "nav".into(), "[[bad".into()]);
        assert!(stripped.contains("keep"));
        assert!(!stripped.contains("/x"));
    }
}
