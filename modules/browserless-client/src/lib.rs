pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Scrolls to the bottom in steps so lazy-loaded sections render before capture.
const FULL_PAGE_SCROLL_JS: &str = "(async () => { \
    for (let y = 0; y < document.body.scrollHeight; y += window.innerHeight) { \
        window.scrollTo(0, y); await new Promise(r => setTimeout(r, 100)); \
    } window.scrollTo(0, 0); })();";

/// Hides fixed-position modals and consent walls.
const OVERLAY_CSS: &str = "[class*='overlay'],[class*='modal'],[id*='cookie'],\
    [class*='cookie'],[class*='consent'],[class*='popup'] { display: none !important; }";

/// How a page should be rendered before its HTML is captured.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// CSS selector to wait for before capture.
    pub wait_for_selector: Option<String>,
    pub delay_before_capture: Duration,
    pub scan_full_page: bool,
    pub remove_overlays: bool,
    /// Upper bound for the whole render; also used for the HTTP call.
    pub timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentBody<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<WaitForSelector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_script_tag: Vec<TagContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_style_tag: Vec<TagContent<'a>>,
    reject_resource_types: [&'static str; 3],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

#[derive(Serialize)]
struct WaitForSelector<'a> {
    selector: &'a str,
    timeout: u64,
}

#[derive(Serialize)]
struct TagContent<'a> {
    content: &'a str,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BrowserlessError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self) -> String {
        self.url_for("content")
    }

    fn url_for(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Confirm the service is up by reading its browser version. Any
    /// failure is a `Setup` error: nothing can be rendered without it.
    pub async fn ping(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.url_for("json/version"))
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .map_err(|e| BrowserlessError::Setup(format!("{}: {e}", self.base_url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BrowserlessError::Setup(format!(
                "{} answered HTTP {status}",
                self.base_url
            )));
        }
        debug!(base_url = self.base_url.as_str(), "browserless reachable");
        Ok(())
    }

    /// Fetch fully-rendered HTML for a URL via the Browserless /content endpoint.
    pub async fn content(&self, url: &str, request: &RenderRequest) -> Result<String> {
        let body = content_body(url, request);
        let timeout_secs = request.timeout.as_secs();

        debug!(url, timeout_secs, "browserless content request");

        let send = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(request.timeout)
            .send();

        let resp = match send.await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Err(BrowserlessError::Timeout(timeout_secs)),
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

fn content_body<'a>(url: &'a str, request: &'a RenderRequest) -> ContentBody<'a> {
    let timeout_ms = request.timeout.as_millis() as u64;
    let delay_ms = request.delay_before_capture.as_millis() as u64;

    let mut scripts = Vec::new();
    if request.scan_full_page {
        scripts.push(TagContent {
            content: FULL_PAGE_SCROLL_JS,
        });
    }
    let mut styles = Vec::new();
    if request.remove_overlays {
        styles.push(TagContent {
            content: OVERLAY_CSS,
        });
    }

    ContentBody {
        url,
        goto_options: GotoOptions {
            wait_until: "networkidle2",
            timeout: timeout_ms,
        },
        wait_for_selector: request
            .wait_for_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|selector| WaitForSelector {
                selector,
                timeout: timeout_ms,
            }),
        wait_for_timeout: (delay_ms > 0).then_some(delay_ms),
        add_script_tag: scripts,
        add_style_tag: styles,
        reject_resource_types: ["image", "media", "font"],
    }
}
