use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use pressgraph_common::{normalize_url, CandidateLink, FetchError};

use crate::dispatcher::Dispatcher;
use crate::traits::{Fetcher, RenderOptions};

static PAGINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(page=\d+|/page/\d+/?)").expect("valid regex"));

static DOCUMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(pdf|docx?|xlsx?|pptx?|zip|rar)(\?|$)").expect("valid regex")
});

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Why a seed page produced no candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedOutcome {
    /// Selectors matched; `candidates` new links were added.
    Scanned { candidates: usize },
    /// Page fetched but none of the selectors matched.
    NoSelectorMatch,
    /// Page could not be fetched; its selectors were not evaluated.
    Failed(FetchError),
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub candidates: HashSet<CandidateLink>,
    /// Per seed, in the order fetches completed.
    pub seeds: Vec<(String, SeedOutcome)>,
}

/// Phase 1: fetch every seed and collect candidate article links.
///
/// Fetched seed URLs are added to `visited`; candidates already in
/// `visited` are dropped. Seeds that fail or match nothing are reported
/// in the returned outcomes without affecting the others.
pub async fn discover_links<F>(
    fetcher: &F,
    dispatcher: &Dispatcher,
    seeds: &[String],
    selectors: &[String],
    options: &RenderOptions,
    visited: &mut HashSet<String>,
) -> Discovery
where
    F: Fetcher + ?Sized,
{
    let normalized: Vec<String> = seeds.iter().map(|s| normalize_url(s)).collect();
    let results = dispatcher.fetch_all(fetcher, normalized, options).await;

    let mut discovery = Discovery::default();
    for (seed, result) in results {
        visited.insert(normalize_url(&seed));
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(url = seed.as_str(), error = %e, "Seed page fetch failed");
                discovery.seeds.push((seed, SeedOutcome::Failed(e)));
                continue;
            }
        };

        let base = if page.url.is_empty() { seed.as_str() } else { page.url.as_str() };
        let Some(links) = links_in_regions(&page.html, base, selectors) else {
            warn!(url = seed.as_str(), "No selectors matched");
            discovery.seeds.push((seed, SeedOutcome::NoSelectorMatch));
            continue;
        };

        let before = discovery.candidates.len();
        for link in links {
            if !visited.contains(&link) {
                discovery.candidates.insert(CandidateLink::new(link, seed.clone()));
            }
        }
        let added = discovery.candidates.len() - before;
        info!(url = seed.as_str(), candidates = added, "Seed page scanned");
        discovery.seeds.push((seed, SeedOutcome::Scanned { candidates: added }));
    }
    discovery
}

/// Links inside the regions matched by `selectors`, resolved against
/// `base_url`, normalized and filtered. `None` when no selector matched
/// any element.
pub fn links_in_regions(html: &str, base_url: &str, selectors: &[String]) -> Option<Vec<String>> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut matched = false;
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for raw in selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(_) => {
                warn!(selector = raw.as_str(), "Invalid CSS selector, skipping");
                continue;
            }
        };
        for region in document.select(&selector) {
            matched = true;
            for anchor in region.select(&ANCHOR_SELECTOR) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                if let Some(link) = accept_href(href, base.as_ref()) {
                    if seen.insert(link.clone()) {
                        links.push(link);
                    }
                }
            }
        }
    }

    matched.then_some(links)
}

/// Resolve and normalize one href, or `None` if it is excluded.
pub fn accept_href(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let resolved = if href.starts_with("http") {
        Url::parse(href).ok()?
    } else {
        base?.join(href).ok()?
    };
    let normalized = normalize_url(resolved.as_str());
    if is_excluded(&normalized) {
        return None;
    }
    Some(normalized)
}

/// Pagination links and non-HTML documents.
pub fn is_excluded(url: &str) -> bool {
    PAGINATION_RE.is_match(url) || DOCUMENT_RE.is_match(url)
}
