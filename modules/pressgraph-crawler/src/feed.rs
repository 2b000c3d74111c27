use tracing::{info, warn};

use pressgraph_common::FetchError;

use crate::traits::Fetcher;

/// Download a feed and return its entry links in document order.
pub async fn discover_feed_links<F>(fetcher: &F, feed_url: &str) -> Result<Vec<String>, FetchError>
where
    F: Fetcher + ?Sized,
{
    let bytes = fetcher.fetch_feed(feed_url).await?;
    let links = parse_feed_links(&bytes).map_err(|message| FetchError::Feed {
        url: feed_url.to_string(),
        message,
    })?;
    info!(feed_url, links = links.len(), "Feed parsed");
    Ok(links)
}

/// Entry links of an RSS/Atom/JSON feed. Entries without a link are skipped.
pub fn parse_feed_links(bytes: &[u8]) -> Result<Vec<String>, String> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| e.to_string())?;
    let mut links = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        match entry.links.first() {
            Some(link) if !link.href.trim().is_empty() => links.push(link.href.trim().to_string()),
            _ => warn!(entry_id = entry.id.as_str(), "Feed entry has no link, skipping"),
        }
    }
    Ok(links)
}
