use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::PressgraphError;
use crate::types::CrawlTarget;

/// Supplies the ordered list of sources to crawl.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn targets(&self) -> Result<Vec<CrawlTarget>, PressgraphError>;
}

/// Catalog stored as a JSON array of `CrawlTarget` objects.
pub struct JsonCatalog {
    path: PathBuf,
    source_ids: Vec<i64>,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source_ids: Vec::new(),
        }
    }

    /// Restrict to these source ids. Empty means all.
    pub fn only(mut self, source_ids: impl IntoIterator<Item = i64>) -> Self {
        self.source_ids = source_ids.into_iter().collect();
        self
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    async fn targets(&self) -> Result<Vec<CrawlTarget>, PressgraphError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PressgraphError::Catalog(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let all: Vec<CrawlTarget> = serde_json::from_str(&raw).map_err(|e| {
            PressgraphError::Catalog(format!("invalid catalog {}: {e}", self.path.display()))
        })?;

        let targets: Vec<CrawlTarget> = all
            .into_iter()
            .filter(|t| self.source_ids.is_empty() || self.source_ids.contains(&t.source_id))
            .collect();

        info!(
            path = %self.path.display(),
            targets = targets.len(),
            "Catalog loaded"
        );
        Ok(targets)
    }
}
