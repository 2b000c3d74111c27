use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use pressgraph_common::{ArticleRecord, ContentPolicy};
use pressgraph_graph::{GraphStore, GraphWriteError};

use crate::article_log::{ArticleLog, ArticleLogError};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// A record whose upsert still failed after every attempt. Nothing from it
/// is in the graph; hand it back to `Ingestor::ingest_one` to retry.
#[derive(Debug, Clone)]
pub struct FailedRecord {
    /// Position in the log, 0-based.
    pub index: usize,
    pub record: ArticleRecord,
    pub error: GraphWriteError,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: usize,
    pub failed: Vec<FailedRecord>,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ingested {} records", self.ingested)?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed:", self.failed.len())?;
            for failed in &self.failed {
                write!(f, "\n  [{}] {}", failed.index, failed.error)?;
            }
        }
        Ok(())
    }
}

/// Replays the article log into the graph, one record at a time, in log order.
pub struct Ingestor {
    store: Arc<dyn GraphStore>,
    policy: ContentPolicy,
    max_attempts: u32,
    backoff: Duration,
}

impl Ingestor {
    pub fn new(store: Arc<dyn GraphStore>, policy: ContentPolicy) -> Self {
        Self {
            store,
            policy,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Read the full log, then ingest it.
    pub async fn ingest_log(&self, log: &ArticleLog) -> Result<IngestReport, ArticleLogError> {
        let records = log.read_all().await?;
        info!(path = %log.path().display(), records = records.len(), "Article log loaded");
        Ok(self.ingest(&records).await)
    }

    pub async fn ingest(&self, records: &[ArticleRecord]) -> IngestReport {
        let mut report = IngestReport::default();
        for (index, record) in records.iter().enumerate() {
            match self.ingest_one(record).await {
                Ok(()) => report.ingested += 1,
                Err(error) => report.failed.push(FailedRecord {
                    index,
                    record: record.clone(),
                    error,
                }),
            }
        }
        info!(
            ingested = report.ingested,
            failed = report.failed.len(),
            policy = ?self.policy,
            "Ingestion complete"
        );
        report
    }

    /// Upsert one record, retrying with exponential backoff.
    pub async fn ingest_one(&self, record: &ArticleRecord) -> Result<(), GraphWriteError> {
        let mut attempt = 1;
        loop {
            match self.store.upsert_article(record, self.policy).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        url = record.url.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Graph write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(url = record.url.as_str(), attempts = attempt, error = %e, "Graph write failed");
                    return Err(e);
                }
            }
        }
    }
}
