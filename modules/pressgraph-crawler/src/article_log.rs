use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use pressgraph_common::ArticleRecord;

#[derive(Error, Debug)]
pub enum ArticleLogError {
    #[error("article log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("article log {path} line {line} is not an article record: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("article record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only JSON-lines log of accepted articles.
///
/// Each append opens the file, writes one line, flushes and closes it, so a
/// crash loses at most the record being written. Appends through one
/// `ArticleLog` are serialised.
pub struct ArticleLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ArticleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &ArticleRecord) -> Result<(), ArticleLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let io = |source: std::io::Error| ArticleLogError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io)?;
        file.write_all(line.as_bytes()).await.map_err(io)?;
        file.flush().await.map_err(io)?;

        debug!(url = record.url.as_str(), path = %self.path.display(), "Article appended");
        Ok(())
    }

    /// Read the whole log. Blank lines are skipped; any other line that is
    /// not an article record fails the read.
    pub async fn read_all(&self) -> Result<Vec<ArticleRecord>, ArticleLogError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ArticleLogError::Io {
                path: self.path.clone(),
                source,
            })?;

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|source| ArticleLogError::Malformed {
                    path: self.path.clone(),
                    line: index + 1,
                    source,
                })
            })
            .collect()
    }
}
