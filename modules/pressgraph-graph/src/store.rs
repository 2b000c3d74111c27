use async_trait::async_trait;
use thiserror::Error;

use pressgraph_common::{ArticleRecord, ContentPolicy};

use crate::{GraphClient, GraphReader, GraphSchema, GraphWriter};

/// One result row keyed by the query's return aliases.
pub type QueryRow = serde_json::Map<String, serde_json::Value>;

/// The upsert transaction for one record failed and was rolled back.
/// Nothing from that record is visible; it can be retried as a unit.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("graph write failed for {url}: {message}")]
pub struct GraphWriteError {
    pub url: String,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphReadError {
    #[error("schema introspection failed: {0}")]
    Schema(String),

    #[error("query execution failed: {0}")]
    Query(String),

    #[error("result row could not be decoded: {0}")]
    Decode(String),
}

/// The graph capability the ingestion and question-answering phases need.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply the three upsert steps for one record atomically.
    async fn upsert_article(
        &self,
        record: &ArticleRecord,
        policy: ContentPolicy,
    ) -> Result<(), GraphWriteError>;

    /// Current labels, relationship types and properties. Never cached.
    async fn schema(&self) -> Result<GraphSchema, GraphReadError>;

    /// Run a read-only statement, keeping at most `row_cap` rows.
    async fn read_query(&self, cypher: &str, row_cap: usize)
        -> Result<Vec<QueryRow>, GraphReadError>;
}

/// `GraphStore` over a live Neo4j connection.
#[derive(Clone)]
pub struct Neo4jStore {
    writer: GraphWriter,
    reader: GraphReader,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self {
            writer: GraphWriter::new(client.clone()),
            reader: GraphReader::new(client),
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_article(
        &self,
        record: &ArticleRecord,
        policy: ContentPolicy,
    ) -> Result<(), GraphWriteError> {
        self.writer.upsert_article(record, policy).await
    }

    async fn schema(&self) -> Result<GraphSchema, GraphReadError> {
        self.reader.schema().await
    }

    async fn read_query(
        &self,
        cypher: &str,
        row_cap: usize,
    ) -> Result<Vec<QueryRow>, GraphReadError> {
        self.reader.read_query(cypher, row_cap).await
    }
}
