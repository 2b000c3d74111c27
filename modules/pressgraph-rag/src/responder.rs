use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use pressgraph_graph::{GraphStore, QueryRow};

use crate::guard::{clean_cypher, ensure_read_only};
use crate::model::LanguageModel;
use crate::prompts::{answer_prompt, cypher_prompt, ANSWER_SYSTEM, CYPHER_SYSTEM};

pub const DEFAULT_TOP_K: usize = 10;

/// Returned without a model call when the query matched nothing.
pub const NOT_AVAILABLE: &str = "The answer is not available based on the data in the graph.";

/// Progress of one question through the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagStage {
    Idle,
    SchemaLoaded,
    QueryGenerated,
    QueryExecuted,
    AnswerRendered,
    Failed,
}

impl fmt::Display for RagStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RagStage::Idle => "idle",
            RagStage::SchemaLoaded => "schema-loaded",
            RagStage::QueryGenerated => "query-generated",
            RagStage::QueryExecuted => "query-executed",
            RagStage::AnswerRendered => "answer-rendered",
            RagStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("could not load the graph schema: {0}")]
    Schema(String),

    #[error("could not generate a query: {0}")]
    Generation(String),

    #[error("the query failed: {0}")]
    Execution(String),

    #[error("could not render an answer: {0}")]
    Render(String),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// `AnswerRendered` on success, `Failed` otherwise.
    pub stage: RagStage,
    pub cypher: Option<String>,
    pub rows: Vec<QueryRow>,
    pub error: Option<QueryError>,
}

impl Answer {
    pub fn is_failure(&self) -> bool {
        self.stage == RagStage::Failed
    }
}

/// Answers one question at a time against the live graph.
pub struct QueryResponder {
    store: Arc<dyn GraphStore>,
    cypher_model: Arc<dyn LanguageModel>,
    answer_model: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl QueryResponder {
    pub fn new(
        store: Arc<dyn GraphStore>,
        cypher_model: Arc<dyn LanguageModel>,
        answer_model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            store,
            cypher_model,
            answer_model,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Never fails: errors become an apology in `Answer::text`.
    pub async fn ask(&self, question: &str) -> Answer {
        info!(question, "Processing question");
        let mut answer = Answer {
            text: String::new(),
            stage: RagStage::Idle,
            cypher: None,
            rows: Vec::new(),
            error: None,
        };

        match self.run(question, &mut answer).await {
            Ok(text) => {
                answer.text = text;
                answer.stage = RagStage::AnswerRendered;
            }
            Err(e) => {
                warn!(question, stage = %answer.stage, error = %e, "Question failed");
                answer.text =
                    format!("Sorry, I encountered an error while processing your question: {e}");
                answer.stage = RagStage::Failed;
                answer.error = Some(e);
            }
        }
        answer
    }

    async fn run(&self, question: &str, answer: &mut Answer) -> Result<String, QueryError> {
        let schema = self
            .store
            .schema()
            .await
            .map_err(|e| QueryError::Schema(e.to_string()))?;
        answer.stage = RagStage::SchemaLoaded;
        debug!(schema = %schema, "Schema loaded");

        let generated = self
            .cypher_model
            .complete(CYPHER_SYSTEM, &cypher_prompt(&schema.to_string(), question))
            .await
            .map_err(|e| QueryError::Generation(e.to_string()))?;
        let cypher = clean_cypher(&generated);
        answer.cypher = Some(cypher.clone());
        ensure_read_only(&cypher).map_err(QueryError::Generation)?;
        answer.stage = RagStage::QueryGenerated;
        info!(cypher = cypher.as_str(), "Generated Cypher");

        let rows = self
            .store
            .read_query(&cypher, self.top_k)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        answer.stage = RagStage::QueryExecuted;
        info!(rows = rows.len(), "Query executed");

        if rows.is_empty() {
            return Ok(NOT_AVAILABLE.to_string());
        }

        let context = serde_json::to_string(&rows).map_err(|e| QueryError::Render(e.to_string()))?;
        answer.rows = rows;
        let text = self
            .answer_model
            .complete(ANSWER_SYSTEM, &answer_prompt(&context, question))
            .await
            .map_err(|e| QueryError::Render(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::Render("model returned an empty answer".to_string()));
        }
        Ok(text.to_string())
    }
}
