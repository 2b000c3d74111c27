// In-memory GraphStore for tests.
//
// Mirrors the Neo4j upsert semantics (WebSource/Product/Target merged by key,
// Content created or merged per policy) so ingestion and question-answering
// tests run without a database. Reads return whatever rows were registered
// for a statement.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use pressgraph_common::{ArticleRecord, ContentPolicy};

use crate::{GraphReadError, GraphSchema, GraphStore, GraphWriteError, PropertyInfo, QueryRow};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredContent {
    pub title: String,
    pub description: String,
    pub published_date: String,
    pub link: String,
    pub source: String,
    pub products: BTreeSet<String>,
}

#[derive(Default)]
struct Inner {
    sources: HashMap<String, String>,
    contents: Vec<StoredContent>,
    products: BTreeSet<String>,
    targets: BTreeSet<String>,
    product_targets: BTreeSet<(String, String)>,
    /// url → remaining failures before writes for it succeed.
    failures: HashMap<String, u32>,
    fail_all_writes: bool,
    write_attempts: usize,
    query_results: HashMap<String, Vec<QueryRow>>,
    queries_seen: Vec<String>,
    fail_reads: bool,
}

pub struct MemoryGraph {
    inner: Mutex<Inner>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fail the next `times` writes for `url`, then succeed.
    pub fn fail_writes_for(self, url: &str, times: u32) -> Self {
        self.inner.lock().unwrap().failures.insert(url.to_string(), times);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.inner.lock().unwrap().fail_all_writes = true;
        self
    }

    pub fn failing_reads(self) -> Self {
        self.inner.lock().unwrap().fail_reads = true;
        self
    }

    /// Rows returned when exactly this statement (whitespace-trimmed) is run.
    pub fn on_query(self, cypher: &str, rows: Vec<QueryRow>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .query_results
            .insert(cypher.trim().to_string(), rows);
        self
    }

    // --- Assertion helpers ---

    pub fn source_count(&self) -> usize {
        self.inner.lock().unwrap().sources.len()
    }

    pub fn source_description(&self, name: &str) -> Option<String> {
        self.inner.lock().unwrap().sources.get(name).cloned()
    }

    pub fn content_count(&self) -> usize {
        self.inner.lock().unwrap().contents.len()
    }

    pub fn contents(&self) -> Vec<StoredContent> {
        self.inner.lock().unwrap().contents.clone()
    }

    pub fn product_count(&self) -> usize {
        self.inner.lock().unwrap().products.len()
    }

    pub fn target_count(&self) -> usize {
        self.inner.lock().unwrap().targets.len()
    }

    pub fn has_for(&self, product: &str, target: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .product_targets
            .contains(&(product.to_string(), target.to_string()))
    }

    pub fn write_attempts(&self) -> usize {
        self.inner.lock().unwrap().write_attempts
    }

    pub fn queries_seen(&self) -> Vec<String> {
        self.inner.lock().unwrap().queries_seen.clone()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_article(
        &self,
        record: &ArticleRecord,
        policy: ContentPolicy,
    ) -> Result<(), GraphWriteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_attempts += 1;

        let injected = match inner.failures.get_mut(&record.url) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };
        if inner.fail_all_writes || injected {
            return Err(GraphWriteError {
                url: record.url.clone(),
                message: "injected write failure".to_string(),
            });
        }

        inner
            .sources
            .entry(record.source_name.clone())
            .or_insert_with(|| record.source_description.clone());

        let existing = match policy {
            ContentPolicy::AlwaysCreate => None,
            ContentPolicy::MergeByLink => inner.contents.iter().position(|c| c.link == record.url),
        };
        let index = match existing {
            Some(i) => i,
            None => {
                inner.contents.push(StoredContent {
                    title: record.headline.clone(),
                    description: record.description_markdown.clone(),
                    published_date: record.published_date.clone(),
                    link: record.url.clone(),
                    source: record.source_name.clone(),
                    products: BTreeSet::new(),
                });
                inner.contents.len() - 1
            }
        };

        if record.has_product() {
            inner.products.insert(record.product.clone());
            inner.contents[index].products.insert(record.product.clone());
        }
        if record.has_product_target() {
            inner.targets.insert(record.target.clone());
            inner
                .product_targets
                .insert((record.product.clone(), record.target.clone()));
        }
        Ok(())
    }

    async fn schema(&self) -> Result<GraphSchema, GraphReadError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_reads {
            return Err(GraphReadError::Schema("injected read failure".to_string()));
        }
        let mut schema = GraphSchema::default();
        let string = |name: &str| Some(PropertyInfo::new(name, "STRING"));
        if !inner.sources.is_empty() {
            schema.add_node_property("WebSource", string("id"));
            schema.add_node_property("WebSource", string("description"));
        }
        if !inner.contents.is_empty() {
            for name in ["id", "title", "description", "published_date", "link"] {
                schema.add_node_property("Content", string(name));
            }
            schema.add_node_property("Content", Some(PropertyInfo::new("ingested_at", "DATE_TIME")));
            schema.add_pattern("WebSource", "PUBLISHED", "Content");
        }
        if !inner.products.is_empty() {
            schema.add_node_property("Product", string("name"));
            schema.add_pattern("Content", "HAS", "Product");
        }
        if !inner.targets.is_empty() {
            schema.add_node_property("Target", string("name"));
            schema.add_pattern("Product", "FOR", "Target");
        }
        Ok(schema)
    }

    async fn read_query(
        &self,
        cypher: &str,
        row_cap: usize,
    ) -> Result<Vec<QueryRow>, GraphReadError> {
        let mut inner = self.inner.lock().unwrap();
        inner.queries_seen.push(cypher.to_string());
        if inner.fail_reads {
            return Err(GraphReadError::Query("injected read failure".to_string()));
        }
        let rows = inner
            .query_results
            .get(cypher.trim())
            .cloned()
            .unwrap_or_default();
        Ok(rows.into_iter().take(row_cap).collect())
    }
}
