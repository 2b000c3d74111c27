use chrono::SecondsFormat;
use neo4rs::{query, Query};
use tracing::{debug, warn};
use uuid::Uuid;

use pressgraph_common::{ArticleRecord, ContentPolicy};

use crate::{GraphClient, GraphWriteError};

/// Write-side wrapper for the graph. Used by ingestion only.
#[derive(Clone)]
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Upsert one article inside a single transaction: WebSource by id,
    /// Content plus PUBLISHED, then Product/Target with HAS/FOR when present.
    pub async fn upsert_article(
        &self,
        record: &ArticleRecord,
        policy: ContentPolicy,
    ) -> Result<(), GraphWriteError> {
        let content_id = Uuid::new_v4().to_string();
        let queries = article_queries(record, policy, &content_id);
        let fail = |e: neo4rs::Error| GraphWriteError {
            url: record.url.clone(),
            message: e.to_string(),
        };

        let mut txn = self.client.graph.start_txn().await.map_err(fail)?;
        if let Err(e) = txn.run_queries(queries).await {
            if let Err(rollback) = txn.rollback().await {
                warn!(url = record.url.as_str(), error = %rollback, "Rollback failed");
            }
            return Err(fail(e));
        }
        txn.commit().await.map_err(fail)?;

        debug!(
            url = record.url.as_str(),
            source = record.source_name.as_str(),
            product = record.product.as_str(),
            "Article upserted"
        );
        Ok(())
    }
}

/// The statements for one record, in execution order.
pub(crate) fn article_queries(
    record: &ArticleRecord,
    policy: ContentPolicy,
    content_id: &str,
) -> Vec<Query> {
    let mut queries = vec![
        query(
            "MERGE (w:WebSource {id: $source_name})
             ON CREATE SET w.description = $source_description",
        )
        .param("source_name", record.source_name.as_str())
        .param("source_description", record.source_description.as_str()),
    ];

    let content = match policy {
        ContentPolicy::AlwaysCreate => query(
            "MATCH (w:WebSource {id: $source_name})
             CREATE (c:Content {
                id: $content_id,
                title: $title,
                description: $description,
                published_date: $published_date,
                ingested_at: datetime($captured_at),
                link: $link
             })
             CREATE (w)-[:PUBLISHED]->(c)",
        ),
        // An existing Content keeps its one publisher; a repeat from another
        // source adds no PUBLISHED edge.
        ContentPolicy::MergeByLink => query(
            "MATCH (w:WebSource {id: $source_name})
             WHERE NOT EXISTS { MATCH (:Content {link: $link}) }
             CREATE (c:Content {
                id: $content_id,
                title: $title,
                description: $description,
                published_date: $published_date,
                ingested_at: datetime($captured_at),
                link: $link
             })
             CREATE (w)-[:PUBLISHED]->(c)",
        ),
    };
    queries.push(
        content
            .param("source_name", record.source_name.as_str())
            .param("content_id", content_id)
            .param("title", record.headline.as_str())
            .param("description", record.description_markdown.as_str())
            .param("published_date", record.published_date.as_str())
            .param(
                "captured_at",
                record
                    .captured_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .param("link", record.url.as_str()),
    );

    if record.has_product() {
        let has = match policy {
            ContentPolicy::AlwaysCreate => query(
                "MATCH (c:Content {id: $content_id})
                 MERGE (p:Product {name: $product})
                 MERGE (c)-[:HAS]->(p)",
            ),
            ContentPolicy::MergeByLink => query(
                "MATCH (c:Content {link: $link})
                 MERGE (p:Product {name: $product})
                 MERGE (c)-[:HAS]->(p)",
            ),
        };
        queries.push(
            has.param("content_id", content_id)
                .param("link", record.url.as_str())
                .param("product", record.product.as_str()),
        );
    }

    if record.has_product_target() {
        queries.push(
            query(
                "MERGE (p:Product {name: $product})
                 MERGE (t:Target {name: $target})
                 MERGE (p)-[:FOR]->(t)",
            )
            .param("product", record.product.as_str())
            .param("target", record.target.as_str()),
        );
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(product: &str, target: &str) -> ArticleRecord {
        ArticleRecord {
            captured_at: Utc::now(),
            url: "https://x.com/a".into(),
            published_date: "1 May 2024".into(),
            headline: "Trial update".into(),
            product: product.into(),
            target: target.into(),
            description_markdown: "# Trial update".into(),
            source_name: "X".into(),
            source_description: "X press".into(),
        }
    }

    #[test]
    fn product_and_target_add_has_and_for() {
        let qs = article_queries(&record("Keytruda", "Anti-PD-1 mAb"), ContentPolicy::AlwaysCreate, "id");
        assert_eq!(qs.len(), 4);
    }

    #[test]
    fn product_only_skips_for() {
        let qs = article_queries(&record("Keytruda", ""), ContentPolicy::AlwaysCreate, "id");
        assert_eq!(qs.len(), 3);
    }

    #[test]
    fn target_without_product_writes_nothing_extra() {
        let qs = article_queries(&record("", "Anti-PD-1 mAb"), ContentPolicy::MergeByLink, "id");
        assert_eq!(qs.len(), 2);
    }
}
