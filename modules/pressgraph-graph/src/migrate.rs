use neo4rs::query;
use tracing::{info, warn};

use crate::GraphClient;

/// Idempotent schema setup: natural-key uniqueness for the merged labels,
/// plus lookup indexes for Content.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    let constraints = [
        "CREATE CONSTRAINT web_source_id IF NOT EXISTS FOR (w:WebSource) REQUIRE w.id IS UNIQUE",
        "CREATE CONSTRAINT product_name IF NOT EXISTS FOR (p:Product) REQUIRE p.name IS UNIQUE",
        "CREATE CONSTRAINT target_name IF NOT EXISTS FOR (t:Target) REQUIRE t.name IS UNIQUE",
        "CREATE CONSTRAINT content_id IF NOT EXISTS FOR (c:Content) REQUIRE c.id IS UNIQUE",
    ];
    for c in &constraints {
        run_ignoring_exists(g, c).await?;
    }
    info!("Natural-key constraints ensured");

    let indexes = ["CREATE INDEX content_link IF NOT EXISTS FOR (c:Content) ON (c.link)"];
    for i in &indexes {
        run_ignoring_exists(g, i).await?;
    }
    info!("Indexes ensured");

    Ok(())
}

/// Older servers reject `IF NOT EXISTS` on equivalent schema under a
/// different name; those errors are harmless.
async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("already exists") || msg.contains("EquivalentSchemaRule") {
                warn!(cypher, "Schema rule already present, skipping");
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
