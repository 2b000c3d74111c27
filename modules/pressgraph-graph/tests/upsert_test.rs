//! Integration tests for article upserts and read-only querying.
//!
//! Requirements: Docker (for Neo4j via testcontainers)
//!
//! Run with: cargo test -p pressgraph-graph --features test-utils --test upsert_test

#![cfg(feature = "test-utils")]

use chrono::Utc;

use pressgraph_common::{ArticleRecord, ContentPolicy};
use pressgraph_graph::{query, GraphClient, GraphStore, Neo4jStore};

async fn setup() -> (impl std::any::Any, GraphClient) {
    let (container, client) = pressgraph_graph::testutil::neo4j_container().await;
    pressgraph_graph::migrate::migrate(&client)
        .await
        .expect("migration failed");
    (container, client)
}

async fn count(client: &GraphClient, cypher: &str) -> i64 {
    let mut stream = client.inner().execute(query(cypher)).await.unwrap();
    let row = stream.next().await.unwrap().expect("count row");
    row.get::<i64>("val").unwrap()
}

fn keytruda(url: &str) -> ArticleRecord {
    ArticleRecord {
        captured_at: Utc::now(),
        url: url.into(),
        published_date: "12 March 2024".into(),
        headline: "Keytruda approved for new indication".into(),
        product: "Keytruda".into(),
        target: "Anti-PD-1 mAb".into(),
        description_markdown: "# Keytruda approved".into(),
        source_name: "Merck".into(),
        source_description: "Merck press releases".into(),
    }
}

#[tokio::test]
async fn product_and_target_create_full_path() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());

    store
        .upsert_article(&keytruda("https://merck.com/news/1"), ContentPolicy::AlwaysCreate)
        .await
        .unwrap();

    let path = count(
        &client,
        "MATCH (:WebSource {id: 'Merck'})-[:PUBLISHED]->(c:Content)-[:HAS]->(:Product {name: 'Keytruda'})-[:FOR]->(:Target {name: 'Anti-PD-1 mAb'})
         RETURN count(c) AS val",
    )
    .await;
    assert_eq!(path, 1);
}

#[tokio::test]
async fn ingested_target_is_answerable_by_read_query() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client);
    store
        .upsert_article(&keytruda("https://merck.com/news/1"), ContentPolicy::AlwaysCreate)
        .await
        .unwrap();

    let rows = store
        .read_query(
            r#"MATCH (p:Product{name:"Keytruda"})-[:FOR]->(t:Target) RETURN t.name"#,
            10,
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["t.name"], "Anti-PD-1 mAb");
}

#[tokio::test]
async fn repeated_ingest_merges_keyed_nodes_only() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());
    let record = keytruda("https://merck.com/news/1");

    for _ in 0..2 {
        store
            .upsert_article(&record, ContentPolicy::AlwaysCreate)
            .await
            .unwrap();
    }

    assert_eq!(count(&client, "MATCH (w:WebSource) RETURN count(w) AS val").await, 1);
    assert_eq!(count(&client, "MATCH (p:Product) RETURN count(p) AS val").await, 1);
    assert_eq!(count(&client, "MATCH (t:Target) RETURN count(t) AS val").await, 1);
    assert_eq!(count(&client, "MATCH (c:Content) RETURN count(c) AS val").await, 2);
    assert_eq!(count(&client, "MATCH ()-[r:PUBLISHED]->() RETURN count(r) AS val").await, 2);
    assert_eq!(count(&client, "MATCH ()-[r:HAS]->() RETURN count(r) AS val").await, 2);
    assert_eq!(count(&client, "MATCH ()-[r:FOR]->() RETURN count(r) AS val").await, 1);
}

#[tokio::test]
async fn merge_by_link_keeps_one_content() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());
    let record = keytruda("https://merck.com/news/1");

    for _ in 0..2 {
        store
            .upsert_article(&record, ContentPolicy::MergeByLink)
            .await
            .unwrap();
    }

    assert_eq!(count(&client, "MATCH (c:Content) RETURN count(c) AS val").await, 1);
    assert_eq!(count(&client, "MATCH ()-[r:HAS]->() RETURN count(r) AS val").await, 1);
}

#[tokio::test]
async fn merge_by_link_keeps_first_publisher_only() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());
    let first = keytruda("https://merck.com/news/1");
    let mut syndicated = first.clone();
    syndicated.source_name = "Bladder News".into();

    for record in [&first, &syndicated] {
        store
            .upsert_article(record, ContentPolicy::MergeByLink)
            .await
            .unwrap();
    }

    assert_eq!(count(&client, "MATCH (w:WebSource) RETURN count(w) AS val").await, 2);
    assert_eq!(count(&client, "MATCH (c:Content) RETURN count(c) AS val").await, 1);
    assert_eq!(count(&client, "MATCH ()-[r:PUBLISHED]->() RETURN count(r) AS val").await, 1);
    assert_eq!(
        count(
            &client,
            "MATCH (:WebSource {id: 'Merck'})-[r:PUBLISHED]->(:Content) RETURN count(r) AS val",
        )
        .await,
        1
    );
}

#[tokio::test]
async fn source_description_is_kept_from_first_write() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());

    let mut second = keytruda("https://merck.com/news/2");
    second.source_description = "changed".into();
    store
        .upsert_article(&keytruda("https://merck.com/news/1"), ContentPolicy::AlwaysCreate)
        .await
        .unwrap();
    store
        .upsert_article(&second, ContentPolicy::AlwaysCreate)
        .await
        .unwrap();

    let rows = store
        .read_query("MATCH (w:WebSource) RETURN w.description AS description", 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["description"], "Merck press releases");
}

#[tokio::test]
async fn read_query_cannot_persist_writes() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());

    let _ = store
        .read_query("CREATE (p:Product {name: 'Smuggled'}) RETURN p.name AS name", 10)
        .await;

    assert_eq!(count(&client, "MATCH (p:Product) RETURN count(p) AS val").await, 0);
}

#[tokio::test]
async fn schema_reflects_written_labels() {
    let (_container, client) = setup().await;
    let store = Neo4jStore::new(client.clone());
    store
        .upsert_article(&keytruda("https://merck.com/news/1"), ContentPolicy::AlwaysCreate)
        .await
        .unwrap();

    let schema = store.schema().await.unwrap();
    assert!(schema.nodes.contains_key("Content"));
    assert!(schema.nodes.contains_key("Target"));
    let rendered = schema.to_string();
    assert!(rendered.contains("(:Content)-[:HAS]->(:Product)"));
    assert!(rendered.contains("(:Product)-[:FOR]->(:Target)"));
}
