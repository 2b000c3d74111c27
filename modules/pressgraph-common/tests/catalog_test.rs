use std::io::Write;

use pressgraph_common::{Catalog, JsonCatalog, PressgraphError, SourceType};

const CATALOG: &str = r#"[
    {"sourceId": 54, "url": "https://theralase.example/press", "sourceType": "HTML",
     "selectors": ".news-list", "name": "THERALASE PRESS RELEASE", "description": "Company press"},
    {"sourceId": 53, "url": "https://news.example/feed.xml", "sourceType": "RSS",
     "name": "Bladder News", "description": "Feed"},
    {"sourceId": 7, "url": "https://other.example", "sourceType": "HTML",
     "selectors": ["main .posts"], "name": "Other"}
]"#;

fn write_catalog() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(CATALOG.as_bytes()).expect("write catalog");
    file
}

#[tokio::test]
async fn loads_targets_in_catalog_order() {
    let file = write_catalog();
    let targets = JsonCatalog::new(file.path()).targets().await.unwrap();

    let ids: Vec<i64> = targets.iter().map(|t| t.source_id).collect();
    assert_eq!(ids, vec![54, 53, 7]);
    assert_eq!(targets[1].source_type, SourceType::Rss);
    assert!(targets[1].selectors.is_empty());
}

#[tokio::test]
async fn filters_by_source_id() {
    let file = write_catalog();
    let targets = JsonCatalog::new(file.path())
        .only([53, 54])
        .targets()
        .await
        .unwrap();

    let ids: Vec<i64> = targets.iter().map(|t| t.source_id).collect();
    assert_eq!(ids, vec![54, 53]);
}

#[tokio::test]
async fn missing_file_is_catalog_error() {
    let err = JsonCatalog::new("/nonexistent/catalog.json")
        .targets()
        .await
        .unwrap_err();
    assert!(matches!(err, PressgraphError::Catalog(_)));
}
