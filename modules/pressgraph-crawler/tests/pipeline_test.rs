use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use pressgraph_common::{CrawlSettings, CrawlTarget, FetchError, RateLimitSettings, SourceType};
use pressgraph_crawler::discovery::{discover_links, SeedOutcome};
use pressgraph_crawler::testing::{FixedMemoryGauge, MockExtractor, MockFetcher};
use pressgraph_crawler::{
    ArticleLog, ArticleOutcome, CrawlPipeline, Dispatcher, MemoryGauge, RenderOptions,
};

fn settings() -> CrawlSettings {
    CrawlSettings {
        check_interval: Duration::from_millis(5),
        render_delay: Duration::ZERO,
        html_rate_limit: None,
        rss_rate_limit: None,
        ..CrawlSettings::default()
    }
}

fn dispatcher(max_in_flight: usize) -> Dispatcher {
    Dispatcher::new(max_in_flight, &settings()).with_gauge(Arc::new(FixedMemoryGauge(10.0)))
}

fn list_page(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|href| format!("<li><a href=\"{href}\">story</a></li>"))
        .collect();
    format!("<html><body><nav><a href=\"/about\">About</a></nav><ul class=\"news\">{items}</ul></body></html>")
}

fn html_target(url: &str) -> CrawlTarget {
    CrawlTarget {
        source_id: 54,
        url: url.to_string(),
        source_type: SourceType::Html,
        selectors: vec![".news".to_string()],
        name: "THERALASE PRESS RELEASE".to_string(),
        description: "Company press releases".to_string(),
    }
}

fn pipeline(fetcher: MockFetcher, extractor: MockExtractor, log: Arc<ArticleLog>) -> CrawlPipeline {
    CrawlPipeline::new(Arc::new(fetcher), Arc::new(extractor), log, settings())
        .with_gauge(Arc::new(FixedMemoryGauge(10.0)))
}

// --- Link discovery ---

#[tokio::test]
async fn one_failing_seed_does_not_block_the_others() {
    let seeds: Vec<String> = (1..=5).map(|i| format!("https://s{i}.example/news")).collect();
    let mut fetcher = MockFetcher::new();
    for (i, seed) in seeds.iter().enumerate().skip(1) {
        fetcher = fetcher.on_html(seed, &list_page(&[&format!("/article-{i}")]));
    }

    let mut visited = HashSet::new();
    let discovery = discover_links(
        &fetcher,
        &dispatcher(2),
        &seeds,
        &[".news".to_string()],
        &RenderOptions::seed(&[".news".to_string()], Duration::from_secs(5)),
        &mut visited,
    )
    .await;

    assert_eq!(discovery.candidates.len(), 4);
    let failed: Vec<_> = discovery
        .seeds
        .iter()
        .filter(|(_, o)| matches!(o, SeedOutcome::Failed(_)))
        .map(|(s, _)| s.as_str())
        .collect();
    assert_eq!(failed, vec!["https://s1.example/news"]);
}

#[tokio::test]
async fn unmatched_seed_is_reported_and_run_continues() {
    let fetcher = MockFetcher::new()
        .on_html("https://a.example/", "<html><body><p>redesign</p></body></html>")
        .on_html("https://b.example/", &list_page(&["/news/1"]));

    let mut visited = HashSet::new();
    let discovery = discover_links(
        &fetcher,
        &dispatcher(2),
        &["https://a.example/".to_string(), "https://b.example/".to_string()],
        &[".news".to_string()],
        &RenderOptions::seed(&[], Duration::from_secs(5)),
        &mut visited,
    )
    .await;

    assert!(discovery
        .seeds
        .contains(&("https://a.example/".to_string(), SeedOutcome::NoSelectorMatch)));
    assert_eq!(discovery.candidates.len(), 1);
}

#[tokio::test]
async fn visited_links_and_noise_are_excluded() {
    let fetcher = MockFetcher::new().on_html(
        "https://x.com/news",
        &list_page(&[
            "https://x.com/news/article-42#top",
            "https://x.com/news/page/2/?ref=1",
            "/files/annual.PDF",
            "https://x.com/news/seen",
            "javascript:void(0)",
        ]),
    );

    let mut visited: HashSet<String> = ["https://x.com/news/seen".to_string()].into();
    let discovery = discover_links(
        &fetcher,
        &dispatcher(1),
        &["https://x.com/news#latest".to_string()],
        &[".news".to_string()],
        &RenderOptions::seed(&[], Duration::from_secs(5)),
        &mut visited,
    )
    .await;

    let urls: Vec<&str> = discovery.candidates.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, vec!["https://x.com/news/article-42"]);
    assert!(visited.contains("https://x.com/news"));
}

// --- Dispatcher ---

#[tokio::test]
async fn memory_pressure_never_stalls_an_idle_dispatcher() {
    let fetcher = MockFetcher::new()
        .on_html("https://x.com/1", "<p>1</p>")
        .on_html("https://x.com/2", "<p>2</p>");
    let gauge: Arc<dyn MemoryGauge> = Arc::new(FixedMemoryGauge(99.0));
    let dispatcher = Dispatcher::new(1, &settings()).with_gauge(gauge);

    let results = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.fetch_all(
            &fetcher,
            vec!["https://x.com/1".into(), "https://x.com/2".into()],
            &RenderOptions::feed_article(Duration::from_secs(5)),
        ),
    )
    .await
    .expect("dispatcher stalled");
    assert!(results.iter().all(|(_, r)| r.is_ok()));
}

#[tokio::test]
async fn hung_fetch_times_out_without_holding_the_phase() {
    let fetcher = MockFetcher::new()
        .hanging("https://x.com/stuck")
        .on_html("https://x.com/1", "<p>1</p>")
        .on_html("https://x.com/2", "<p>2</p>");
    let options = RenderOptions::feed_article(Duration::from_millis(50));

    let results = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher(2).fetch_all(
            &fetcher,
            vec![
                "https://x.com/stuck".into(),
                "https://x.com/1".into(),
                "https://x.com/2".into(),
            ],
            &options,
        ),
    )
    .await
    .expect("phase never finished");

    assert_eq!(results.len(), 3);
    for (url, result) in &results {
        if url == "https://x.com/stuck" {
            assert!(matches!(result, Err(FetchError::Timeout { .. })), "{result:?}");
        } else {
            assert!(result.is_ok(), "{url}");
        }
    }
}

#[tokio::test]
async fn rate_limited_fetches_are_retried() {
    let fetcher = MockFetcher::new()
        .on_html("https://x.com/flaky", "<p>ok</p>")
        .flaky("https://x.com/flaky", 2);
    let dispatcher = dispatcher(1).with_rate_limit(Some(RateLimitSettings {
        base_delay: (Duration::from_millis(1), Duration::from_millis(2)),
        max_delay: Duration::from_millis(5),
        max_retries: 2,
    }));

    let results = dispatcher
        .fetch_all(
            &fetcher,
            vec!["https://x.com/flaky".into()],
            &RenderOptions::feed_article(Duration::from_secs(5)),
        )
        .await;
    assert!(results[0].1.is_ok());
    assert_eq!(fetcher.fetch_count("https://x.com/flaky"), 3);
}

#[tokio::test]
async fn without_rate_limit_failures_are_not_retried() {
    let fetcher = MockFetcher::new()
        .on_html("https://x.com/flaky", "<p>ok</p>")
        .flaky("https://x.com/flaky", 1);

    let results = dispatcher(1)
        .fetch_all(
            &fetcher,
            vec!["https://x.com/flaky".into()],
            &RenderOptions::feed_article(Duration::from_secs(5)),
        )
        .await;
    assert!(results[0].1.is_err());
    assert_eq!(fetcher.fetch_count("https://x.com/flaky"), 1);
}

// --- Full pipeline ---

#[tokio::test]
async fn html_target_extracts_best_candidate_into_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ArticleLog::new(dir.path().join("articles.jsonl")));

    let fetcher = MockFetcher::new()
        .on_html("https://theralase.example/press", &list_page(&["/a", "/b", "/c", "/d"]))
        .on_page("https://theralase.example/a", "<p>a</p>", "# TLD-1433 trial")
        .on_page("https://theralase.example/b", "<p>b</p>", "# Quarterly results")
        .on_page("https://theralase.example/c", "<p>c</p>", "# Broken");
    let extractor = MockExtractor::new()
        .on_json(
            "https://theralase.example/a",
            json!([
                {"headline": "", "summary": "", "published_date": "2024-01-01", "product": "", "target": ""},
                {"headline": "TLD-1433 Phase II update", "summary": "a".repeat(40),
                 "published_date": "", "product": "TLD-1433", "target": "Ruthenium-based photosensitizer"}
            ]),
        )
        .on_json("https://theralase.example/c", json!([42]));

    let report = pipeline(fetcher, extractor, log.clone())
        .crawl(&[html_target("https://theralase.example/press")])
        .await;

    let target = &report.targets[0];
    assert_eq!(target.candidates, 4);
    assert_eq!(report.extracted(), 1);

    let outcome = |url: &str| {
        &target
            .articles
            .iter()
            .find(|a| a.url == url)
            .expect("article reported")
            .outcome
    };
    assert!(matches!(outcome("https://theralase.example/a"), ArticleOutcome::Extracted));
    assert!(matches!(outcome("https://theralase.example/b"), ArticleOutcome::Empty));
    assert!(matches!(outcome("https://theralase.example/c"), ArticleOutcome::Shape(_)));
    assert!(matches!(outcome("https://theralase.example/d"), ArticleOutcome::FetchFailed(_)));

    let records = log.read_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].product, "TLD-1433");
    assert_eq!(records[0].url, "https://theralase.example/a");
    assert_eq!(records[0].description_markdown, "# TLD-1433 trial");
    assert_eq!(records[0].source_name, "THERALASE PRESS RELEASE");
    assert_eq!(records[0].source_description, "Company press releases");

    let rendered = report.to_string();
    assert!(rendered.contains("Successfully extracted content from 1 of 4 articles"));
}

#[tokio::test]
async fn articles_render_with_settle_options() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ArticleLog::new(dir.path().join("articles.jsonl")));
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_html("https://x.com/", &list_page(&["/a"]))
            .on_page("https://x.com/a", "<p>a</p>", "body"),
    );

    let mut settings = settings();
    settings.render_delay = Duration::from_secs(5);
    let pipeline = CrawlPipeline::new(fetcher.clone(), Arc::new(MockExtractor::new()), log, settings)
        .with_gauge(Arc::new(FixedMemoryGauge(0.0)));
    pipeline.crawl(&[html_target("https://x.com/")]).await;

    let seed = fetcher.options_for("https://x.com/").unwrap();
    assert_eq!(seed.wait_for_selectors, vec![".news"]);
    assert!(seed.excluded_tags.contains(&".cookie-banner".to_string()));

    let article = fetcher.options_for("https://x.com/a").unwrap();
    assert!(article.scan_full_page && article.remove_overlays);
    assert_eq!(article.delay_before_capture, Duration::from_secs(5));
    assert_eq!(article.timeout, Duration::from_secs(35));
}

#[tokio::test]
async fn articles_are_not_revisited_across_targets() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ArticleLog::new(dir.path().join("articles.jsonl")));
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_html("https://x.com/one", &list_page(&["https://x.com/shared"]))
            .on_html("https://x.com/two", &list_page(&["https://x.com/shared"]))
            .on_page("https://x.com/shared", "<p>s</p>", "shared"),
    );
    let extractor = MockExtractor::new().on_json("https://x.com/shared", json!({"headline": "Shared"}));

    let pipeline = CrawlPipeline::new(fetcher.clone(), Arc::new(extractor), log.clone(), settings())
        .with_gauge(Arc::new(FixedMemoryGauge(0.0)));
    let report = pipeline
        .crawl(&[html_target("https://x.com/one"), html_target("https://x.com/two")])
        .await;

    assert_eq!(fetcher.fetch_count("https://x.com/shared"), 1);
    assert_eq!(report.extracted(), 1);
    assert_eq!(report.targets[1].candidates, 0);
}

#[tokio::test]
async fn rss_target_fetches_every_feed_link() {
    let feed = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>News</title>
        <item><title>1</title><link>https://news.example/1</link></item>
        <item><title>2</title><link>https://news.example/2</link></item>
        <item><title>orphan</title></item>
        <item><title>3</title><link>https://news.example/3</link></item>
        </channel></rss>"#;
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ArticleLog::new(dir.path().join("articles.jsonl")));

    let mut fetcher = MockFetcher::new().on_feed("https://news.example/feed.xml", feed);
    let mut extractor = MockExtractor::new();
    for i in 1..=3 {
        let url = format!("https://news.example/{i}");
        fetcher = fetcher.on_page(&url, "<p/>", "article");
        extractor = extractor.on_json(&url, json!({"headline": format!("Story {i}"), "product": "Keytruda"}));
    }

    let target = CrawlTarget {
        source_id: 53,
        url: "https://news.example/feed.xml".into(),
        source_type: SourceType::Rss,
        selectors: Vec::new(),
        name: "Bladder News".into(),
        description: String::new(),
    };
    let report = pipeline(fetcher, extractor, log.clone()).crawl(&[target]).await;

    assert_eq!(report.targets[0].candidates, 3);
    assert_eq!(report.extracted(), 3);
    assert_eq!(log.read_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn unreachable_feed_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ArticleLog::new(dir.path().join("articles.jsonl")));
    let target = CrawlTarget {
        source_id: 1,
        url: "https://gone.example/feed".into(),
        source_type: SourceType::Rss,
        selectors: Vec::new(),
        name: "Gone".into(),
        description: String::new(),
    };

    let report = pipeline(MockFetcher::new(), MockExtractor::new(), log)
        .crawl(&[target])
        .await;
    assert!(report.targets[0].feed_error.is_some());
    assert_eq!(report.extracted(), 0);
}

#[tokio::test]
async fn extractor_failure_is_isolated_to_its_page() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(ArticleLog::new(dir.path().join("articles.jsonl")));
    let fetcher = MockFetcher::new()
        .on_html("https://x.com/", &list_page(&["/a", "/b"]))
        .on_page("https://x.com/a", "<p/>", "a")
        .on_page("https://x.com/b", "<p/>", "b");
    let extractor = MockExtractor::new()
        .failing("https://x.com/a", "model overloaded")
        .on_json("https://x.com/b", json!({"headline": "B"}));

    let report = pipeline(fetcher, extractor, log).crawl(&[html_target("https://x.com/")]).await;
    let articles = &report.targets[0].articles;
    assert!(articles
        .iter()
        .any(|a| a.url == "https://x.com/a" && matches!(a.outcome, ArticleOutcome::ExtractionFailed(_))));
    assert_eq!(report.extracted(), 1);
}
