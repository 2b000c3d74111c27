use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use pressgraph_common::{Catalog, Config, JsonCatalog};
use pressgraph_crawler::{ArticleLog, BrowserlessFetcher, CrawlPipeline, Ingestor, LlmExtractor};
use pressgraph_graph::{migrate::migrate, GraphClient, GraphStore, Neo4jStore};
use pressgraph_rag::QueryResponder;

#[derive(Parser)]
#[command(name = "pressgraph")]
#[command(about = "Crawl press sources into a Neo4j graph and ask questions about it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl catalog targets and append extracted articles to the log
    Crawl {
        /// Only crawl these catalog source ids
        #[arg(long = "source-id")]
        source_ids: Vec<i64>,
    },

    /// Load the article log into the graph
    Ingest,

    /// Answer a question, or open a prompt when none is given
    Ask { question: Option<String> },

    /// Crawl, ingest, then open the question prompt
    Run {
        #[arg(long = "source-id")]
        source_ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_redacted();

    match cli.command {
        Commands::Crawl { source_ids } => crawl(&config, source_ids).await?,
        Commands::Ingest => ingest(&config).await?,
        Commands::Ask { question } => ask(&config, question).await?,
        Commands::Run { source_ids } => {
            crawl(&config, source_ids).await?;
            ingest(&config).await?;
            ask(&config, None).await?;
        }
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("pressgraph=info".parse()?);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn llm(config: &Config, model: &str) -> Result<OpenAi> {
    let ai = OpenAi::new(&config.llm_api_key, model)
        .with_timeout(config.llm_timeout)
        .context("Failed to set up the LLM client")?;
    Ok(match &config.llm_base_url {
        Some(url) => ai.with_base_url(url),
        None => ai,
    })
}

async fn connect(config: &Config) -> Result<GraphClient> {
    let neo4j = config.neo4j()?;
    let client = GraphClient::connect(neo4j.uri, neo4j.user, neo4j.password)
        .await
        .context("Failed to connect to Neo4j")?;
    client.ping().await.context("Neo4j is not answering")?;
    Ok(client)
}

async fn crawl(config: &Config, source_ids: Vec<i64>) -> Result<()> {
    let catalog = JsonCatalog::new(&config.catalog_path).only(source_ids);
    let targets = catalog.targets().await?;

    let fetcher = BrowserlessFetcher::new(&config.browserless_url, config.browserless_token.as_deref())
        .context("Failed to set up the render service client")?;
    fetcher
        .check()
        .await
        .context("Render service is not reachable")?;
    let extractor = LlmExtractor::new(llm(config, &config.extraction_model)?);
    let log = ArticleLog::new(&config.article_log_path);

    let pipeline = CrawlPipeline::new(
        Arc::new(fetcher),
        Arc::new(extractor),
        Arc::new(log),
        config.crawl.clone(),
    );
    let report = pipeline.crawl(&targets).await;
    println!("{report}");
    Ok(())
}

async fn ingest(config: &Config) -> Result<()> {
    let log = ArticleLog::new(&config.article_log_path);
    let client = connect(config).await?;
    migrate(&client).await.context("Schema migration failed")?;

    let store: Arc<dyn GraphStore> = Arc::new(Neo4jStore::new(client));
    let report = Ingestor::new(store, config.content_policy)
        .ingest_log(&log)
        .await?;
    println!("{report}");
    Ok(())
}

async fn ask(config: &Config, question: Option<String>) -> Result<()> {
    let client = connect(config).await?;
    let store: Arc<dyn GraphStore> = Arc::new(Neo4jStore::new(client));
    let model = Arc::new(llm(config, &config.query_model)?);
    let responder = QueryResponder::new(store, model.clone(), model);

    if let Some(question) = question {
        println!("{}", responder.ask(&question).await.text);
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!("Ask question: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        let answer = responder.ask(question).await;
        println!("Answer: {}", answer.text);
    }
    Ok(())
}
