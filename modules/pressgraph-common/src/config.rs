use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// How ingestion treats a Content node whose link is already in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentPolicy {
    /// Every ingested record creates a new Content node.
    #[default]
    AlwaysCreate,
    /// Reuse the Content node with the same link, if any.
    MergeByLink,
}

impl FromStr for ContentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always-create" | "always_create" | "create" => Ok(ContentPolicy::AlwaysCreate),
            "merge-by-link" | "merge_by_link" | "merge" => Ok(ContentPolicy::MergeByLink),
            other => Err(format!("expected always-create or merge-by-link, got {other}")),
        }
    }
}

/// Randomised politeness delay with bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSettings {
    /// Delay before each request is drawn uniformly from this range.
    pub base_delay: (Duration, Duration),
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            base_delay: (Duration::from_secs(8), Duration::from_secs(10)),
            max_delay: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

/// Fetch tuning for both crawl phases.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    pub seed_max_in_flight: usize,
    pub article_max_in_flight: usize,
    pub check_interval: Duration,
    pub memory_threshold_percent: f64,
    /// Settle delay before capturing a rendered article page.
    pub render_delay: Duration,
    pub html_rate_limit: Option<RateLimitSettings>,
    pub rss_rate_limit: Option<RateLimitSettings>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            seed_max_in_flight: 2,
            article_max_in_flight: 10,
            check_interval: Duration::from_secs(1),
            memory_threshold_percent: 90.0,
            render_delay: Duration::from_secs(5),
            html_rate_limit: None,
            rss_rate_limit: Some(RateLimitSettings::default()),
        }
    }
}

impl CrawlSettings {
    /// Per-request ceiling: the settle delay plus a fixed navigation budget.
    pub fn request_timeout(&self) -> Duration {
        self.render_delay.saturating_add(Duration::from_secs(30))
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j (only needed by commands that touch the graph)
    pub neo4j_uri: Option<String>,
    pub neo4j_user: Option<String>,
    pub neo4j_password: Option<String>,

    // LLM (OpenAI-compatible endpoint)
    pub llm_api_key: String,
    pub llm_base_url: Option<String>,
    pub extraction_model: String,
    pub query_model: String,
    /// Ceiling for one LLM request.
    pub llm_timeout: Duration,

    // Rendering
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    // Files
    pub article_log_path: PathBuf,
    pub catalog_path: PathBuf,

    pub content_policy: ContentPolicy,
    pub crawl: CrawlSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` is this over the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut crawl = CrawlSettings::default();
        if let Some(n) = parse_opt::<usize>(&get, "CRAWL_MAX_IN_FLIGHT")? {
            crawl.article_max_in_flight = n.max(1);
        }
        if let Some(n) = parse_opt::<usize>(&get, "CRAWL_SEED_MAX_IN_FLIGHT")? {
            crawl.seed_max_in_flight = n.max(1);
        }
        if let Some(pct) = parse_opt::<f64>(&get, "CRAWL_MEMORY_THRESHOLD")? {
            crawl.memory_threshold_percent = pct;
        }
        if let Some(delay) = parse_secs(&get, "CRAWL_RENDER_DELAY_SECS")? {
            crawl.render_delay = delay;
        }
        match parse_opt::<u8>(&get, "CRAWL_RATE_LIMIT")? {
            Some(0) => {
                crawl.html_rate_limit = None;
                crawl.rss_rate_limit = None;
            }
            Some(_) => crawl.html_rate_limit = Some(RateLimitSettings::default()),
            None => {}
        }

        Ok(Self {
            neo4j_uri: get("NEO4J_URI"),
            neo4j_user: get("NEO4J_USER"),
            neo4j_password: get("NEO4J_PASSWORD"),
            llm_api_key: required("LLM_API_KEY")?,
            llm_base_url: get("LLM_BASE_URL"),
            extraction_model: get("EXTRACTION_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            query_model: get("QUERY_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            llm_timeout: parse_secs(&get, "LLM_TIMEOUT_SECS")?
                .unwrap_or(Duration::from_secs(120)),
            browserless_url: get("BROWSERLESS_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            browserless_token: get("BROWSERLESS_TOKEN"),
            article_log_path: get("ARTICLE_LOG_PATH")
                .unwrap_or_else(|| "extracted_articles.jsonl".to_string())
                .into(),
            catalog_path: get("CATALOG_PATH")
                .unwrap_or_else(|| "catalog.json".to_string())
                .into(),
            content_policy: parse_opt(&get, "CONTENT_POLICY")?.unwrap_or_default(),
            crawl,
        })
    }

    /// Log config values with secrets truncated.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(4).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri.as_deref().unwrap_or("<unset>"));
        tracing::info!("  NEO4J_USER: {}", self.neo4j_user.as_deref().unwrap_or("<unset>"));
        tracing::info!("  LLM_API_KEY: {}", preview(&self.llm_api_key));
        tracing::info!(
            "  LLM_BASE_URL: {}",
            self.llm_base_url.as_deref().unwrap_or("<default>")
        );
        tracing::info!("  EXTRACTION_MODEL: {}", self.extraction_model);
        tracing::info!("  QUERY_MODEL: {}", self.query_model);
        tracing::info!("  LLM_TIMEOUT_SECS: {}", self.llm_timeout.as_secs());
        tracing::info!("  BROWSERLESS_URL: {}", self.browserless_url);
        tracing::info!("  ARTICLE_LOG_PATH: {}", self.article_log_path.display());
        tracing::info!("  CONTENT_POLICY: {:?}", self.content_policy);
    }
}

/// Graph connection settings, required once a command needs the graph.
pub struct Neo4jCredentials<'a> {
    pub uri: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

impl Config {
    pub fn neo4j(&self) -> Result<Neo4jCredentials<'_>, ConfigError> {
        fn field<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
            value.as_deref().ok_or(ConfigError::Missing(key))
        }
        Ok(Neo4jCredentials {
            uri: field(&self.neo4j_uri, "NEO4J_URI")?,
            user: field(&self.neo4j_user, "NEO4J_USER")?,
            password: field(&self.neo4j_password, "NEO4J_PASSWORD")?,
        })
    }
}

/// Non-negative seconds that fit in a `Duration`.
fn parse_secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    parse_opt::<f64>(get, key)?
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
                key,
                value: secs.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_opt<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
