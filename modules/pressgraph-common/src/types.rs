use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

// --- Catalog Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "HTML", alias = "html")]
    Html,
    #[serde(rename = "RSS", alias = "rss")]
    Rss,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Html => write!(f, "HTML"),
            SourceType::Rss => write!(f, "RSS"),
        }
    }
}

/// A source to crawl, as supplied by the catalog. Loaded once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTarget {
    pub source_id: i64,
    pub url: String,
    pub source_type: SourceType,
    /// CSS selectors locating the article-list regions. HTML sources only.
    #[serde(default, deserialize_with = "deserialize_selectors")]
    pub selectors: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Catalog rows store the selector as one string (often a comma-separated
/// CSS group); newer entries use an array.
fn deserialize_selectors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    let selectors = match raw {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    };
    Ok(selectors
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

// --- Discovery Types ---

/// A normalized article URL found during discovery. Identity is the URL alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    pub discovered_from: String,
}

impl CandidateLink {
    pub fn new(url: impl Into<String>, discovered_from: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            discovered_from: discovered_from.into(),
        }
    }
}

impl PartialEq for CandidateLink {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for CandidateLink {}

impl Hash for CandidateLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

/// Strip the fragment from a URL. Parseable URLs are also canonicalized
/// (scheme/host case, empty path → `/`); anything else is cut at `#`.
pub fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.split('#').next().unwrap_or_default().to_string(),
    }
}

// --- Extraction Types ---

/// The fixed extraction schema the LLM fills for one article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionRecord {
    /// The article headline.
    #[serde(default)]
    pub headline: String,
    /// A short summary of the article.
    #[serde(default)]
    pub summary: String,
    /// Publication date with day, month and year, as printed near the headline.
    #[serde(default, alias = "publishedDate")]
    pub published_date: String,
    /// A recognized product name, or empty.
    #[serde(default)]
    pub product: String,
    /// The recognized target for the product, or empty.
    #[serde(default)]
    pub target: String,
}

impl ExtractionRecord {
    /// Completeness score used to pick among competing extractions.
    pub fn completeness(&self) -> u32 {
        let mut score = 0;
        if !self.published_date.is_empty() {
            score += 3;
        }
        if !self.product.is_empty() {
            score += 2;
        }
        if !self.target.is_empty() {
            score += 2;
        }
        if self.summary.chars().count() > 30 {
            score += 1;
        }
        if self.headline.chars().count() > 10 {
            score += 1;
        }
        score
    }
}

/// What an extraction call produced for one page, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawExtraction {
    Empty,
    Single(serde_json::Value),
    Many(Vec<serde_json::Value>),
    /// Content that could not be decoded as JSON at all.
    Malformed(String),
}

impl RawExtraction {
    /// Decode extractor output that arrives as text. Blank text is `Empty`;
    /// a JSON string is decoded once more since some extractors double-encode.
    pub fn decode(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return RawExtraction::Empty;
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => RawExtraction::from_value(value),
            Err(_) => RawExtraction::Malformed(trimmed.to_string()),
        }
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawExtraction::Empty,
            serde_json::Value::Array(items) if items.is_empty() => RawExtraction::Empty,
            serde_json::Value::Array(items) => RawExtraction::Many(items),
            serde_json::Value::String(s) => RawExtraction::decode(&s),
            other => RawExtraction::Single(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawExtraction::Empty)
    }
}

// --- Durable Log Types ---

/// One accepted article, as appended to the durable log. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArticleRecord {
    pub captured_at: DateTime<Utc>,
    pub url: String,
    pub published_date: String,
    pub headline: String,
    pub product: String,
    pub target: String,
    pub description_markdown: String,
    pub source_name: String,
    pub source_description: String,
}

impl ArticleRecord {
    pub fn from_extraction(
        record: ExtractionRecord,
        url: impl Into<String>,
        markdown: impl Into<String>,
        source_name: impl Into<String>,
        source_description: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            captured_at,
            url: url.into(),
            published_date: record.published_date,
            headline: record.headline,
            product: record.product,
            target: record.target,
            description_markdown: markdown.into(),
            source_name: source_name.into(),
            source_description: source_description.into(),
        }
    }

    pub fn has_product(&self) -> bool {
        !self.product.is_empty()
    }

    pub fn has_product_target(&self) -> bool {
        !self.product.is_empty() && !self.target.is_empty()
    }
}
