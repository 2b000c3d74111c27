use thiserror::Error;

/// A single URL could not be fetched or rendered. The URL is skipped;
/// the phase continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("render failed for {url}: {message}")]
    Render { url: String, message: String },

    #[error("timed out after {secs}s fetching {url}")]
    Timeout { url: String, secs: u64 },

    #[error("feed {url} could not be parsed: {message}")]
    Feed { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Render { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Feed { url, .. } => url,
        }
    }
}

/// Decoded extraction content is not a single resolvable record. Indicates
/// an upstream schema contract violation, so it is never silently skipped.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("extraction for {url} is not a single record: {reason}")]
pub struct ExtractionShapeError {
    pub url: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("extraction call failed for {url}: {message}")]
    Call { url: String, message: String },

    #[error(transparent)]
    Shape(#[from] ExtractionShapeError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum PressgraphError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
