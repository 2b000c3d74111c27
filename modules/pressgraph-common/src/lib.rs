pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{Catalog, JsonCatalog};
pub use config::{Config, ContentPolicy, CrawlSettings, Neo4jCredentials, RateLimitSettings};
pub use error::{ConfigError, ExtractionError, ExtractionShapeError, FetchError, PressgraphError};
pub use types::*;
