pub mod article_log;
pub mod discovery;
pub mod dispatcher;
pub mod extractor;
pub mod feed;
pub mod fetcher;
pub mod ingest;
pub mod pipeline;
pub mod resolver;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use article_log::{ArticleLog, ArticleLogError};
pub use dispatcher::{Dispatcher, MemoryGauge, ProcMemoryGauge, RateLimiter};
pub use extractor::LlmExtractor;
pub use fetcher::BrowserlessFetcher;
pub use ingest::{FailedRecord, IngestReport, Ingestor};
pub use pipeline::{ArticleOutcome, CrawlPipeline, CrawlReport, TargetReport};
pub use traits::{ArticleExtractor, Fetcher, RenderOptions, RenderedPage};
