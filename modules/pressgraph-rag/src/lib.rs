//! Question answering over the article graph: schema → Cypher generation →
//! guarded read-only execution → answer rendering.

pub mod guard;
pub mod model;
pub mod prompts;
pub mod responder;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use guard::{clean_cypher, ensure_read_only};
pub use model::LanguageModel;
pub use responder::{Answer, QueryError, QueryResponder, RagStage, DEFAULT_TOP_K};
