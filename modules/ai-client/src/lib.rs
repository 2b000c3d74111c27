//! Minimal client for OpenAI-compatible chat endpoints: free-text completions
//! and strict JSON-schema structured output.

pub mod client;
pub mod error;
pub mod schema;
pub(crate) mod types;
pub mod util;

pub use client::OpenAi;
pub use error::{AiError, Result};
pub use schema::StructuredOutput;
pub use util::{strip_code_blocks, truncate_to_char_boundary};
