pub mod client;
pub mod migrate;
pub mod reader;
pub mod schema;
pub mod store;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use neo4rs::query;
pub use reader::GraphReader;
pub use schema::{GraphSchema, PropertyInfo, RelationshipPattern};
pub use store::{GraphReadError, GraphStore, GraphWriteError, Neo4jStore, QueryRow};
pub use writer::GraphWriter;
