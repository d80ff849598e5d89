//! Wiring for the `rag` command-line tool: configuration loading and the
//! commands it runs against a vector store.

pub mod app;
pub mod config;

pub use app::{App, IngestOptions, IngestOutput, StatsOutput, StoreHandle};
pub use config::{EmbeddingMode, RagConfig, StoreBackend};
