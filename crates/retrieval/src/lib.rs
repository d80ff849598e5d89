//! # RAG Retrieval
//!
//! Ingest documents into a [`rag_vector_store::VectorStore`] and answer questions
//! with the retrieved chunks as evidence.
//!
//! ```text
//! ingest:  text ─> splitter ─> chunk + SourceMetadata ─> add_vector
//! answer:  query ─> query_vector ─> ChunkRecord[] ─> prompt ─> LlmProvider
//!                                        │
//!                                        └─ nothing usable ─> general prompt
//! ```

mod error;
mod llm;
mod mask;
mod orchestrator;
mod owner;
mod prompt;
mod record;

pub use error::{LlmError, Result, RetrievalError};
pub use llm::LlmProvider;
pub use mask::masked;
pub use orchestrator::{
    Answer, IngestReport, RetrievalConfig, RetrievalOrchestrator, DEFAULT_MAX_CONTEXT_ENTRIES,
    DEFAULT_TOP_K,
};
pub use owner::{OwnerDirectory, StaticOwnerDirectory};
pub use prompt::{ContextEntry, PromptTemplates};
pub use record::{
    ChunkRecord, SourceMetadata, CHUNK_KEY, OWNER_KEY, SOURCE_ID_KEY, SUBJECT_KEY, TIMESTAMP_KEY,
};
