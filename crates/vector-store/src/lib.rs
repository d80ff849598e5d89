//! # RAG Vector Store
//!
//! Embedding storage and similarity search with durable on-disk persistence.
//!
//! ## Features
//!
//! - **Exact L2 search** via a flat index behind the [`VectorIndex`] trait
//! - **Lazy initialization** with corrupted-file backup and recovery
//! - **Batched persistence**: the index file is rewritten every N inserts
//! - **Metadata join**: every stored id maps to a string record
//! - **Capability flags** so callers can branch on optional operations
//!
//! ## Architecture
//!
//! ```text
//! text
//!     │
//!     ├──> EmbeddingProvider
//!     │      └─> Vec<f32>[dimension]
//!     │
//!     ├──> VectorIndex (FlatL2Index)
//!     │      ├─> add → StoredId
//!     │      └─> search → (StoredId, distance)[]
//!     │
//!     ├──> MetadataStore
//!     │      └─> KeyValueBackend (memory / JSON file)
//!     │
//!     └──> Index file (save every N inserts, load on first use)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rag_vector_store::{
//!     FlatL2Index, JsonFileBackend, KeyValueMetadataStore, MetadataRecord, NativeVectorStore,
//!     StoreConfig, StubEmbedder, VectorStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = Arc::new(StubEmbedder::new(384)?);
//!     let metadata = KeyValueMetadataStore::new(JsonFileBackend::new(".rag/metadata"));
//!     let store: NativeVectorStore<FlatL2Index, _> =
//!         NativeVectorStore::new(StoreConfig::new(384, ".rag/index.bin"), embedder, metadata)?;
//!
//!     let mut record = MetadataRecord::new();
//!     record.insert("chunk".into(), "Mars has two moons.".into());
//!     store.add_vector("Mars has two moons.", record).await?;
//!
//!     for m in store.query_vector("moons of mars", 3).await? {
//!         println!("{} {:.3} {:?}", m.id, m.score, m.metadata);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod index;
mod metadata;
mod paths;
mod store;
mod types;

pub use embeddings::{EmbeddingProvider, StubEmbedder};
pub use error::{Result, VectorStoreError};
pub use index::{FlatL2Index, VectorIndex};
pub use metadata::{
    JsonFileBackend, KeyValueBackend, KeyValueMetadataStore, MemoryBackend, MetadataStore,
    DEFAULT_METADATA_NAMESPACE,
};
pub use paths::backup_path;
pub use store::{NativeVectorStore, StoreConfig, VectorStore, DEFAULT_SAVE_THRESHOLD};
pub use types::{
    IndexState, MetadataRecord, ScoreKind, SearchMatch, StoreCapabilities, StoreLifecycle,
    StoredId, Vector, INVALID_STORED_ID,
};
