//! # RAG Text Splitter
//!
//! Recursive, separator-cascading text splitting for embedding pipelines.
//!
//! ## Philosophy
//!
//! Chunks should respect the natural boundaries of a document before falling back
//! to raw character windows:
//! - Paragraph breaks are preferred over line breaks
//! - Line breaks over sentence ends, sentence ends over spaces
//! - Only when nothing else applies is the text cut into overlapping windows
//!
//! ## Architecture
//!
//! ```text
//! Document (plain text or HTML)
//!     │
//!     ├──> HTML normalisation (optional)
//!     │
//!     ├──> Separator cascade
//!     │    ├─> "\n\n" → "\n" → ". " → " "
//!     │    └─> greedy reassembly up to chunk_size
//!     │
//!     └──> Hard split
//!          └─> sliding window (chunk_size, step = chunk_size - chunk_overlap)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rag_text_splitter::{RecursiveTextSplitter, SplitterConfig};
//!
//! let splitter = RecursiveTextSplitter::new(SplitterConfig::new(40, 5)).unwrap();
//!
//! let text = "Mercury is the closest planet.\n\nVenus is the hottest one.";
//! for chunk in splitter.split_text(text) {
//!     println!("#{}: {}", chunk.index, chunk.text);
//! }
//! ```

mod config;
mod error;
mod html;
mod splitter;
mod types;

pub use config::{SplitterConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS};
pub use error::{Result, SplitterError};
pub use html::html_to_text;
pub use splitter::{split_text, RecursiveTextSplitter};
pub use types::TextChunk;
