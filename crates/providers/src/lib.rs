//! # RAG Providers
//!
//! HTTP clients for the services a RAG pipeline talks to:
//!
//! - [`OpenAiEmbedder`]: [`rag_vector_store::EmbeddingProvider`] over `/embeddings`
//! - [`OpenAiChat`] and [`AnthropicChat`]: [`rag_retrieval::LlmProvider`]
//! - [`PineconeVectorStore`]: [`rag_vector_store::VectorStore`] over a Pinecone index
//!
//! Every client owns a `reqwest` client with a request timeout. Transport and API
//! failures become [`ProviderError`], which converts into the error type of the
//! trait being implemented.

mod anthropic;
mod error;
mod http;
mod openai;
mod pinecone;

pub use anthropic::{AnthropicChat, ANTHROPIC_BASE_URL, ANTHROPIC_VERSION, DEFAULT_ANTHROPIC_MODEL};
pub use error::{ProviderError, Result};
pub use http::DEFAULT_TIMEOUT;
pub use openai::{
    OpenAiChat, OpenAiEmbedder, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, OPENAI_BASE_URL,
};
pub use pinecone::{PineconeConfig, PineconeVectorStore};
