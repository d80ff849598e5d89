use rag_text_splitter::SplitterError;
use rag_vector_store::VectorStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Splitter error: {0}")]
    Splitter(#[from] SplitterError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a chat-completion call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model returned an empty response")]
    EmptyResponse,
}
