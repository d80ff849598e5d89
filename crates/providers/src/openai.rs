use crate::error::{ProviderError, Result};
use crate::http::{build_client, check_status, endpoint, require_key, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use rag_retrieval::{LlmError, LlmProvider};
use rag_vector_store::{EmbeddingProvider, VectorStoreError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-mini";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    request_dimensions: bool,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Result<Self> {
        Self::with_options(api_key, model, dimension, OPENAI_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        require_key(&api_key, "OpenAI")?;
        if dimension == 0 {
            return Err(ProviderError::InvalidConfig(
                "embedding dimension must be > 0".to_string(),
            ));
        }
        let model = model.into();
        // Only the text-embedding-3 family accepts a requested size.
        let request_dimensions = model.starts_with("text-embedding-3");

        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.into(),
            model,
            dimension,
            request_dimensions,
        })
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.model,
            input: text,
            encoding_format: "float",
            dimensions: self.request_dimensions.then_some(self.dimension),
        }
    }

    async fn fetch(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&self.request(text))
            .send()
            .await?;
        let body: EmbeddingResponse = check_status(response).await?.json().await?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> rag_vector_store::Result<Vec<f32>> {
        log::debug!("Embedding {} chars with {}", text.chars().count(), self.model);
        let values = self
            .fetch(text)
            .await
            .map_err(|err| VectorStoreError::EmbeddingError(err.to_string()))?;
        if values.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Completions from an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiChat {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, model, OPENAI_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        require_key(&api_key, "OpenAI")?;
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            temperature: None,
        })
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        }
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await?;
        let body: ChatResponse = check_status(response).await?.json().await?;
        first_choice(body)
    }
}

fn first_choice(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        log::debug!("Chat completion with {} ({} chars)", self.model, prompt.len());
        self.send(prompt).await.map_err(|err| {
            log::warn!("OpenAI completion failed: {err}");
            LlmError::from(err)
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
