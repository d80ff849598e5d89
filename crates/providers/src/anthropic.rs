use crate::error::{ProviderError, Result};
use crate::http::{build_client, check_status, endpoint, require_key, DEFAULT_TIMEOUT};
use crate::openai::ChatMessage;
use async_trait::async_trait;
use rag_retrieval::{LlmError, LlmProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Completions from the Anthropic `/messages` endpoint
#[derive(Debug, Clone)]
pub struct AnthropicChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicChat {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, model, ANTHROPIC_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        require_key(&api_key, "Anthropic")?;
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request<'a>(&'a self, prompt: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request(prompt))
            .send()
            .await?;
        let body: MessagesResponse = check_status(response).await?.json().await?;
        joined_text(body)
    }
}

/// Concatenated text blocks of a reply
fn joined_text(body: MessagesResponse) -> Result<String> {
    let text: String = body
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for AnthropicChat {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        log::debug!("Messages call with {} ({} chars)", self.model, prompt.len());
        self.send(prompt).await.map_err(|err| {
            log::warn!("Anthropic completion failed: {err}");
            LlmError::from(err)
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
