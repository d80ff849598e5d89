use crate::error::LlmError;
use async_trait::async_trait;

/// Text-in, text-out completion model.
///
/// One call per prompt; implementations do their own retries, if any.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}
