use rag_retrieval::LlmError;
use rag_vector_store::VectorStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }
}

impl From<ProviderError> for VectorStoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidConfig(msg) => Self::InvalidConfig(msg),
            other => Self::RemoteError(other.to_string()),
        }
    }
}

impl From<ProviderError> for LlmError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Http(e) if e.is_timeout() => Self::Timeout,
            ProviderError::Http(e) => Self::Transport(e.to_string()),
            ProviderError::Api { status: 429, message } => Self::Quota(message),
            ProviderError::Api { status, message } => Self::Api { status, message },
            ProviderError::EmptyResponse => Self::EmptyResponse,
            ProviderError::Decode(msg) | ProviderError::InvalidConfig(msg) => Self::Transport(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_quota() {
        let err = ProviderError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(err.is_rate_limited());
        assert_eq!(LlmError::from(err), LlmError::Quota("slow down".to_string()));
    }

    #[test]
    fn api_and_empty_errors_keep_their_kind() {
        let err = ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(
            LlmError::from(err),
            LlmError::Api {
                status: 500,
                message: "boom".to_string()
            }
        );
        assert_eq!(LlmError::from(ProviderError::EmptyResponse), LlmError::EmptyResponse);
    }

    #[test]
    fn store_errors_are_remote_unless_config() {
        assert!(matches!(
            VectorStoreError::from(ProviderError::Decode("bad".to_string())),
            VectorStoreError::RemoteError(_)
        ));
        assert!(matches!(
            VectorStoreError::from(ProviderError::InvalidConfig("key".to_string())),
            VectorStoreError::InvalidConfig(_)
        ));
    }
}
