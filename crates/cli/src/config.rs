use anyhow::{bail, Context, Result};
use rag_providers::{
    DEFAULT_ANTHROPIC_MODEL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL,
};
use rag_retrieval::RetrievalConfig;
use rag_text_splitter::SplitterConfig;
use rag_vector_store::DEFAULT_SAVE_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "rag.toml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_EMBEDDING_MODE: &str = "RAG_EMBEDDING_MODE";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_PINECONE_API_KEY: &str = "PINECONE_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Native,
    Pinecone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    #[default]
    Openai,
    Stub,
}

impl EmbeddingMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::Openai),
            "stub" => Some(Self::Stub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackend {
    #[default]
    Openai,
    Anthropic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub index_path: PathBuf,
    pub metadata_dir: PathBuf,
    pub save_threshold: usize,
    pub pinecone_host: Option<String>,
    pub pinecone_namespace: Option<String>,
    pub pinecone_api_key: Option<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Native,
            index_path: PathBuf::from(".rag/faiss_index.bin"),
            metadata_dir: PathBuf::from(".rag/metadata"),
            save_threshold: DEFAULT_SAVE_THRESHOLD,
            pinecone_host: None,
            pinecone_namespace: None,
            pinecone_api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub mode: EmbeddingMode,
    pub model: String,
    pub dimension: usize,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Openai,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            api_key: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    /// Backend default when unset
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_tokens: Option<u32>,
}

impl LlmSection {
    pub fn model(&self) -> &str {
        match (&self.model, self.backend) {
            (Some(model), _) => model,
            (None, LlmBackend::Openai) => DEFAULT_CHAT_MODEL,
            (None, LlmBackend::Anthropic) => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

/// Contents of `rag.toml`; every section and field is optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub store: StoreSection,
    pub splitter: SplitterConfig,
    pub embedding: EmbeddingSection,
    pub llm: LlmSection,
    pub retrieval: RetrievalConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            store: StoreSection::default(),
            splitter: SplitterConfig::for_documents(),
            embedding: EmbeddingSection::default(),
            llm: LlmSection::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl RagConfig {
    /// Read `path`, or `rag.toml` in the working directory when it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment values win over the file when set and non-empty
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = var(ENV_EMBEDDING_MODE) {
            match EmbeddingMode::parse(&raw) {
                Some(mode) => self.embedding.mode = mode,
                None => log::warn!("Ignoring unknown {ENV_EMBEDDING_MODE}={raw}"),
            }
        }
        if let Some(key) = var(ENV_OPENAI_API_KEY) {
            self.embedding.api_key = Some(key.clone());
            if self.llm.backend == LlmBackend::Openai {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(key) = var(ENV_ANTHROPIC_API_KEY) {
            if self.llm.backend == LlmBackend::Anthropic {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(key) = var(ENV_PINECONE_API_KEY) {
            self.store.pinecone_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.splitter.validate()?;
        self.retrieval.validate()?;
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be > 0");
        }
        if self.store.save_threshold == 0 {
            bail!("store.save_threshold must be > 0");
        }
        if self.store.backend == StoreBackend::Pinecone && self.store.pinecone_host.is_none() {
            bail!("store.pinecone_host is required for the pinecone backend");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = RagConfig::from_toml("").unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.splitter.chunk_size, 1500);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_override_defaults() {
        let config = RagConfig::from_toml(
            r#"
            [store]
            index_path = "data/index.bin"
            save_threshold = 2

            [splitter]
            chunk_size = 200
            chunk_overlap = 20

            [embedding]
            mode = "stub"
            dimension = 64

            [llm]
            backend = "anthropic"

            [retrieval]
            top_k = 5

            [retrieval.templates]
            persona = "an expert on the solar system"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.index_path, PathBuf::from("data/index.bin"));
        assert_eq!(config.store.save_threshold, 2);
        assert_eq!(config.splitter.chunk_size, 200);
        assert_eq!(config.splitter.separators.len(), 5);
        assert_eq!(config.embedding.mode, EmbeddingMode::Stub);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.llm.model(), DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.max_context_entries, 3);
        assert_eq!(config.retrieval.templates.persona, "an expert on the solar system");
    }

    #[test]
    fn env_overrides_mode_and_keys() {
        let mut config = RagConfig::default();
        config.apply_env(env(&[
            (ENV_EMBEDDING_MODE, "STUB"),
            (ENV_OPENAI_API_KEY, "sk-env"),
            (ENV_ANTHROPIC_API_KEY, "ant-env"),
            (ENV_PINECONE_API_KEY, "pc-env"),
        ]));
        assert_eq!(config.embedding.mode, EmbeddingMode::Stub);
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.store.pinecone_api_key.as_deref(), Some("pc-env"));

        let mut anthropic = RagConfig::default();
        anthropic.llm.backend = LlmBackend::Anthropic;
        anthropic.apply_env(env(&[(ENV_OPENAI_API_KEY, "sk-env"), (ENV_ANTHROPIC_API_KEY, "ant-env")]));
        assert_eq!(anthropic.llm.api_key.as_deref(), Some("ant-env"));
    }

    #[test]
    fn unknown_mode_and_blank_values_are_ignored() {
        let mut config = RagConfig::default();
        config.apply_env(env(&[(ENV_EMBEDDING_MODE, "gpu"), (ENV_OPENAI_API_KEY, "  ")]));
        assert_eq!(config.embedding.mode, EmbeddingMode::Openai);
        assert_eq!(config.embedding.api_key, None);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let bad_split = RagConfig::from_toml("[splitter]\nchunk_size = 10\nchunk_overlap = 10\n").unwrap();
        assert!(bad_split.validate().is_err());

        let no_host = RagConfig::from_toml("[store]\nbackend = \"pinecone\"\n").unwrap();
        assert!(no_host.validate().is_err());

        assert!(RagConfig::from_toml("[embedding]\nmode = \"gpu\"\n").is_err());
    }
}
