use crate::config::{EmbeddingMode, EmbeddingSection, LlmBackend, LlmSection, RagConfig, StoreBackend};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rag_providers::{
    AnthropicChat, OpenAiChat, OpenAiEmbedder, PineconeConfig, PineconeVectorStore,
    ANTHROPIC_BASE_URL, DEFAULT_TIMEOUT, OPENAI_BASE_URL,
};
use rag_retrieval::{
    Answer, IngestReport, LlmError, LlmProvider, RetrievalOrchestrator, SourceMetadata,
};
use rag_text_splitter::RecursiveTextSplitter;
use rag_vector_store::{
    EmbeddingProvider, FlatL2Index, IndexState, JsonFileBackend, KeyValueMetadataStore,
    NativeVectorStore, SearchMatch, StoreCapabilities, StoreConfig, StubEmbedder, VectorStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub type NativeStore = NativeVectorStore<FlatL2Index, KeyValueMetadataStore<JsonFileBackend>>;

pub fn build_embedder(section: &EmbeddingSection) -> Result<Arc<dyn EmbeddingProvider>> {
    match section.mode {
        EmbeddingMode::Stub => Ok(Arc::new(StubEmbedder::new(section.dimension)?)),
        EmbeddingMode::Openai => {
            let key = section.api_key.as_deref().ok_or_else(|| {
                anyhow!("OpenAI API key missing: set OPENAI_API_KEY or embedding.api_key")
            })?;
            let embedder = OpenAiEmbedder::with_options(
                key,
                section.model.clone(),
                section.dimension,
                section.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
                Duration::from_secs(section.timeout_secs),
            )
            .context("Failed to configure OpenAI embeddings")?;
            Ok(Arc::new(embedder))
        }
    }
}

pub fn build_llm(section: &LlmSection) -> Result<Arc<dyn LlmProvider>> {
    let key = section.api_key.as_deref().ok_or_else(|| match section.backend {
        LlmBackend::Openai => anyhow!("LLM API key missing: set OPENAI_API_KEY or llm.api_key"),
        LlmBackend::Anthropic => {
            anyhow!("LLM API key missing: set ANTHROPIC_API_KEY or llm.api_key")
        }
    })?;
    let timeout = section.timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs);

    match section.backend {
        LlmBackend::Openai => {
            let base_url = section.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            let chat = OpenAiChat::with_options(key, section.model(), base_url, timeout)
                .context("Failed to configure OpenAI chat")?;
            Ok(Arc::new(chat))
        }
        LlmBackend::Anthropic => {
            let base_url = section.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL);
            let mut chat = AnthropicChat::with_options(key, section.model(), base_url, timeout)
                .context("Failed to configure Anthropic chat")?;
            if let Some(max_tokens) = section.max_tokens {
                chat = chat.with_max_tokens(max_tokens);
            }
            Ok(Arc::new(chat))
        }
    }
}

/// Stand-in model for commands that never ask one
struct DisabledLlm;

#[async_trait]
impl LlmProvider for DisabledLlm {
    async fn complete(&self, _prompt: &str) -> std::result::Result<String, LlmError> {
        Err(LlmError::Transport("no language model configured".to_string()))
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

pub enum StoreHandle {
    Native(Arc<NativeStore>),
    Remote(Arc<PineconeVectorStore>),
}

impl StoreHandle {
    pub fn open(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = &config.store;
        match store.backend {
            StoreBackend::Native => {
                let store_config = StoreConfig::new(config.embedding.dimension, &store.index_path)
                    .with_save_threshold(store.save_threshold);
                let metadata = KeyValueMetadataStore::new(JsonFileBackend::new(&store.metadata_dir));
                let native = NativeVectorStore::new(store_config, embedder, metadata)
                    .context("Failed to configure vector store")?;
                Ok(Self::Native(Arc::new(native)))
            }
            StoreBackend::Pinecone => {
                let host = store
                    .pinecone_host
                    .clone()
                    .ok_or_else(|| anyhow!("store.pinecone_host is not set"))?;
                let key = store.pinecone_api_key.clone().ok_or_else(|| {
                    anyhow!("Pinecone API key missing: set PINECONE_API_KEY or store.pinecone_api_key")
                })?;
                let mut pinecone = PineconeConfig::new(host, key);
                if let Some(namespace) = &store.pinecone_namespace {
                    pinecone = pinecone.with_namespace(namespace.clone());
                }
                let remote = PineconeVectorStore::new(pinecone, embedder)
                    .context("Failed to configure Pinecone store")?;
                Ok(Self::Remote(Arc::new(remote)))
            }
        }
    }

    pub fn as_dyn(&self) -> Arc<dyn VectorStore> {
        match self {
            Self::Native(store) => store.clone(),
            Self::Remote(store) => store.clone(),
        }
    }

    /// Persist pending inserts so the next process sees them
    pub async fn flush(&self) -> Result<()> {
        if let Self::Native(store) = self {
            store.flush().await.context("Failed to save index")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Treat every file as HTML, whatever its extension
    pub html: bool,
    pub owner: Option<String>,
    pub subject: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestOutput {
    pub files: Vec<String>,
    /// Files that could not be read; the rest of the batch still ran
    pub failed_files: Vec<String>,
    #[serde(flatten)]
    pub report: IngestReport,
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub backend: StoreBackend,
    pub embedding_model: String,
    pub capabilities: StoreCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexState>,
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Everything one command needs, built from the configuration
pub struct App {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: StoreHandle,
    orchestrator: RetrievalOrchestrator,
}

impl App {
    /// `with_llm` builds the configured model client; otherwise model calls fail
    pub fn new(config: RagConfig, with_llm: bool) -> Result<Self> {
        config.validate()?;
        let embedder = build_embedder(&config.embedding)?;
        let store = StoreHandle::open(&config, embedder.clone())?;
        let llm: Arc<dyn LlmProvider> = if with_llm {
            build_llm(&config.llm)?
        } else {
            Arc::new(DisabledLlm)
        };
        let splitter = RecursiveTextSplitter::new(config.splitter.clone())?;
        let orchestrator =
            RetrievalOrchestrator::new(splitter, store.as_dyn(), llm, config.retrieval.clone())?;

        Ok(Self {
            config,
            embedder,
            store,
            orchestrator,
        })
    }

    pub async fn ingest(&self, files: &[PathBuf], options: &IngestOptions) -> Result<IngestOutput> {
        let mut report = IngestReport::default();
        let mut names = Vec::with_capacity(files.len());
        let mut failed_files = Vec::new();

        for path in files {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("Skipping {}: {err}", path.display());
                    failed_files.push(path.display().to_string());
                    continue;
                }
            };
            let source_id = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

            let mut source = SourceMetadata::new(source_id.clone());
            source.owner = options.owner.clone();
            source.subject = options.subject.clone();
            source.timestamp = options.timestamp.clone();

            let file_report = if options.html || is_html(path) {
                self.orchestrator.ingest_html(&text, &source).await
            } else {
                self.orchestrator.ingest(&text, &source).await
            };
            log::info!(
                "{}: {} chunks stored, {} failed",
                path.display(),
                file_report.stored.len(),
                file_report.failed
            );
            report.merge(file_report);
            names.push(source_id);
        }

        self.store.flush().await?;
        Ok(IngestOutput {
            files: names,
            failed_files,
            report,
        })
    }

    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchMatch>> {
        let top_k = top_k.unwrap_or(self.config.retrieval.top_k);
        self.store
            .as_dyn()
            .query_vector(query, top_k)
            .await
            .context("Search failed")
    }

    pub async fn ask(&self, question: &str) -> Answer {
        self.orchestrator.answer_detailed(question).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.store
            .as_dyn()
            .delete_all_vectors()
            .await
            .context("Failed to delete vectors")
    }

    pub async fn stats(&self) -> Result<StatsOutput> {
        let index = match &self.store {
            StoreHandle::Native(store) => {
                store.ensure_ready().await.context("Failed to open index")?;
                Some(store.state().await)
            }
            StoreHandle::Remote(_) => None,
        };
        Ok(StatsOutput {
            backend: self.config.store.backend,
            embedding_model: self.embedder.model_name().to_string(),
            capabilities: self.store.as_dyn().capabilities(),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_detection_uses_extension() {
        assert!(is_html(Path::new("mail/body.HTML")));
        assert!(is_html(Path::new("page.htm")));
        assert!(!is_html(Path::new("notes.txt")));
        assert!(!is_html(Path::new("README")));
    }

    #[test]
    fn openai_embeddings_need_a_key() {
        let section = EmbeddingSection::default();
        assert!(build_embedder(&section).is_err());

        let stub = EmbeddingSection {
            mode: EmbeddingMode::Stub,
            dimension: 8,
            ..EmbeddingSection::default()
        };
        assert_eq!(build_embedder(&stub).unwrap().dimension(), 8);
    }

    fn stub_config(dir: &Path) -> RagConfig {
        let mut config = RagConfig::default();
        config.embedding.mode = EmbeddingMode::Stub;
        config.embedding.dimension = 8;
        config.store.index_path = dir.join("index.bin");
        config.store.metadata_dir = dir.join("metadata");
        config
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped_and_the_rest_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("venus.txt");
        std::fs::write(&good, "Venus rotates backwards.").unwrap();
        let missing = dir.path().join("missing.txt");

        let app = App::new(stub_config(dir.path()), false).unwrap();
        let output = app.ingest(&[missing.clone(), good], &IngestOptions::default()).await.unwrap();

        assert_eq!(output.files, vec!["venus.txt".to_string()]);
        assert_eq!(output.failed_files, vec![missing.display().to_string()]);
        assert_eq!(output.report.stored.len(), 1);

        // A fresh process sees the vector, so the index was flushed.
        let reopened = App::new(stub_config(dir.path()), false).unwrap();
        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.index.map(|state| state.vector_count), Some(1));
        let hits = reopened.search("Venus rotates backwards.", Some(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn llm_needs_a_key() {
        assert!(build_llm(&LlmSection::default()).is_err());
        let section = LlmSection {
            backend: LlmBackend::Anthropic,
            api_key: Some("key".to_string()),
            ..LlmSection::default()
        };
        assert_eq!(build_llm(&section).unwrap().model_name(), "claude-3-5-haiku-latest");
    }
}
