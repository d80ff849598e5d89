use crate::error::{LlmError, Result, RetrievalError};
use crate::llm::LlmProvider;
use crate::mask::masked;
use crate::owner::OwnerDirectory;
use crate::prompt::{ContextEntry, PromptTemplates};
use crate::record::{ChunkRecord, SourceMetadata};
use rag_text_splitter::{html_to_text, RecursiveTextSplitter, TextChunk};
use rag_vector_store::{SearchMatch, StoredId, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MAX_CONTEXT_ENTRIES: usize = 3;

const UNKNOWN_OWNER: &str = "unknown";
const NO_SUBJECT: &str = "(no subject)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Matches requested from the store per question
    pub top_k: usize,
    /// Leading matches considered for the context block
    pub max_context_entries: usize,
    pub templates: PromptTemplates,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_entries: DEFAULT_MAX_CONTEXT_ENTRIES,
            templates: PromptTemplates::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrievalError::InvalidConfig("top_k must be > 0".to_string()));
        }
        if self.max_context_entries == 0 {
            return Err(RetrievalError::InvalidConfig(
                "max_context_entries must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of ingesting one or more documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub stored: Vec<StoredId>,
    pub failed: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: Self) {
        self.documents += other.documents;
        self.chunks += other.chunks;
        self.stored.extend(other.stored);
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// True when the prompt carried retrieved context
    pub grounded: bool,
    /// Ids of the matches that made it into the context
    pub sources: Vec<StoredId>,
}

impl Answer {
    fn ungrounded(text: String) -> Self {
        Self {
            text,
            grounded: false,
            sources: Vec::new(),
        }
    }
}

/// Ingest and question answering over one vector store.
///
/// Ingest: text → chunks → `add_vector` per chunk.
/// Answer: question → `query_vector` → context block → one model call. A question
/// with no usable context is still answered from general knowledge, and any failure
/// on the way turns into the configured apology.
pub struct RetrievalOrchestrator {
    splitter: RecursiveTextSplitter,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    owners: Option<Arc<dyn OwnerDirectory>>,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(
        splitter: RecursiveTextSplitter,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            splitter,
            store,
            llm,
            owners: None,
            config,
        })
    }

    /// Require every context chunk's owner to resolve through `owners`
    #[must_use]
    pub fn with_owner_directory(mut self, owners: Arc<dyn OwnerDirectory>) -> Self {
        self.owners = Some(owners);
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Split `text` and store every chunk. A failing chunk is logged and counted;
    /// the rest are still stored.
    pub async fn ingest(&self, text: &str, source: &SourceMetadata) -> IngestReport {
        let chunks = self.splitter.split_text(text);
        self.ingest_chunks(chunks, source).await
    }

    /// Like [`Self::ingest`] for an HTML body
    pub async fn ingest_html(&self, html: &str, source: &SourceMetadata) -> IngestReport {
        let chunks = self.splitter.split_text(&html_to_text(html));
        self.ingest_chunks(chunks, source).await
    }

    pub async fn ingest_batch(&self, documents: &[(String, SourceMetadata)]) -> IngestReport {
        let mut report = IngestReport::default();
        for (text, source) in documents {
            report.merge(self.ingest(text, source).await);
        }
        report
    }

    async fn ingest_chunks(&self, chunks: Vec<TextChunk>, source: &SourceMetadata) -> IngestReport {
        let mut report = IngestReport {
            documents: 1,
            ..IngestReport::default()
        };

        for chunk in chunks.iter().filter(|c| !c.text.trim().is_empty()) {
            report.chunks += 1;
            let record = source.chunk_record(&chunk.text);
            log::info!(
                "Adding chunk {} of {} (subject {}, {} chars)",
                chunk.index,
                masked(&source.source_id),
                masked(source.subject.as_deref().unwrap_or("")),
                chunk.char_len()
            );

            match self
                .store
                .add_vector(&record.embedding_text(), record.to_metadata())
                .await
            {
                Ok(id) => report.stored.push(id),
                Err(err) => {
                    log::warn!(
                        "Failed to store chunk {} of {}: {err}",
                        chunk.index,
                        masked(&source.source_id)
                    );
                    report.failed += 1;
                }
            }
        }

        log::debug!(
            "Ingested {}: {} chunks, {} failed",
            masked(&source.source_id),
            report.chunks,
            report.failed
        );
        report
    }

    /// Answer text for `query`; never fails
    pub async fn answer(&self, query: &str) -> String {
        self.answer_detailed(query).await.text
    }

    pub async fn answer_detailed(&self, query: &str) -> Answer {
        let templates = &self.config.templates;
        if query.trim().is_empty() {
            return Answer::ungrounded(templates.empty_query.clone());
        }

        match self.try_answer(query).await {
            Ok(answer) => answer,
            Err(err) => {
                log::error!("Answering failed: {err}");
                Answer::ungrounded(templates.apology.clone())
            }
        }
    }

    async fn try_answer(&self, query: &str) -> Result<Answer> {
        let templates = &self.config.templates;
        let matches = self.store.query_vector(query, self.config.top_k).await?;
        let (entries, sources) = self.build_context(&matches).await;

        if entries.is_empty() {
            log::info!("No usable context found, answering from general knowledge");
            let text = self.complete(&templates.general(query)).await?;
            return Ok(Answer::ungrounded(text));
        }

        let prompt = templates.grounded(&entries, query);
        log::info!(
            "Querying model with {} context entries (prompt length {})",
            entries.len(),
            prompt.len()
        );
        let text = self.complete(&prompt).await?;
        Ok(Answer {
            text,
            grounded: true,
            sources,
        })
    }

    /// Resolve the leading matches into context entries, skipping those without
    /// chunk text or with an owner the directory does not know.
    async fn build_context(&self, matches: &[SearchMatch]) -> (Vec<ContextEntry>, Vec<StoredId>) {
        let mut entries = Vec::new();
        let mut sources = Vec::new();

        for m in matches.iter().take(self.config.max_context_entries) {
            let Some(record) = m.metadata.as_ref().and_then(ChunkRecord::from_metadata) else {
                log::debug!("Skipping match {}: no chunk metadata", m.id);
                continue;
            };
            let Some(owner) = self.resolve_owner(record.owner.as_deref()).await else {
                log::debug!("Skipping match {}: owner not resolvable", m.id);
                continue;
            };

            log::debug!(
                "Context entry {} from match {} (score {:.4}, subject {})",
                entries.len() + 1,
                m.id,
                m.score,
                masked(record.subject.as_deref().unwrap_or(""))
            );
            entries.push(ContextEntry {
                owner,
                subject: record.subject.unwrap_or_else(|| NO_SUBJECT.to_string()),
                chunk: record.chunk,
            });
            sources.push(m.id);
        }

        (entries, sources)
    }

    async fn resolve_owner(&self, owner: Option<&str>) -> Option<String> {
        match (&self.owners, owner) {
            (Some(directory), Some(owner)) => directory.resolve(owner).await,
            (Some(_), None) => None,
            (None, owner) => Some(owner.unwrap_or(UNKNOWN_OWNER).to_string()),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let text = self.llm.complete(prompt).await?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(text)
    }
}
