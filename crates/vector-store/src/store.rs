use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, VectorStoreError};
use crate::index::VectorIndex;
use crate::metadata::MetadataStore;
use crate::paths::{backup_path, ensure_parent_dir};
use crate::types::{
    IndexState, MetadataRecord, ScoreKind, SearchMatch, StoreCapabilities, StoreLifecycle,
    StoredId, Vector,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, RwLockMappedWriteGuard, RwLockReadGuard, RwLockWriteGuard};

/// Inserts between two automatic index saves
pub const DEFAULT_SAVE_THRESHOLD: usize = 5;

/// Common interface of every vector store variant.
///
/// Optional operations are advertised through [`VectorStore::capabilities`], so
/// callers can branch before calling them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    /// Embed `text`, insert it and attach `metadata`
    async fn add_vector(&self, text: &str, metadata: MetadataRecord) -> Result<StoredId>;

    /// Top-`top_k` matches in the store's native ranking order
    async fn query_vector(&self, query: &str, top_k: usize) -> Result<Vec<SearchMatch>>;

    async fn delete_vector(&self, id: StoredId) -> Result<()>;

    async fn delete_all_vectors(&self) -> Result<()>;

    async fn destroy(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub dimension: usize,
    pub index_path: PathBuf,
    pub save_threshold: usize,
}

impl StoreConfig {
    pub fn new(dimension: usize, index_path: impl AsRef<Path>) -> Self {
        Self {
            dimension,
            index_path: index_path.as_ref().to_path_buf(),
            save_threshold: DEFAULT_SAVE_THRESHOLD,
        }
    }

    #[must_use]
    pub const fn with_save_threshold(mut self, save_threshold: usize) -> Self {
        self.save_threshold = save_threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "dimension must be > 0".to_string(),
            ));
        }
        if self.save_threshold == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "save_threshold must be > 0".to_string(),
            ));
        }
        if self.index_path.as_os_str().is_empty() {
            return Err(VectorStoreError::InvalidConfig(
                "index_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

struct ReadyIndex<I> {
    index: I,
    pending_saves: usize,
}

enum IndexSlot<I> {
    Uninitialized,
    Ready(ReadyIndex<I>),
    Destroyed,
}

impl<I> IndexSlot<I> {
    const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Vector store over a local [`VectorIndex`] persisted to one file.
///
/// The index is created or loaded lazily on first use. One mutex guards that
/// transition; afterwards searches share a read guard and inserts take the write
/// guard, which also covers the metadata write so no search observes an id whose
/// metadata is still in flight.
pub struct NativeVectorStore<I, M> {
    config: StoreConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    metadata: M,
    slot: RwLock<IndexSlot<I>>,
    init_lock: Mutex<()>,
}

impl<I: VectorIndex, M: MetadataStore> NativeVectorStore<I, M> {
    pub fn new(config: StoreConfig, embedder: Arc<dyn EmbeddingProvider>, metadata: M) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: config.dimension,
                actual: embedder.dimension(),
            });
        }

        log::info!(
            "Configured vector store at {:?} (dimension {}, model {})",
            config.index_path,
            config.dimension,
            embedder.model_name()
        );

        Ok(Self {
            config,
            embedder,
            metadata,
            slot: RwLock::new(IndexSlot::Uninitialized),
            init_lock: Mutex::new(()),
        })
    }

    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub async fn lifecycle(&self) -> StoreLifecycle {
        match &*self.slot.read().await {
            IndexSlot::Ready(_) => StoreLifecycle::Ready,
            IndexSlot::Destroyed => StoreLifecycle::Destroyed,
            IndexSlot::Uninitialized => {
                if self.init_lock.try_lock().is_err() {
                    StoreLifecycle::Initializing
                } else {
                    StoreLifecycle::Uninitialized
                }
            }
        }
    }

    pub async fn state(&self) -> IndexState {
        let slot = self.slot.read().await;
        let (initialized, pending, count) = match &*slot {
            IndexSlot::Ready(ready) => (true, ready.pending_saves, ready.index.len()),
            _ => (false, 0, 0),
        };
        IndexState {
            dimension: self.config.dimension,
            initialized,
            pending_unsaved_inserts: pending,
            backing_file_path: self.config.index_path.clone(),
            vector_count: count,
        }
    }

    /// Create or load the index if no caller has done so yet
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.slot.read().await.is_ready() {
            return Ok(());
        }

        let _init = self.init_lock.lock().await;
        if self.slot.read().await.is_ready() {
            return Ok(());
        }

        let index = self.open_index()?;
        *self.slot.write().await = IndexSlot::Ready(ReadyIndex {
            index,
            pending_saves: 0,
        });
        log::info!("Vector store ready at {:?}", self.config.index_path);
        Ok(())
    }

    fn open_index(&self) -> Result<I> {
        let path = &self.config.index_path;
        let dimension = self.config.dimension;
        log::debug!("Initializing index with dimension {dimension}");

        let mut index = I::create(dimension)?;

        ensure_parent_dir(path).map_err(|err| {
            VectorStoreError::InitError(format!(
                "failed to create directory for {}: {err}",
                path.display()
            ))
        })?;

        let existing_len = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };

        if existing_len == 0 {
            log::debug!("Creating new index file at {path:?}");
            index.save(path)?;
            return Ok(index);
        }

        match index.load(path) {
            Ok(()) => {
                log::info!("Loaded {} vectors from {path:?}", index.len());
                Ok(index)
            }
            Err(err) => {
                let backup = backup_path(path);
                log::warn!(
                    "Failed to load index from {path:?} ({err}); moving it to {backup:?} and starting empty"
                );
                std::fs::rename(path, &backup)?;
                let fresh = I::create(dimension)?;
                fresh.save(path)?;
                Ok(fresh)
            }
        }
    }

    async fn ready_read(&self) -> Result<RwLockReadGuard<'_, ReadyIndex<I>>> {
        loop {
            self.ensure_ready().await?;
            let guard = self.slot.read().await;
            if let Ok(ready) = RwLockReadGuard::try_map(guard, |slot| match slot {
                IndexSlot::Ready(ready) => Some(ready),
                _ => None,
            }) {
                return Ok(ready);
            }
        }
    }

    async fn ready_write(&self) -> Result<RwLockMappedWriteGuard<'_, ReadyIndex<I>>> {
        loop {
            self.ensure_ready().await?;
            let guard = self.slot.write().await;
            if let Ok(ready) = RwLockWriteGuard::try_map(guard, |slot| match slot {
                IndexSlot::Ready(ready) => Some(ready),
                _ => None,
            }) {
                return Ok(ready);
            }
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.config.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.config.dimension,
                actual,
            });
        }
        Ok(())
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>> {
        let values = self.embedder.embed(text).await?;
        self.check_dimension(values.len())?;
        Ok(values)
    }

    /// Count one insert and save the index once the threshold is reached.
    /// A failed save keeps the debt so the next insert retries.
    fn note_insert(&self, ready: &mut ReadyIndex<I>) {
        ready.pending_saves += 1;
        if ready.pending_saves < self.config.save_threshold {
            return;
        }
        match ready.index.save(&self.config.index_path) {
            Ok(()) => {
                log::debug!(
                    "Index saved after {} inserts ({} vectors)",
                    ready.pending_saves,
                    ready.index.len()
                );
                ready.pending_saves = 0;
            }
            Err(err) => log::warn!("Failed to save index: {err}"),
        }
    }

    /// Insert pre-computed vectors. The whole batch is validated before anything is
    /// written and counts as one insert toward the save threshold.
    pub async fn add_vectors(&self, vectors: &[Vector]) -> Result<Vec<StoredId>> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        for vector in vectors {
            self.check_dimension(vector.values.len())?;
        }
        let flat: Vec<f32> = vectors
            .iter()
            .flat_map(|v| v.values.iter().copied())
            .collect();

        let mut ready = self.ready_write().await?;
        let ids = ready.index.add(&flat, vectors.len())?;
        if ids.len() != vectors.len() {
            return Err(VectorStoreError::IndexError(format!(
                "index returned {} ids for {} vectors",
                ids.len(),
                vectors.len()
            )));
        }

        for (id, vector) in ids.iter().zip(vectors) {
            if !self.metadata.put(*id, &vector.metadata).await? {
                log::debug!("No metadata stored for id {id}");
            }
        }
        self.note_insert(&mut ready);

        log::debug!("Added {} vectors", ids.len());
        Ok(ids)
    }

    /// Nearest neighbours of a raw embedding
    pub async fn search_embedding(&self, values: &[f32], top_k: usize) -> Result<Vec<SearchMatch>> {
        self.check_dimension(values.len())?;
        let ready = self.ready_read().await?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let neighbors = match ready.index.search(values, top_k) {
            Ok(neighbors) => neighbors,
            Err(err) => {
                log::warn!("Index search failed: {err}");
                return Ok(Vec::new());
            }
        };

        let mut matches = Vec::with_capacity(neighbors.len());
        for (id, score) in neighbors {
            let metadata = self.metadata.get(id).await?;
            matches.push(SearchMatch {
                id,
                score,
                metadata,
            });
        }

        log::debug!("Found {} matches", matches.len());
        Ok(matches)
    }

    pub async fn metadata(&self, id: StoredId) -> Result<Option<MetadataRecord>> {
        let _ready = self.ready_read().await?;
        self.metadata.get(id).await
    }

    /// Persist the index now and clear the unsaved-insert counter
    pub async fn flush(&self) -> Result<()> {
        let mut ready = self.ready_write().await?;
        ready.index.save(&self.config.index_path)?;
        ready.pending_saves = 0;
        Ok(())
    }

    /// Save a copy of the index to `path`; the backing file is not touched
    pub async fn export_index(&self, path: impl AsRef<Path>) -> Result<()> {
        let ready = self.ready_read().await?;
        ready.index.save(path.as_ref())?;
        log::info!("Index exported to {:?}", path.as_ref());
        Ok(())
    }

    /// Replace the in-memory index with the one stored at `path`.
    /// Metadata is left as is.
    pub async fn import_index(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut index = I::create(self.config.dimension)?;
        index.load(path.as_ref())?;

        let _init = self.init_lock.lock().await;
        *self.slot.write().await = IndexSlot::Ready(ReadyIndex {
            index,
            pending_saves: 0,
        });
        log::info!("Index imported from {:?}", path.as_ref());
        Ok(())
    }
}

#[async_trait]
impl<I: VectorIndex, M: MetadataStore> VectorStore for NativeVectorStore<I, M> {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            delete_one: false,
            local_persistence: true,
            score: ScoreKind::Distance,
        }
    }

    async fn add_vector(&self, text: &str, metadata: MetadataRecord) -> Result<StoredId> {
        self.ensure_ready().await?;
        let values = self.embed_checked(text).await?;

        let mut ready = self.ready_write().await?;
        let ids = ready.index.add(&values, 1)?;
        let [id] = ids.as_slice() else {
            log::error!("Index returned {} ids for a single insert", ids.len());
            return Err(VectorStoreError::IndexError(format!(
                "expected exactly one id, got {}",
                ids.len()
            )));
        };
        let id = *id;

        if !self.metadata.put(id, &metadata).await? {
            log::debug!("No metadata stored for id {id}");
        }
        self.note_insert(&mut ready);

        log::debug!("Vector added with id {id}");
        Ok(id)
    }

    async fn query_vector(&self, query: &str, top_k: usize) -> Result<Vec<SearchMatch>> {
        self.ensure_ready().await?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let values = self.embed_checked(query).await?;
        self.search_embedding(&values, top_k).await
    }

    async fn delete_vector(&self, id: StoredId) -> Result<()> {
        Err(VectorStoreError::Unsupported(format!(
            "cannot delete id {id}: index ids are positional; use delete_all_vectors"
        )))
    }

    async fn delete_all_vectors(&self) -> Result<()> {
        let _init = self.init_lock.lock().await;
        let mut slot = self.slot.write().await;

        // A failed save must leave the index and its metadata untouched.
        let index = I::create(self.config.dimension)?;
        index.save(&self.config.index_path)?;
        *slot = IndexSlot::Ready(ReadyIndex {
            index,
            pending_saves: 0,
        });
        self.metadata.clear().await?;

        log::info!("All vectors deleted");
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        let _init = self.init_lock.lock().await;
        let mut slot = self.slot.write().await;

        let previous = std::mem::replace(&mut *slot, IndexSlot::Destroyed);
        self.metadata.clear().await?;
        if let IndexSlot::Ready(ready) = previous {
            ready.index.save(&self.config.index_path)?;
        }

        log::info!("Vector store destroyed");
        Ok(())
    }
}
