use crate::error::Result;
use crate::paths::{backup_path, write_atomic};
use crate::types::{MetadataRecord, StoredId, INVALID_STORED_ID};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable `StoredId -> MetadataRecord` mapping
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Returns `false` without writing when the record is empty or the id is invalid
    async fn put(&self, id: StoredId, record: &MetadataRecord) -> Result<bool>;

    async fn get(&self, id: StoredId) -> Result<Option<MetadataRecord>>;

    async fn delete(&self, id: StoredId) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// String key -> string blob storage grouped by namespace
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<()>;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    async fn remove(&self, namespace: &str, key: &str) -> Result<()>;

    async fn clear_namespace(&self, namespace: &str) -> Result<()>;
}

pub const DEFAULT_METADATA_NAMESPACE: &str = "metadata_index";
const KEY_PREFIX: &str = "metadata_";

/// [`MetadataStore`] over any [`KeyValueBackend`], one JSON blob per id
pub struct KeyValueMetadataStore<B> {
    backend: B,
    namespace: String,
}

impl<B: KeyValueBackend> KeyValueMetadataStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, DEFAULT_METADATA_NAMESPACE)
    }

    pub fn with_namespace(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(id: StoredId) -> String {
        format!("{KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl<B: KeyValueBackend> MetadataStore for KeyValueMetadataStore<B> {
    async fn put(&self, id: StoredId, record: &MetadataRecord) -> Result<bool> {
        if record.is_empty() || id == INVALID_STORED_ID {
            return Ok(false);
        }
        let blob = serde_json::to_string(record)?;
        self.backend.put(&self.namespace, &Self::key(id), blob).await?;
        Ok(true)
    }

    async fn get(&self, id: StoredId) -> Result<Option<MetadataRecord>> {
        let Some(blob) = self.backend.get(&self.namespace, &Self::key(id)).await? else {
            return Ok(None);
        };
        if blob.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&blob) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                log::warn!("Unreadable metadata for id {id}: {err}");
                Ok(None)
            }
        }
    }

    async fn delete(&self, id: StoredId) -> Result<()> {
        self.backend.remove(&self.namespace, &Self::key(id)).await
    }

    async fn clear(&self) -> Result<()> {
        self.backend.clear_namespace(&self.namespace).await
    }
}

/// Process-local backend
#[derive(Default)]
pub struct MemoryBackend {
    namespaces: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<()> {
        self.namespaces
            .lock()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .namespaces
            .lock()
            .await
            .get(namespace)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        if let Some(entries) = self.namespaces.lock().await.get_mut(namespace) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<()> {
        self.namespaces.lock().await.remove(namespace);
        Ok(())
    }
}

/// One JSON object file per namespace under `base_dir`, rewritten atomically on
/// every mutation.
pub struct JsonFileBackend {
    base_dir: PathBuf,
    cache: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl JsonFileBackend {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", safe_component(namespace)))
    }

    async fn read_namespace(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        let path = self.namespace_path(namespace);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => match serde_json::from_str(&data) {
                Ok(entries) => Ok(entries),
                Err(err) => {
                    let backup = backup_path(&path);
                    log::warn!(
                        "Unreadable metadata file {path:?} ({err}); moving it to {backup:?} and starting empty"
                    );
                    tokio::fs::rename(&path, &backup).await?;
                    Ok(BTreeMap::new())
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_namespace(
        &self,
        namespace: &str,
        entries: &BTreeMap<String, String>,
    ) -> Result<()> {
        let path = self.namespace_path(namespace);
        let data = serde_json::to_vec_pretty(entries)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))??;
        Ok(())
    }

    /// Mutate a namespace under the cache lock and persist it before releasing.
    async fn update<F>(&self, namespace: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send,
    {
        let mut cache = self.cache.lock().await;
        if !cache.contains_key(namespace) {
            let loaded = self.read_namespace(namespace).await?;
            cache.insert(namespace.to_string(), loaded);
        }
        let Some(entries) = cache.get_mut(namespace) else {
            return Ok(());
        };
        if mutate(entries) {
            self.write_namespace(namespace, entries).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueBackend for JsonFileBackend {
    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<()> {
        self.update(namespace, |entries| {
            entries.insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let mut cache = self.cache.lock().await;
        if !cache.contains_key(namespace) {
            let loaded = self.read_namespace(namespace).await?;
            cache.insert(namespace.to_string(), loaded);
        }
        Ok(cache
            .get(namespace)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.update(namespace, |entries| entries.remove(key).is_some())
            .await
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;
        cache.insert(namespace.to_string(), BTreeMap::new());
        match tokio::fs::remove_file(self.namespace_path(namespace)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn safe_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}
