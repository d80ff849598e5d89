use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier assigned by the index on insertion
pub type StoredId = i64;

/// Sentinel for "no id"
pub const INVALID_STORED_ID: StoredId = -1;

/// Loosely typed metadata attached to one stored vector
pub type MetadataRecord = BTreeMap<String, String>;

/// A pre-computed embedding plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vector {
    pub id: Option<String>,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: MetadataRecord,
}

impl Vector {
    pub fn new(values: Vec<f32>, metadata: MetadataRecord) -> Self {
        Self {
            id: None,
            values,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchMatch {
    pub id: StoredId,
    /// Index-native score; see [`ScoreKind`] for its direction
    pub score: f32,
    pub metadata: Option<MetadataRecord>,
}

/// How a store's scores rank results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Smaller is closer; results ascend
    Distance,
    /// Larger is closer; results descend
    Similarity,
}

/// Optional operations a store variant supports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// `delete_vector` removes a single id
    pub delete_one: bool,
    /// The index lives in a local file that can be exported and imported
    pub local_persistence: bool,
    pub score: ScoreKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreLifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

/// Snapshot of a native store's index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexState {
    pub dimension: usize,
    pub initialized: bool,
    pub pending_unsaved_inserts: usize,
    pub backing_file_path: PathBuf,
    pub vector_count: usize,
}
