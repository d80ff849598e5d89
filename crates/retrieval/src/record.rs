use rag_vector_store::MetadataRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SOURCE_ID_KEY: &str = "source_id";
pub const OWNER_KEY: &str = "owner";
pub const SUBJECT_KEY: &str = "subject";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const CHUNK_KEY: &str = "chunk";

const RESERVED_KEYS: [&str; 5] = [SOURCE_ID_KEY, OWNER_KEY, SUBJECT_KEY, TIMESTAMP_KEY, CHUNK_KEY];

/// Describes the document a chunk came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source_id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SourceMetadata {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Record for one chunk of this source
    pub fn chunk_record(&self, chunk: &str) -> ChunkRecord {
        ChunkRecord {
            source_id: self.source_id.clone(),
            owner: self.owner.clone(),
            subject: self.subject.clone(),
            timestamp: self.timestamp.clone(),
            chunk: chunk.to_string(),
            extra: self.extra.clone(),
        }
    }
}

/// Typed view of the metadata stored next to each chunk vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub source_id: String,
    pub owner: Option<String>,
    pub subject: Option<String>,
    pub timestamp: Option<String>,
    pub chunk: String,
    pub extra: BTreeMap<String, String>,
}

impl ChunkRecord {
    /// `None` when the record carries no chunk text
    pub fn from_metadata(record: &MetadataRecord) -> Option<Self> {
        let chunk = record.get(CHUNK_KEY).filter(|c| !c.trim().is_empty())?;
        let non_empty = |key: &str| record.get(key).filter(|v| !v.is_empty()).cloned();

        Some(Self {
            source_id: record.get(SOURCE_ID_KEY).cloned().unwrap_or_default(),
            owner: non_empty(OWNER_KEY),
            subject: non_empty(SUBJECT_KEY),
            timestamp: non_empty(TIMESTAMP_KEY),
            chunk: chunk.clone(),
            extra: record
                .iter()
                .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        })
    }

    pub fn to_metadata(&self) -> MetadataRecord {
        // Reserved keys win over extras with the same name.
        let mut record: MetadataRecord = self.extra.clone();
        record.insert(SOURCE_ID_KEY.to_string(), self.source_id.clone());
        for (key, value) in [
            (OWNER_KEY, &self.owner),
            (SUBJECT_KEY, &self.subject),
            (TIMESTAMP_KEY, &self.timestamp),
        ] {
            if let Some(value) = value {
                record.insert(key.to_string(), value.clone());
            }
        }
        record.insert(CHUNK_KEY.to_string(), self.chunk.clone());
        record
    }

    /// Text handed to the embedder: `"<chunk> in <subject> at <timestamp>"`,
    /// dropping the parts that are absent.
    pub fn embedding_text(&self) -> String {
        let mut text = self.chunk.clone();
        if let Some(subject) = &self.subject {
            text.push_str(" in ");
            text.push_str(subject);
        }
        if let Some(timestamp) = &self.timestamp {
            text.push_str(" at ");
            text.push_str(timestamp);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source() -> SourceMetadata {
        SourceMetadata::new("msg-42")
            .with_owner("7")
            .with_subject("Mission notes")
            .with_timestamp("2024-03-01 09:30")
            .with_extra("folder", "inbox")
    }

    #[test]
    fn metadata_roundtrip() {
        let record = source().chunk_record("Jupiter has 95 known moons.");
        let map = record.to_metadata();
        assert_eq!(map.get(CHUNK_KEY).map(String::as_str), Some("Jupiter has 95 known moons."));
        assert_eq!(map.get("folder").map(String::as_str), Some("inbox"));
        assert_eq!(ChunkRecord::from_metadata(&map), Some(record));
    }

    #[test]
    fn embedding_text_includes_subject_and_timestamp() {
        let record = source().chunk_record("Jupiter has 95 known moons.");
        assert_eq!(
            record.embedding_text(),
            "Jupiter has 95 known moons. in Mission notes at 2024-03-01 09:30"
        );

        let bare = SourceMetadata::new("x").chunk_record("plain");
        assert_eq!(bare.embedding_text(), "plain");
    }

    #[test]
    fn missing_or_blank_chunk_is_unresolvable() {
        let mut map = source().chunk_record("text").to_metadata();
        map.insert(CHUNK_KEY.to_string(), "  ".to_string());
        assert_eq!(ChunkRecord::from_metadata(&map), None);

        map.remove(CHUNK_KEY);
        assert_eq!(ChunkRecord::from_metadata(&map), None);
    }

    #[test]
    fn empty_optional_fields_read_as_none() {
        let map = MetadataRecord::from([
            (CHUNK_KEY.to_string(), "body".to_string()),
            (SUBJECT_KEY.to_string(), String::new()),
        ]);
        let record = ChunkRecord::from_metadata(&map).unwrap();
        assert_eq!(record.subject, None);
        assert_eq!(record.source_id, "");
        assert!(record.extra.is_empty());
    }
}
