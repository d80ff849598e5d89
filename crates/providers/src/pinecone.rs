use crate::error::{ProviderError, Result};
use crate::http::{build_client, check_status, endpoint, require_key, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use rag_vector_store::{
    EmbeddingProvider, MetadataRecord, ScoreKind, SearchMatch, StoreCapabilities, StoredId,
    VectorStore, VectorStoreError,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PineconeConfig {
    /// Index host, e.g. `https://my-index-abc123.svc.us-east1-aws.pinecone.io`
    pub index_host: String,
    pub api_key: String,
    pub namespace: Option<String>,
    pub timeout: Duration,
}

impl PineconeConfig {
    pub fn new(index_host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            index_host: index_host.into(),
            api_key: api_key.into(),
            namespace: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<VectorRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct VectorRecord<'a> {
    id: String,
    values: &'a [f32],
    #[serde(skip_serializing_if = "is_empty_record")]
    metadata: &'a MetadataRecord,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_empty_record(record: &&MetadataRecord) -> bool {
    record.is_empty()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    delete_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

/// Vector store backed by a Pinecone index over its REST API.
///
/// Scores are similarities (larger is closer). Ids are minted locally from a
/// counter seeded with the current time, so separate runs do not collide.
pub struct PineconeVectorStore {
    client: Client,
    config: PineconeConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    next_id: AtomicI64,
}

impl PineconeVectorStore {
    pub fn new(config: PineconeConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        require_key(&config.api_key, "Pinecone")?;
        if config.index_host.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(
                "Pinecone index host is missing".to_string(),
            ));
        }
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX / 1000) * 1000)
            .unwrap_or(0);

        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            embedder,
            next_id: AtomicI64::new(seed),
        })
    }

    fn namespace(&self) -> Option<&str> {
        self.config.namespace.as_deref()
    }

    async fn embed_checked(&self, text: &str) -> rag_vector_store::Result<Vec<f32>> {
        let values = self.embedder.embed(text).await?;
        if values.len() != self.embedder.dimension() {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.embedder.dimension(),
                actual: values.len(),
            });
        }
        Ok(values)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(endpoint(&self.config.index_host, path))
            .header("Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn delete(&self, request: &DeleteRequest<'_>) -> Result<()> {
        self.post("vectors/delete", request).await?;
        Ok(())
    }
}

fn metadata_to_strings(metadata: BTreeMap<String, Value>) -> MetadataRecord {
    metadata
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

/// Matches with integer ids, in the order the service ranked them
fn into_matches(response: QueryResponse) -> Vec<SearchMatch> {
    response
        .matches
        .into_iter()
        .filter_map(|m| match m.id.parse::<StoredId>() {
            Ok(id) => Some(SearchMatch {
                id,
                score: m.score,
                metadata: m.metadata.map(metadata_to_strings),
            }),
            Err(_) => {
                log::warn!("Skipping Pinecone match with non-numeric id {:?}", m.id);
                None
            }
        })
        .collect()
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            delete_one: true,
            local_persistence: false,
            score: ScoreKind::Similarity,
        }
    }

    async fn add_vector(&self, text: &str, metadata: MetadataRecord) -> rag_vector_store::Result<StoredId> {
        let values = self.embed_checked(text).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let request = UpsertRequest {
            vectors: vec![VectorRecord {
                id: id.to_string(),
                values: &values,
                metadata: &metadata,
            }],
            namespace: self.namespace(),
        };
        self.post("vectors/upsert", &request).await?;

        log::debug!("Upserted vector {id}");
        Ok(id)
    }

    async fn query_vector(&self, query: &str, top_k: usize) -> rag_vector_store::Result<Vec<SearchMatch>> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let values = self.embed_checked(query).await?;

        let request = QueryRequest {
            vector: &values,
            top_k,
            include_metadata: true,
            namespace: self.namespace(),
        };
        let response: QueryResponse = self
            .post("query", &request)
            .await?
            .json()
            .await
            .map_err(ProviderError::from)?;

        let matches = into_matches(response);
        log::debug!("Pinecone returned {} matches", matches.len());
        Ok(matches)
    }

    async fn delete_vector(&self, id: StoredId) -> rag_vector_store::Result<()> {
        self.delete(&DeleteRequest {
            ids: Some(vec![id.to_string()]),
            delete_all: false,
            namespace: self.namespace(),
        })
        .await?;
        Ok(())
    }

    async fn delete_all_vectors(&self) -> rag_vector_store::Result<()> {
        self.delete(&DeleteRequest {
            ids: None,
            delete_all: true,
            namespace: self.namespace(),
        })
        .await?;
        log::info!("All Pinecone vectors deleted");
        Ok(())
    }

    async fn destroy(&self) -> rag_vector_store::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rag_vector_store::StubEmbedder;
    use serde_json::json;

    #[test]
    fn upsert_request_shape() {
        let metadata = MetadataRecord::from([("chunk".to_string(), "Ceres".to_string())]);
        let request = UpsertRequest {
            vectors: vec![VectorRecord {
                id: "17".to_string(),
                values: &[0.5, 0.25],
                metadata: &metadata,
            }],
            namespace: Some("mail"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "vectors": [{"id": "17", "values": [0.5, 0.25], "metadata": {"chunk": "Ceres"}}],
                "namespace": "mail"
            })
        );
    }

    #[test]
    fn query_and_delete_requests_use_camel_case() {
        let query = QueryRequest {
            vector: &[1.0],
            top_k: 3,
            include_metadata: true,
            namespace: None,
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"vector": [1.0], "topK": 3, "includeMetadata": true})
        );

        let delete_all = DeleteRequest {
            ids: None,
            delete_all: true,
            namespace: None,
        };
        assert_eq!(serde_json::to_value(&delete_all).unwrap(), json!({"deleteAll": true}));

        let delete_one = DeleteRequest {
            ids: Some(vec!["4".to_string()]),
            delete_all: false,
            namespace: Some("mail"),
        };
        assert_eq!(
            serde_json::to_value(&delete_one).unwrap(),
            json!({"ids": ["4"], "namespace": "mail"})
        );
    }

    #[test]
    fn query_response_skips_foreign_ids_and_stringifies_metadata() {
        let response: QueryResponse = serde_json::from_value(json!({
            "matches": [
                {"id": "12", "score": 0.91, "metadata": {"chunk": "Pluto", "page": 3}},
                {"id": "doc-a", "score": 0.80},
                {"id": "7", "score": 0.42}
            ],
            "namespace": ""
        }))
        .unwrap();

        let matches = into_matches(response);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, 12);
        assert_eq!(
            matches[0].metadata,
            Some(MetadataRecord::from([
                ("chunk".to_string(), "Pluto".to_string()),
                ("page".to_string(), "3".to_string()),
            ]))
        );
        assert_eq!(matches[1].id, 7);
        assert_eq!(matches[1].metadata, None);
    }

    #[tokio::test]
    async fn capabilities_and_blank_query() {
        let store = PineconeVectorStore::new(
            PineconeConfig::new("http://127.0.0.1:9", "pc-key"),
            Arc::new(StubEmbedder::new(4).unwrap()),
        )
        .unwrap();

        let caps = store.capabilities();
        assert!(caps.delete_one);
        assert!(!caps.local_persistence);
        assert_eq!(caps.score, ScoreKind::Similarity);
        assert!(store.query_vector("  ", 3).await.unwrap().is_empty());
        store.destroy().await.unwrap();
    }

    #[test]
    fn missing_key_or_host_is_rejected() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(StubEmbedder::new(4).unwrap());
        assert!(PineconeVectorStore::new(PineconeConfig::new("http://x", ""), embedder.clone()).is_err());
        assert!(PineconeVectorStore::new(PineconeConfig::new(" ", "key"), embedder).is_err());
    }
}
