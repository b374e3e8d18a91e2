//! Qdrant-backed vector store, speaking the REST surface directly.
//!
//! A missing collection is a typed outcome here, not an exception: the
//! adapter probes before the first write, provisions from the first
//! record's dimension, and retries a mid-write miss exactly once.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{VectorError, VectorResult};
use crate::traits::vector::VectorStore;
use crate::types::config::VectorStoreConfig;
use crate::types::vector::{
    CollectionSpec, DistanceMetric, EnsureOutcome, PayloadFilter, ScoredRecord, UpsertReport,
    VectorRecord,
};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Debug, Deserialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Map<String, Value>,
}

fn transport(error: reqwest::Error) -> VectorError {
    VectorError::Transport(Box::new(error))
}

fn backend(context: &str, status: StatusCode) -> VectorError {
    VectorError::Backend {
        message: format!("{}: HTTP {}", context, status),
    }
}

/// Vector store adapter for a Qdrant endpoint.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    config: VectorStoreConfig,
}

impl QdrantVectorStore {
    pub fn new(config: VectorStoreConfig) -> VectorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.config.url, path));
        if let Some(key) = &self.config.api_key {
            request = request.header("api-key", key.expose());
        }
        request
    }

    /// Schema of an existing collection, or `None` when absent.
    async fn collection_spec(&self, name: &str) -> VectorResult<Option<CollectionSpec>> {
        let response = self
            .request(Method::GET, &format!("/collections/{}", name))
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(backend("collection info", response.status()));
        }

        let info: ApiResponse<CollectionInfo> = response.json().await.map_err(transport)?;
        let params = info.result.config.params.vectors;
        let metric =
            DistanceMetric::parse(&params.distance).ok_or_else(|| VectorError::Backend {
                message: format!("unknown distance metric: {}", params.distance),
            })?;
        Ok(Some(CollectionSpec::new(name, params.size, metric)))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> VectorResult<()> {
        let body = json!({
            "vectors": { "size": spec.dimension, "distance": spec.metric.as_str() }
        });

        let response = self
            .request(Method::PUT, &format!("/collections/{}", spec.name))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(backend("collection create", response.status()));
        }
        info!(collection = %spec.name, schema = %spec.describe(), "vector collection created");
        Ok(())
    }

    async fn write_chunk(&self, collection: &str, chunk: &[VectorRecord]) -> VectorResult<()> {
        let points: Vec<Value> = chunk
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "vector": record.vector,
                    "payload": record.payload,
                })
            })
            .collect();

        let response = self
            .request(
                Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VectorError::CollectionNotFound {
                collection: collection.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(backend("points upsert", response.status()));
        }
        Ok(())
    }
}

fn wire_filter(filter: &PayloadFilter) -> Value {
    let must: Vec<Value> = filter
        .fields()
        .iter()
        .map(|(key, value)| json!({ "key": key, "match": { "value": value } }))
        .collect();
    json!({ "must": must })
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> VectorResult<EnsureOutcome> {
        match self.collection_spec(&spec.name).await? {
            Some(existing)
                if existing.dimension == spec.dimension && existing.metric == spec.metric =>
            {
                Ok(EnsureOutcome::AlreadyPresent)
            }
            Some(existing) => Err(VectorError::SchemaMismatch {
                collection: spec.name.clone(),
                existing: existing.describe(),
                requested: spec.describe(),
            }),
            None => {
                self.create_collection(spec).await?;
                Ok(EnsureOutcome::Created)
            }
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        records: &[VectorRecord],
    ) -> VectorResult<UpsertReport> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let inferred = CollectionSpec::new(collection, records[0].vector.len(), self.config.metric);
        let mut report = UpsertReport::default();

        if self.collection_spec(collection).await?.is_none() {
            self.create_collection(&inferred).await?;
            report.provisioned = true;
        }

        for (index, chunk) in records.chunks(self.config.chunk_size).enumerate() {
            report.chunks += 1;
            match self.write_chunk(collection, chunk).await {
                Ok(()) => report.upserted += chunk.len(),
                Err(VectorError::CollectionNotFound { .. }) if !report.provisioned => {
                    // The collection disappeared between probe and write;
                    // provision and retry this chunk once. A second miss
                    // is surfaced below.
                    warn!(collection, chunk = index, "collection missing mid-write, provisioning and retrying");
                    self.create_collection(&inferred).await?;
                    report.provisioned = true;
                    self.write_chunk(collection, chunk).await?;
                    report.upserted += chunk.len();
                }
                Err(error @ VectorError::CollectionNotFound { .. }) => return Err(error),
                Err(error) => {
                    warn!(collection, chunk = index, error = %error, "chunk upsert failed");
                    report.failed_chunks.push(index);
                }
            }
        }

        Ok(report)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> VectorResult<Vec<ScoredRecord>> {
        let mut body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = wire_filter(filter);
        }

        let response = self
            .request(
                Method::POST,
                &format!("/collections/{}/points/search", collection),
            )
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VectorError::CollectionNotFound {
                collection: collection.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(backend("points search", response.status()));
        }

        let hits: ApiResponse<Vec<SearchHit>> = response.json().await.map_err(transport)?;
        let mut records = Vec::with_capacity(hits.result.len());
        for hit in hits.result {
            let id = hit
                .id
                .as_str()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| VectorError::Backend {
                    message: format!("point id is not a UUID: {}", hit.id),
                })?;
            records.push(ScoredRecord {
                id,
                score: hit.score,
                payload: hit.payload,
            });
        }

        // The server already ranks hits; a stable re-sort keeps returned
        // order deterministic for tied scores.
        records.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SecretString;

    #[test]
    fn test_wire_filter_shape() {
        let filter = PayloadFilter::new().eq("platform", "github");
        let wire = wire_filter(&filter);
        assert_eq!(
            wire,
            json!({ "must": [ { "key": "platform", "match": { "value": "github" } } ] })
        );
    }

    #[test]
    fn test_store_construction() {
        let config = VectorStoreConfig::new("http://localhost:6333")
            .with_api_key(SecretString::new("key"));
        assert!(QdrantVectorStore::new(config).is_ok());
    }

    #[test]
    fn test_search_hit_deserializes() {
        let raw = json!({
            "id": "5f4d9b2e-1111-4222-8333-444455556666",
            "score": 0.87,
            "payload": { "platform": "github" }
        });
        let hit: SearchHit = serde_json::from_value(raw).unwrap();
        assert_eq!(hit.score, 0.87);
        assert_eq!(hit.payload["platform"], "github");
    }

    #[test]
    fn test_collection_info_deserializes() {
        let raw = json!({
            "result": {
                "config": {
                    "params": {
                        "vectors": { "size": 384, "distance": "Cosine" }
                    }
                }
            }
        });
        let info: ApiResponse<CollectionInfo> = serde_json::from_value(raw).unwrap();
        assert_eq!(info.result.config.params.vectors.size, 384);
    }
}
