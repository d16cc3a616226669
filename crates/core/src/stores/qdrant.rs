use crate::error::StoreError;
use crate::models::IndexedRecord;
use crate::store::StoreMatch;
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "qdrant";

pub struct QdrantStore {
    base: Url,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            base: Url::parse(&format!("{}/", endpoint.trim_end_matches('/')))?,
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        let relative = if path.is_empty() {
            format!("collections/{}", self.collection)
        } else {
            format!("collections/{}/{}", self.collection, path)
        };
        Ok(self.base.join(&relative)?)
    }

    /// Creates the collection with cosine distance when it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let response = self.client.get(self.url("")?).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response).await);
        }

        let response = self
            .client
            .put(self.url("")?)
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        info!(collection = %self.collection, vector_size = self.vector_size, "created qdrant collection");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<(), StoreError> {
        let points = records
            .iter()
            .map(|record| {
                if record.embedding.len() != self.vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        record.embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&record.chunk.id),
                    "vector": record.embedding,
                    "payload": {
                        "chunk_id": record.chunk.id,
                        "text": record.chunk.text,
                        "page": record.chunk.page,
                    },
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let mut url = self.url("points")?;
        url.set_query(Some("wait=true"));
        let response = self
            .client
            .put(url)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        debug!(collection = %self.collection, points = records.len(), "upserted points");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreMatch>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "query vector dim {} is not {}",
                vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(self.url("points/search")?)
            .json(&json!({
                "vector": vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let parsed: Value = response.json().await?;
        Ok(parse_search_hits(&parsed))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .client
            .post(self.url("points/count")?)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "count response missing result.count".to_string(),
            })
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let response = self.client.delete(self.url("")?).send().await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response).await);
        }
        info!(collection = %self.collection, "dropped qdrant collection");
        self.ensure_collection().await
    }

    fn name(&self) -> &str {
        &self.collection
    }
}

/// Qdrant only accepts unsigned integers or UUIDs as point ids, so chunk ids
/// are hashed into a stable u64.
pub fn point_id(chunk_id: &str) -> u64 {
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn parse_search_hits(parsed: &Value) -> Vec<StoreMatch> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| {
            let id = hit
                .pointer("/payload/chunk_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| hit.pointer("/id").map(|id| id.to_string()))
                .unwrap_or_default();
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .map(str::to_string);
            let distance = hit
                .pointer("/score")
                .and_then(Value::as_f64)
                .map(|score| (1.0 - score) as f32);
            let page = hit
                .pointer("/payload/page")
                .and_then(Value::as_u64)
                .and_then(|page| u32::try_from(page).ok());

            StoreMatch {
                id,
                text,
                distance,
                page,
            }
        })
        .collect()
}

async fn backend_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_and_distinct() {
        assert_eq!(point_id("page1_chunk0"), point_id("page1_chunk0"));
        assert_ne!(point_id("page1_chunk0"), point_id("page1_chunk1"));
    }

    #[test]
    fn search_hits_convert_scores_to_distances() {
        let parsed = json!({
            "result": [
                {"id": 7, "score": 0.75, "payload": {"chunk_id": "page2_chunk0", "text": "near", "page": 2}},
                {"id": 9, "score": 0.25, "payload": {}}
            ]
        });

        let hits = parse_search_hits(&parsed);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "page2_chunk0");
        assert_eq!(hits[0].text.as_deref(), Some("near"));
        assert_eq!(hits[0].distance, Some(0.25));
        assert_eq!(hits[0].page, Some(2));
        assert_eq!(hits[1].id, "9");
        assert_eq!(hits[1].text, None);
        assert_eq!(hits[1].page, None);
    }

    #[test]
    fn search_without_result_is_empty() {
        assert!(parse_search_hits(&json!({"status": "ok"})).is_empty());
    }

    #[test]
    fn collection_urls_are_joined_under_base() -> Result<(), StoreError> {
        let store = QdrantStore::new("http://localhost:6333/", "docs", 4)?;
        assert_eq!(
            store.url("points/search")?.as_str(),
            "http://localhost:6333/collections/docs/points/search"
        );
        Ok(())
    }
}
