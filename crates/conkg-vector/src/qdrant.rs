use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder,
    Distance, Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use conkg_core::error::{ConkgError, Result};
use conkg_core::vector::{ChunkHit, EmbeddedChunk, TextChunk, VectorFilter, VectorStore};

/// Chunk store backed by a Qdrant collection.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    pub fn connect(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| ConkgError::Vector(format!("Failed to create Qdrant client: {}", e)))?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    fn filter(filter: &VectorFilter) -> Option<Filter> {
        let mut conditions = Vec::new();
        if let Some(p) = &filter.project_id {
            conditions.push(Condition::matches("project_id", p.clone()));
        }
        if let Some(d) = &filter.document_id {
            conditions.push(Condition::matches("document_id", d.clone()));
        }
        if conditions.is_empty() {
            None
        } else {
            Some(Filter::must(conditions))
        }
    }
}

/// Qdrant point ids must be UUIDs; derive a stable one from the chunk id.
pub fn point_id(chunk_id: &str) -> String {
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn payload_usize(payload: &HashMap<String, Value>, key: &str) -> usize {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => (*i).max(0) as usize,
        Some(Kind::DoubleValue(d)) => d.max(0.0) as usize,
        _ => 0,
    }
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<TextChunk> {
    Some(TextChunk {
        id: payload_str(payload, "chunk_id")?,
        document_id: payload_str(payload, "document_id")?,
        project_id: payload_str(payload, "project_id").filter(|p| !p.is_empty()),
        ordinal: payload_usize(payload, "ordinal"),
        start: payload_usize(payload, "start"),
        end: payload_usize(payload, "end"),
        text: payload_str(payload, "text").unwrap_or_default(),
    })
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| ConkgError::Vector(format!("Failed to check collection: {}", e)))?;
        if exists {
            return Ok(());
        }

        tracing::info!(collection = %self.collection, dimension, "Creating Qdrant collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| ConkgError::Vector(format!("Failed to create collection: {}", e)))?;
        Ok(())
    }

    async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let n = chunks.len();
        let mut points = Vec::with_capacity(n);
        for c in chunks {
            let payload: Payload = serde_json::json!({
                "chunk_id": c.chunk.id,
                "document_id": c.chunk.document_id,
                "project_id": c.chunk.project_id.clone().unwrap_or_default(),
                "text": c.chunk.text,
                "ordinal": c.chunk.ordinal,
                "start": c.chunk.start,
                "end": c.chunk.end,
            })
            .try_into()
            .map_err(|e| ConkgError::Vector(format!("Failed to build payload: {}", e)))?;
            points.push(PointStruct::new(point_id(&c.chunk.id), c.vector, payload));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| ConkgError::Vector(format!("Failed to upsert chunks: {}", e)))?;
        tracing::debug!(collection = %self.collection, chunks = n, "Upserted chunks");
        Ok(n)
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<ChunkHit>> {
        let mut request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(f) = Self::filter(filter) {
            request = request.filter(f);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| ConkgError::Vector(format!("Failed to search chunks: {}", e)))?;

        let mut hits: Vec<ChunkHit> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(&point.payload);
                if chunk.is_none() {
                    tracing::warn!("Skipping search hit with incomplete payload");
                }
                chunk.map(|chunk| ChunkHit { chunk, score: point.score })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Filter::must([Condition::matches(
                        "document_id",
                        document_id.to_string(),
                    )]))
                    .wait(true),
            )
            .await
            .map_err(|e| ConkgError::Vector(format!("Failed to delete chunks of {}: {}", document_id, e)))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| ConkgError::Vector(format!("Failed to count chunks: {}", e)))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_uuids() {
        let a = point_id("document:a#0");
        assert_eq!(a, point_id("document:a#0"));
        assert_ne!(a, point_id("document:a#1"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn payload_round_trips_into_chunk() {
        let mut payload = HashMap::new();
        payload.insert("chunk_id".to_string(), Value::from("document:a#2".to_string()));
        payload.insert("document_id".to_string(), Value::from("document:a".to_string()));
        payload.insert("project_id".to_string(), Value::from(String::new()));
        payload.insert("ordinal".to_string(), Value::from(2i64));
        let chunk = chunk_from_payload(&payload).unwrap();
        assert_eq!(chunk.ordinal, 2);
        assert!(chunk.project_id.is_none());

        payload.remove("document_id");
        assert!(chunk_from_payload(&payload).is_none());
    }

    #[test]
    fn empty_filter_is_omitted() {
        assert!(QdrantVectorStore::filter(&VectorFilter::default()).is_none());
        assert!(QdrantVectorStore::filter(&VectorFilter::project("project:msc")).is_some());
    }

    #[tokio::test]
    #[ignore = "requires a running Qdrant instance"]
    async fn live_upsert_and_search() {
        let store = QdrantVectorStore::connect("http://localhost:6334", "conkg_test_chunks").unwrap();
        store.ensure_collection(4).await.unwrap();
        let chunk = TextChunk {
            id: "document:live#0".into(),
            document_id: "document:live".into(),
            project_id: None,
            ordinal: 0,
            start: 0,
            end: 4,
            text: "live".into(),
        };
        store
            .upsert(vec![EmbeddedChunk { chunk, vector: vec![1.0, 0.0, 0.0, 0.0] }])
            .await
            .unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 1, &VectorFilter::default()).await.unwrap();
        assert_eq!(hits[0].chunk.document_id, "document:live");
        store.delete_document("document:live").await.unwrap();
    }
}
