use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use conkg_core::error::{ConkgError, Result};
use conkg_core::vector::{cosine_similarity, ChunkHit, EmbeddedChunk, VectorFilter, VectorStore};

#[derive(Default)]
struct Collection {
    dimension: Option<usize>,
    chunks: HashMap<String, EmbeddedChunk>,
}

/// Brute-force cosine search over chunks held in memory.
#[derive(Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Collection>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_dim(dimension: Option<usize>, len: usize) -> Result<()> {
        match dimension {
            Some(d) if d != len => Err(ConkgError::Validation(format!(
                "vector dimension {len} does not match collection dimension {d}"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.dimension {
            Some(d) if d != dimension => Err(ConkgError::Validation(format!(
                "collection already has dimension {d}, requested {dimension}"
            ))),
            _ => {
                inner.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize> {
        let mut inner = self.inner.write().await;
        for c in &chunks {
            Self::check_dim(inner.dimension, c.vector.len())?;
        }
        if inner.dimension.is_none() {
            inner.dimension = chunks.first().map(|c| c.vector.len());
        }
        let n = chunks.len();
        for c in chunks {
            inner.chunks.insert(c.chunk.id.clone(), c);
        }
        Ok(n)
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<ChunkHit>> {
        let inner = self.inner.read().await;
        Self::check_dim(inner.dimension, vector.len())?;

        let mut hits: Vec<ChunkHit> = inner
            .chunks
            .values()
            .filter(|c| filter.matches(&c.chunk))
            .map(|c| ChunkHit {
                chunk: c.chunk.clone(),
                score: cosine_similarity(vector, &c.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.chunks.retain(|_, c| c.chunk.document_id != document_id);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.read().await.chunks.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conkg_core::vector::TextChunk;

    fn chunk(doc: &str, ordinal: usize, project: Option<&str>, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: TextChunk {
                id: TextChunk::chunk_id(doc, ordinal),
                document_id: doc.to_string(),
                project_id: project.map(str::to_string),
                ordinal,
                start: 0,
                end: 1,
                text: format!("{doc} {ordinal}"),
            },
            vector,
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_filters() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(2).await.unwrap();
        store
            .upsert(vec![
                chunk("document:a", 0, Some("p1"), vec![1.0, 0.0]),
                chunk("document:a", 1, Some("p1"), vec![0.7, 0.7]),
                chunk("document:b", 0, Some("p2"), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, &VectorFilter::default()).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["document:a#0", "document:a#1", "document:b#0"]);

        let hits = store.search(&[1.0, 0.0], 10, &VectorFilter::project("p2")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, "document:b");
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_chunk_id() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                chunk("document:z", 0, None, vec![1.0, 0.0]),
                chunk("document:m", 0, None, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 1, &VectorFilter::default()).await.unwrap();
        assert_eq!(hits[0].chunk.id, "document:m#0");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(3).await.unwrap();
        assert!(matches!(
            store.upsert(vec![chunk("document:a", 0, None, vec![1.0])]).await,
            Err(ConkgError::Validation(_))
        ));
        assert!(store.search(&[1.0], 5, &VectorFilter::default()).await.is_err());
        assert!(store.ensure_collection(4).await.is_err());
    }

    #[tokio::test]
    async fn delete_document_removes_its_chunks() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                chunk("document:a", 0, None, vec![1.0, 0.0]),
                chunk("document:a", 1, None, vec![1.0, 0.0]),
                chunk("document:b", 0, None, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        store.delete_document("document:a").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
