use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A slice of a document's text, positioned by byte offsets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    pub id: String,
    pub document_id: String,
    pub project_id: Option<String>,
    pub ordinal: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl TextChunk {
    pub fn chunk_id(document_id: &str, ordinal: usize) -> String {
        format!("{document_id}#{ordinal}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: TextChunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub chunk: TextChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFilter {
    pub project_id: Option<String>,
    pub document_id: Option<String>,
}

impl VectorFilter {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            document_id: None,
        }
    }

    pub fn matches(&self, chunk: &TextChunk) -> bool {
        if let Some(p) = &self.project_id {
            if chunk.project_id.as_deref() != Some(p.as_str()) {
                return false;
            }
        }
        if let Some(d) = &self.document_id {
            if &chunk.document_id != d {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.document_id.is_none()
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;
    fn dimension(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| crate::error::ConkgError::Embedding("embedder returned no vectors".into()))
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> &'static str;
    async fn ensure_collection(&self, dimension: usize) -> Result<()>;
    async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize>;
    async fn search(&self, vector: &[f32], limit: usize, filter: &VectorFilter) -> Result<Vec<ChunkHit>>;
    async fn delete_document(&self, document_id: &str) -> Result<()>;
    async fn count(&self) -> Result<u64>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
