use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use conkg_core::config::AppConfig;
use conkg_core::error::{ConkgError, Result};
use conkg_core::vector::{normalize, Embedder};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic local embedder: signed feature hashing of word unigrams and bigrams.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let idx = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign * weight;
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0; self.dim];
        let tokens = Self::tokens(text);
        for token in &tokens {
            self.add_feature(&mut vec, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vec, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dim: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dim,
        })
    }

    fn url(&self) -> String {
        if self.endpoint.ends_with("/embeddings") {
            self.endpoint.clone()
        } else {
            format!("{}/embeddings", self.endpoint)
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(model = %self.model, count = texts.len(), "Requesting embeddings");

        let mut request = self.client.post(self.url()).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConkgError::Embedding(format!("HTTP request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(ConkgError::Embedding(format!(
                "Embedding endpoint returned status {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ConkgError::Embedding(format!("Failed to parse embedding response: {e}")))?;
        order_embeddings(parsed.data, texts.len(), self.dim)
    }
}

fn order_embeddings(data: Vec<EmbeddingData>, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(ConkgError::Embedding(format!(
            "Expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    let mut out: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        if item.embedding.len() != dim {
            return Err(ConkgError::Embedding(format!(
                "Embedding dimension {} does not match configured {dim}",
                item.embedding.len()
            )));
        }
        let slot = out
            .get_mut(item.index)
            .ok_or_else(|| ConkgError::Embedding(format!("Embedding index {} out of range", item.index)))?;
        *slot = Some(item.embedding);
    }
    out.into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| ConkgError::Embedding(format!("Missing embedding for input {i}"))))
        .collect()
}

/// HTTP embedder when an endpoint is configured, hashing embedder otherwise.
pub fn embedder_from_config(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    match &config.embedding_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, model = %config.embedding_model, "Using HTTP embedder");
            Ok(Arc::new(HttpEmbedder::new(
                endpoint.clone(),
                config.embedding_api_key.clone(),
                config.embedding_model.clone(),
                config.embedding_dim,
            )?))
        }
        None => {
            tracing::info!(dim = config.embedding_dim, "Using local hashing embedder");
            Ok(Arc::new(HashingEmbedder::new(config.embedding_dim)))
        }
    }
}
