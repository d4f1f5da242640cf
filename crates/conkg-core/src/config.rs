use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConkgError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    /// Neo4j when reachable, in-memory otherwise.
    Auto,
    Neo4j,
    Memory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// Qdrant when `QDRANT_URL` is set, in-memory otherwise.
    Auto,
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub graph_backend: GraphBackend,
    pub qdrant_url: Option<String>,
    pub qdrant_collection: String,
    pub vector_backend: VectorBackend,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub ingest_concurrency: usize,
    pub qa_top_k: usize,
    /// Passages scoring at or below this cosine similarity are not evidence.
    pub qa_min_vector_score: f32,
    pub data_dir: PathBuf,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let num = |key: &str, default: usize| {
            get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            neo4j_uri: get("NEO4J_URI").unwrap_or_else(|| "bolt://localhost:7687".into()),
            neo4j_user: get("NEO4J_USERNAME")
                .or_else(|| get("NEO4J_USER"))
                .unwrap_or_else(|| "neo4j".into()),
            neo4j_password: get("NEO4J_PASSWORD").unwrap_or_else(|| "password123".into()),
            graph_backend: match get("GRAPH_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
                Some("neo4j") => GraphBackend::Neo4j,
                Some("memory") => GraphBackend::Memory,
                _ => GraphBackend::Auto,
            },
            qdrant_url: get("QDRANT_URL"),
            qdrant_collection: get("QDRANT_COLLECTION")
                .unwrap_or_else(|| "construction_chunks".into()),
            vector_backend: match get("VECTOR_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
                Some("qdrant") => VectorBackend::Qdrant,
                Some("memory") => VectorBackend::Memory,
                _ => VectorBackend::Auto,
            },
            embedding_endpoint: get("EMBEDDING_ENDPOINT"),
            embedding_api_key: get("EMBEDDING_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "all-MiniLM-L6-v2".into()),
            embedding_dim: num("EMBEDDING_DIM", 384),
            chunk_size: num("CHUNK_SIZE", 1000),
            chunk_overlap: num("CHUNK_OVERLAP", 200),
            embed_batch_size: num("EMBED_BATCH_SIZE", 32),
            ingest_concurrency: num("INGEST_CONCURRENCY", 4),
            qa_top_k: num("QA_TOP_K", 8),
            qa_min_vector_score: get("QA_MIN_VECTOR_SCORE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0.05),
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: get("SERVER_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(8080),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ConkgError::Config("CHUNK_SIZE must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConkgError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        for (key, value) in [
            ("EMBEDDING_DIM", self.embedding_dim),
            ("EMBED_BATCH_SIZE", self.embed_batch_size),
            ("INGEST_CONCURRENCY", self.ingest_concurrency),
            ("QA_TOP_K", self.qa_top_k),
        ] {
            if value == 0 {
                return Err(ConkgError::Config(format!("{key} must be greater than zero")));
            }
        }

        if !(0.0..1.0).contains(&self.qa_min_vector_score) {
            return Err(ConkgError::Config(format!(
                "QA_MIN_VECTOR_SCORE ({}) must be in [0, 1)",
                self.qa_min_vector_score
            )));
        }

        check_url("NEO4J_URI", &self.neo4j_uri)?;
        if let Some(u) = &self.qdrant_url {
            check_url("QDRANT_URL", u)?;
        }
        if let Some(u) = &self.embedding_endpoint {
            check_url("EMBEDDING_ENDPOINT", u)?;
        }
        if self.vector_backend == VectorBackend::Qdrant && self.qdrant_url.is_none() {
            return Err(ConkgError::Config(
                "VECTOR_BACKEND=qdrant requires QDRANT_URL".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn check_url(key: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConkgError::Config(format!("{key} is not a valid URL ({value}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.neo4j_uri, "bolt://localhost:7687");
        assert_eq!(cfg.neo4j_user, "neo4j");
        assert_eq!(cfg.neo4j_password, "password123");
        assert_eq!(cfg.graph_backend, GraphBackend::Auto);
        assert_eq!(cfg.qdrant_collection, "construction_chunks");
        assert_eq!(cfg.embedding_dim, 384);
        assert_eq!(cfg.chunk_size, 1000);
        assert_eq!(cfg.chunk_overlap, 200);
        assert_eq!(cfg.qa_top_k, 8);
        assert_eq!(cfg.qa_min_vector_score, 0.05);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overrides_and_fallback_keys() {
        let cfg = config_with(&[
            ("NEO4J_USER", "builder"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GRAPH_BACKEND", "Memory"),
            ("CHUNK_SIZE", "500"),
            ("CHUNK_OVERLAP", "50"),
            ("SERVER_PORT", "not-a-port"),
        ]);
        assert_eq!(cfg.neo4j_user, "builder");
        assert_eq!(cfg.embedding_api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.graph_backend, GraphBackend::Memory);
        assert_eq!(cfg.chunk_size, 500);
        assert_eq!(cfg.server_port, 8080);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(config_with(&[("CHUNK_OVERLAP", "1000")]).validate().is_err());
        assert!(config_with(&[("EMBED_BATCH_SIZE", "0")]).validate().is_err());
        assert!(config_with(&[("QDRANT_URL", "not a url")]).validate().is_err());
        assert!(config_with(&[("VECTOR_BACKEND", "qdrant")]).validate().is_err());
        assert!(config_with(&[("QA_MIN_VECTOR_SCORE", "1.5")]).validate().is_err());
        assert!(config_with(&[("QA_MIN_VECTOR_SCORE", "0.2")]).validate().is_ok());
        assert!(config_with(&[("VECTOR_BACKEND", "qdrant"), ("QDRANT_URL", "http://localhost:6334")])
            .validate()
            .is_ok());
    }
}
