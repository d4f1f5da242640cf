pub mod embedder;
pub mod memory;
pub mod qdrant;

use std::sync::Arc;

use conkg_core::config::{AppConfig, VectorBackend};
use conkg_core::error::Result;
use conkg_core::vector::VectorStore;

pub use embedder::{embedder_from_config, HashingEmbedder, HttpEmbedder};
pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

/// Qdrant when configured (or forced), in-memory otherwise.
pub fn vector_store_from_config(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    match (config.vector_backend, &config.qdrant_url) {
        (VectorBackend::Memory, _) | (VectorBackend::Auto, None) => {
            tracing::info!("Using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        (_, Some(url)) => {
            tracing::info!(url = %url, collection = %config.qdrant_collection, "Using Qdrant vector store");
            Ok(Arc::new(QdrantVectorStore::connect(url, config.qdrant_collection.clone())?))
        }
        (VectorBackend::Qdrant, None) => Err(conkg_core::ConkgError::Config(
            "VECTOR_BACKEND=qdrant requires QDRANT_URL".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_by_default() {
        let store = vector_store_from_config(&AppConfig::default()).unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn test_forced_qdrant_without_url_fails() {
        let cfg = AppConfig::from_lookup(|k| match k {
            "VECTOR_BACKEND" => Some("qdrant".into()),
            _ => None,
        });
        assert!(vector_store_from_config(&cfg).is_err());
    }
}
