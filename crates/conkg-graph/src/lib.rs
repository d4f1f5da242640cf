pub mod memory;
pub mod neo4j;

use std::sync::Arc;

use conkg_core::config::{AppConfig, GraphBackend};
use conkg_core::graph::GraphStore;

pub use memory::InMemoryGraphStore;
pub use neo4j::Neo4jGraphStore;

/// Pick the graph backend. `auto` tries Neo4j and falls back to memory;
/// a forced `neo4j` keeps the store even when disconnected so health reports it.
pub async fn graph_store_from_config(config: &AppConfig) -> Arc<dyn GraphStore> {
    match config.graph_backend {
        GraphBackend::Memory => {
            tracing::info!("Using in-memory graph store");
            Arc::new(InMemoryGraphStore::new())
        }
        GraphBackend::Neo4j => Arc::new(Neo4jGraphStore::connect(config).await),
        GraphBackend::Auto => {
            let store = Neo4jGraphStore::connect(config).await;
            if store.is_connected() {
                Arc::new(store)
            } else {
                tracing::warn!("Neo4j unavailable, falling back to in-memory graph store");
                Arc::new(InMemoryGraphStore::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_selected() {
        let cfg = AppConfig::from_lookup(|k| match k {
            "GRAPH_BACKEND" => Some("memory".into()),
            _ => None,
        });
        let store = graph_store_from_config(&cfg).await;
        assert_eq!(store.backend(), "memory");
        assert!(store.is_connected());
    }
}
