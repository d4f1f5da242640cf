//! Shared fixtures for the workspace integration tests.

use std::path::Path;
use std::sync::Arc;

use conkg_core::{AppConfig, Embedder, GraphStore, VectorStore};
use conkg_graph::InMemoryGraphStore;
use conkg_server::AppState;
use conkg_vector::{HashingEmbedder, InMemoryVectorStore};

pub const TEST_EMBEDDING_DIM: usize = 64;

/// Small chunks so short fixture files still split.
pub fn test_config(data_dir: &Path) -> AppConfig {
    let mut config = AppConfig::from_lookup(|k| match k {
        "CHUNK_SIZE" => Some("200".into()),
        "CHUNK_OVERLAP" => Some("40".into()),
        "GRAPH_BACKEND" => Some("memory".into()),
        "VECTOR_BACKEND" => Some("memory".into()),
        _ => None,
    });
    config.data_dir = data_dir.to_path_buf();
    config.embedding_dim = TEST_EMBEDDING_DIM;
    config
}

/// Server state over fresh in-memory stores.
pub fn memory_state(config: AppConfig) -> AppState {
    let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
    let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(TEST_EMBEDDING_DIM));
    AppState::new(config, graph, vector, embedder)
}

/// In-memory state with the sample project loaded.
pub async fn seeded_state(data_dir: &Path) -> AppState {
    let state = memory_state(test_config(data_dir));
    if let Err(e) = state.pipeline.seed().await {
        panic!("seeding the sample project failed: {e}");
    }
    state
}
