use std::sync::Arc;

use tokio::sync::RwLock;

use conkg_core::api_types::IngestRunStatus;
use conkg_core::{AppConfig, Embedder, GraphStore, QaEngine, VectorStore};
use conkg_ingest::IngestPipeline;
use conkg_qa::HybridQaEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub graph: Arc<dyn GraphStore>,
    pub vector: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub qa: Arc<dyn QaEngine>,
    pub pipeline: IngestPipeline,
    pub runs: Arc<RwLock<Vec<IngestRunStatus>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let qa = Arc::new(HybridQaEngine::new(
            graph.clone(),
            vector.clone(),
            embedder.clone(),
            &config,
        ));
        let pipeline = IngestPipeline::new(graph.clone(), vector.clone(), embedder.clone(), &config);
        Self {
            config,
            graph,
            vector,
            embedder,
            qa,
            pipeline,
            runs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}
