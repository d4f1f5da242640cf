pub mod api_types;
pub mod config;
pub mod entity;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod lifecycle;
pub mod qa;
pub mod schema;
pub mod vector;

pub use config::{AppConfig, GraphBackend, VectorBackend};
pub use entity::{derive_id, slugify, Entity, EntityType, ExtractionResult, RelationType, Relationship};
pub use error::{ConkgError, Result};
pub use extraction::{ExtractionPipeline, SourceDocument};
pub use graph::{
    check_batch, BatchCheck, EntityMatch, EntityTypeStat, GraphNeighbors, GraphStore,
    ProjectOverview, StoreSummary,
};
pub use qa::{QaEngine, QaQuery, QaResponse, QueryIntent, RetrievalMode, RetrievalStep, Source, SourceKind};
pub use schema::SchemaDescription;
pub use vector::{ChunkHit, EmbeddedChunk, Embedder, TextChunk, VectorFilter, VectorStore};
