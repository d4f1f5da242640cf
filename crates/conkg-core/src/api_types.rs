use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType, Relationship};
use crate::graph::{EntityMatch, EntityTypeStat, StoreSummary};

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub graph_backend: String,
    pub graph_connected: bool,
    pub vector_backend: String,
    pub embedder: String,
    pub entity_count: u64,
    pub relationship_count: u64,
    pub chunk_count: u64,
}

// --- Entities ---

#[derive(Debug, Serialize, Deserialize)]
pub struct EntitySearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntitySearchResponse {
    pub matches: Vec<EntityMatch>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntityDetailResponse {
    pub entity: Entity,
    pub relationships: Vec<Relationship>,
    pub neighbors: Vec<Entity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

// --- Graph ---

#[derive(Debug, Serialize, Deserialize)]
pub struct NeighborsQuery {
    #[serde(default = "default_depth")]
    pub depth: u32,
}

fn default_depth() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverviewQuery {
    pub project: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphStatsResponse {
    pub entity_count: u64,
    pub relationship_count: u64,
    pub entity_types: Vec<EntityTypeStat>,
}

// --- QA ---

#[derive(Debug, Serialize, Deserialize)]
pub struct SampleQuestionsResponse {
    pub questions: Vec<String>,
}

// --- Ingestion ---

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Directory or file, resolved relative to the server's data dir.
    pub path: String,
    pub project_id: Option<String>,
    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestTriggerResponse {
    pub run_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsIngestRequest {
    pub source: Option<String>,
    /// Extraction-record JSON, either inline or as a string.
    pub records: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsIngestResponse {
    pub summary: StoreSummary,
    pub entities: u64,
    pub relationships: u64,
    pub chunks_stored: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunStatus {
    pub run_id: String,
    pub path: String,
    pub status: IngestRunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files_seen: u64,
    pub files_ingested: u64,
    pub entities_stored: u64,
    pub chunks_stored: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IngestRunState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRunsResponse {
    pub runs: Vec<IngestRunStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
