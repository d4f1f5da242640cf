use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health and schema
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/schema", get(handlers::schema::get_schema))
        .route("/api/overview", get(handlers::graph::project_overview))
        // Graph
        .route("/api/graph/stats", get(handlers::graph::graph_stats))
        .route("/api/graph/neighbors/{id}", get(handlers::graph::get_neighbors))
        // Entities
        .route("/api/entities/search", post(handlers::entities::search_entities))
        .route("/api/entities/{id}", get(handlers::entities::get_entity))
        .route("/api/entities/{id}/status", put(handlers::entities::update_status))
        // Question answering
        .route("/api/qa/ask", post(handlers::qa::ask))
        .route("/api/qa/samples", get(handlers::qa::sample_questions))
        // Ingestion
        .route("/api/ingest", post(handlers::ingest::trigger_ingest))
        .route("/api/ingest/records", post(handlers::ingest::ingest_records))
        .route("/api/ingest/runs", get(handlers::ingest::list_runs))
}
