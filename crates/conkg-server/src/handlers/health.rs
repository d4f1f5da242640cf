use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, warn};

use conkg_core::api_types::HealthResponse;

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let graph_connected = state.graph.is_connected();
    let (entity_count, relationship_count) = if graph_connected {
        match state.graph.entity_count().await {
            Ok(ec) => (ec, state.graph.relationship_count().await.unwrap_or(0)),
            Err(e) => {
                warn!(error = %e, "Graph count failed during health check");
                (0, 0)
            }
        }
    } else {
        (0, 0)
    };

    let (vector_ok, chunk_count) = match state.vector.count().await {
        Ok(n) => (true, n),
        Err(e) => {
            warn!(error = %e, "Vector store check failed");
            (false, 0)
        }
    };

    let status = if graph_connected && vector_ok { "ok" } else { "degraded" };

    let response = HealthResponse {
        status: status.to_string(),
        version: VERSION.to_string(),
        graph_backend: state.graph.backend().to_string(),
        graph_connected,
        vector_backend: state.vector.backend().to_string(),
        embedder: state.embedder.name().to_string(),
        entity_count,
        relationship_count,
        chunk_count,
    };

    (StatusCode::OK, Json(response))
}
