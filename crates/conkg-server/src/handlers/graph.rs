use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use conkg_core::api_types::{EntityDetailResponse, GraphStatsResponse, NeighborsQuery, OverviewQuery};

use super::error_response;
use crate::state::AppState;

pub async fn graph_stats(State(state): State<AppState>) -> impl IntoResponse {
    info!("Fetching graph statistics");

    let entity_count = match state.graph.entity_count().await {
        Ok(count) => count,
        Err(e) => return error_response("Failed to get entity count", e),
    };
    let relationship_count = match state.graph.relationship_count().await {
        Ok(count) => count,
        Err(e) => return error_response("Failed to get relationship count", e),
    };
    let entity_types = match state.graph.type_counts().await {
        Ok(stats) => stats,
        Err(e) => return error_response("Failed to get entity type counts", e),
    };

    let response = GraphStatsResponse {
        entity_count,
        relationship_count,
        entity_types,
    };
    (StatusCode::OK, Json(response)).into_response()
}

pub async fn get_neighbors(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<NeighborsQuery>,
) -> impl IntoResponse {
    info!(entity_id = %id, depth = params.depth, "Fetching neighbors");

    match state.graph.get_neighbors(&id, params.depth).await {
        Ok(n) => {
            let response = EntityDetailResponse {
                entity: n.entity,
                relationships: n.relationships,
                neighbors: n.neighbors,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response("Failed to fetch neighbors", e),
    }
}

pub async fn project_overview(
    State(state): State<AppState>,
    Query(params): Query<OverviewQuery>,
) -> impl IntoResponse {
    let project = params.project.as_deref().map(str::trim).filter(|p| !p.is_empty());
    info!(project = ?project, "Fetching overview");

    match state.graph.overview(project).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => error_response("Overview failed", e),
    }
}
