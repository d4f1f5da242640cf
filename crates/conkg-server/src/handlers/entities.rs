use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use conkg_core::api_types::{
    EntityDetailResponse, EntitySearchRequest, EntitySearchResponse, StatusUpdateRequest,
};
use conkg_core::ConkgError;

use super::{bad_request, error_response};
use crate::state::AppState;

const MAX_SEARCH_LIMIT: usize = 100;

pub async fn search_entities(
    State(state): State<AppState>,
    Json(request): Json<EntitySearchRequest>,
) -> impl IntoResponse {
    let query = request.query.trim();
    if query.is_empty() {
        return bad_request("query must not be empty");
    }
    let limit = request.limit.clamp(1, MAX_SEARCH_LIMIT);
    info!(query = %query, limit, types = request.entity_types.len(), "Searching entities");

    match state
        .graph
        .search_entities(query, &request.entity_types, limit)
        .await
    {
        Ok(matches) => {
            let total = matches.len();
            (StatusCode::OK, Json(EntitySearchResponse { matches, total })).into_response()
        }
        Err(e) => error_response("Search failed", e),
    }
}

pub async fn get_entity(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    info!(entity_id = %id, "Fetching entity");

    let entity = match state.graph.get_entity(&id).await {
        Ok(Some(entity)) => entity,
        Ok(None) => {
            return error_response(
                "Failed to fetch entity",
                ConkgError::NotFound(format!("Entity {id} not found")),
            )
        }
        Err(e) => return error_response("Failed to fetch entity", e),
    };

    let response = match state.graph.get_neighbors(&id, 1).await {
        Ok(n) => EntityDetailResponse {
            entity,
            relationships: n.relationships,
            neighbors: n.neighbors,
        },
        Err(e) => {
            // the entity alone is still useful
            warn!(entity_id = %id, error = %e, "Failed to fetch neighbors");
            EntityDetailResponse {
                entity,
                relationships: Vec::new(),
                neighbors: Vec::new(),
            }
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> impl IntoResponse {
    let status = request.status.trim();
    if status.is_empty() {
        return bad_request("status must not be empty");
    }
    info!(entity_id = %id, status, "Updating entity status");

    match state.graph.update_status(&id, status).await {
        Ok(entity) => (StatusCode::OK, Json(entity)).into_response(),
        Err(e) => error_response("Status update failed", e),
    }
}
