pub mod entities;
pub mod graph;
pub mod health;
pub mod ingest;
pub mod qa;
pub mod schema;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use conkg_core::api_types::ErrorResponse;
use conkg_core::ConkgError;

pub fn status_for(err: &ConkgError) -> StatusCode {
    match err {
        ConkgError::NotFound(_) => StatusCode::NOT_FOUND,
        ConkgError::Validation(_) | ConkgError::Unsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ConkgError::Json(_) | ConkgError::Extraction(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{"error": "..."}` with the status matching the error kind.
pub fn error_response(context: &str, err: ConkgError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "{context}");
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "{context}");
    }
    (
        status,
        Json(ErrorResponse {
            error: format!("{context}: {err}"),
        }),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message.into() }),
    )
        .into_response()
}
