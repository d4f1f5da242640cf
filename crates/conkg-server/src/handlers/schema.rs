use axum::{http::StatusCode, response::IntoResponse, Json};

use conkg_core::SchemaDescription;

pub async fn get_schema() -> impl IntoResponse {
    (StatusCode::OK, Json(SchemaDescription::current()))
}
