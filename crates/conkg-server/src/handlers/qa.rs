use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, instrument};

use conkg_core::api_types::SampleQuestionsResponse;
use conkg_core::QaQuery;

use super::error_response;
use crate::state::AppState;

#[instrument(skip(state, query), fields(question = %query.question))]
pub async fn ask(State(state): State<AppState>, Json(query): Json<QaQuery>) -> impl IntoResponse {
    match state.qa.ask(&query).await {
        Ok(response) => {
            info!(
                intent = %response.intent,
                confidence = response.confidence,
                sources = response.sources.len(),
                "Question answered"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response("Question answering failed", e),
    }
}

pub async fn sample_questions(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(SampleQuestionsResponse {
            questions: state.qa.sample_questions(),
        }),
    )
}
