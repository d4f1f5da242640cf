use std::path::{Component, Path, PathBuf};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use conkg_core::api_types::{
    IngestRequest, IngestRunState, IngestRunStatus, IngestRunsResponse, IngestTriggerResponse,
    RecordsIngestRequest, RecordsIngestResponse,
};
use conkg_core::{ConkgError, Result};
use conkg_ingest::IngestOptions;

use super::error_response;
use crate::state::AppState;

const RECORDS_SOURCE: &str = "api";

/// Resolve a requested path inside `data_dir`; `..` and absolute paths elsewhere are refused.
pub fn resolve_ingest_path(data_dir: &Path, requested: &str) -> Result<PathBuf> {
    let requested = Path::new(requested.trim());
    if requested.as_os_str().is_empty() {
        return Err(ConkgError::Validation("path must not be empty".into()));
    }
    if requested.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ConkgError::Validation("path must not contain '..'".into()));
    }
    let resolved = if requested.is_absolute() {
        if !requested.starts_with(data_dir) {
            return Err(ConkgError::Validation(format!(
                "path must be inside the data directory {}",
                data_dir.display()
            )));
        }
        requested.to_path_buf()
    } else {
        data_dir.join(requested)
    };
    if !resolved.exists() {
        return Err(ConkgError::NotFound(format!("{} does not exist", resolved.display())));
    }
    Ok(resolved)
}

/// POST /api/ingest: start a background ingestion run and return its id.
pub async fn trigger_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    let path = match resolve_ingest_path(&state.config.data_dir, &req.path) {
        Ok(p) => p,
        Err(e) => return error_response("Cannot ingest", e),
    };
    let display_path = path.display().to_string();
    info!(path = %display_path, project_id = ?req.project_id, "Triggering ingestion (async)");

    let run_id = Uuid::new_v4().to_string();
    state.runs.write().await.push(IngestRunStatus {
        run_id: run_id.clone(),
        path: display_path.clone(),
        status: IngestRunState::Running,
        started_at: Utc::now(),
        finished_at: None,
        files_seen: 0,
        files_ingested: 0,
        entities_stored: 0,
        chunks_stored: 0,
        errors: Vec::new(),
    });

    let options = IngestOptions {
        project_id: req.project_id,
        include_hidden: req.include_hidden,
    };
    let runs = state.runs.clone();
    let pipeline = state.pipeline.clone();
    let run_id_clone = run_id.clone();

    tokio::spawn(async move {
        let result = pipeline.ingest_path(&path, &options).await;

        let mut runs_lock = runs.write().await;
        if let Some(run) = runs_lock.iter_mut().find(|r| r.run_id == run_id_clone) {
            run.finished_at = Some(Utc::now());
            match result {
                Ok(report) => {
                    run.status = IngestRunState::Completed;
                    run.files_seen = report.files_seen;
                    run.files_ingested = report.files_ingested;
                    run.entities_stored = report.store.entities_stored();
                    run.chunks_stored = report.chunks_stored;
                    run.errors = report.errors;
                    info!(
                        run_id = %run_id_clone,
                        files = report.files_ingested,
                        chunks = report.chunks_stored,
                        "Ingestion run completed"
                    );
                }
                Err(e) => {
                    run.status = IngestRunState::Failed;
                    run.errors.push(e.to_string());
                    error!(run_id = %run_id_clone, error = %e, "Ingestion run failed");
                }
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(IngestTriggerResponse {
            run_id,
            status: "running".to_string(),
            message: format!("Ingesting {display_path} in the background"),
        }),
    )
        .into_response()
}

/// POST /api/ingest/records: store extraction records synchronously.
pub async fn ingest_records(
    State(state): State<AppState>,
    Json(req): Json<RecordsIngestRequest>,
) -> impl IntoResponse {
    let source = req.source.as_deref().unwrap_or(RECORDS_SOURCE);
    let outcome = match &req.records {
        serde_json::Value::String(raw) => state.pipeline.ingest_records(raw, source).await,
        value => state.pipeline.ingest_records_value(value, source).await,
    };
    match outcome {
        Ok(o) => {
            info!(
                source,
                entities = o.entities,
                relationships = o.relationships,
                "Stored extraction records"
            );
            (
                StatusCode::OK,
                Json(RecordsIngestResponse {
                    summary: o.summary,
                    entities: o.entities,
                    relationships: o.relationships,
                    chunks_stored: o.chunks_stored,
                }),
            )
                .into_response()
        }
        Err(e) => error_response("Record ingestion failed", e),
    }
}

/// GET /api/ingest/runs: newest first.
pub async fn list_runs(State(state): State<AppState>) -> impl IntoResponse {
    let runs = state.runs.read().await;
    let runs_vec: Vec<IngestRunStatus> = runs.iter().rev().cloned().collect();
    (StatusCode::OK, Json(IngestRunsResponse { runs: runs_vec }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ingest_path() {
        let dir = std::env::temp_dir();
        assert!(matches!(
            resolve_ingest_path(&dir, "../etc"),
            Err(ConkgError::Validation(_))
        ));
        assert!(matches!(resolve_ingest_path(&dir, "  "), Err(ConkgError::Validation(_))));
        assert!(matches!(
            resolve_ingest_path(&dir, "conkg-definitely-missing-dir"),
            Err(ConkgError::NotFound(_))
        ));
        assert_eq!(resolve_ingest_path(&dir, ".").unwrap(), dir.join("."));
    }
}
