//! Analysis dispatch and task status endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::super::error::ApiError;
use super::super::AppState;
use crate::models::{DocumentId, TaskStatus};

/// Queue OCR for a document and return the task handle right away.
pub async fn doc_analyse(
    State(state): State<AppState>,
    Path(document_id): Path<DocumentId>,
) -> Result<Json<Value>, ApiError> {
    let task_id = state
        .dispatcher
        .analyze(document_id)
        .await
        .map_err(|e| ApiError::from(e).context("Error starting analysis"))?;

    Ok(Json(json!({
        "status": "started",
        "task_id": task_id,
        "document_id": document_id,
        "message": "Document analysis started in background",
    })))
}

pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatus>, ApiError> {
    state
        .dispatcher
        .task_status(&task_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from(e).context("Error retrieving task status"))
}
