//! Service info and health endpoints.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::super::AppState;
use crate::models::HealthReport;

/// Name and version of the running service.
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("{} is running", state.app_name),
        "version": state.app_version,
    }))
}

/// Aggregate health. Always 200; the body carries the verdict.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.get_overall_status().await)
}
