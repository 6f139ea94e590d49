//! Health handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::rest::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    /// Whether a canary cycle is in progress
    pub cycle_running: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        cycle_running: state.canary.is_running(),
    })
}
