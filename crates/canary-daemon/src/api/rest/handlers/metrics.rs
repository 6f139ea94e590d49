//! Metric exposition and cycle trigger handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::api::rest::state::AppState;
use crate::error::ApiResult;

/// Content type of the Prometheus text format
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render the current metrics, then kick a cycle.
///
/// The scrape returns the results of the previous cycle; the cycle it
/// starts is reported by the next scrape.
pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.canary.metrics().export()?;
    let started = state.canary.start_cycle().is_some();
    tracing::debug!(started, "Metrics scraped");

    Ok(([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body))
}

/// Trigger response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// False when a cycle was already running
    pub started: bool,
}

/// Kick a cycle without rendering metrics
pub async fn trigger(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    let started = state.canary.start_cycle().is_some();
    (StatusCode::ACCEPTED, Json(TriggerResponse { started }))
}
