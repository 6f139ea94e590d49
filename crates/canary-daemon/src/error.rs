//! Error types for canaryd

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use canary_clients::ClientError;
use canary_metrics::MetricsError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Collaborator construction error
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Metric registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Metric exposition failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Metrics(_) => (StatusCode::INTERNAL_SERVER_ERROR, "METRICS_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
