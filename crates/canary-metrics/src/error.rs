//! Error types for canary-metrics

use thiserror::Error;

/// Errors that can occur while building or exporting the metric surface
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric creation or registration failed
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Exposition output could not be produced
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type alias for metric operations
pub type Result<T> = std::result::Result<T, MetricsError>;
