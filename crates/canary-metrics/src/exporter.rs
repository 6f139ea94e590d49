//! Metrics exporter for Prometheus scraping

use prometheus::{Encoder, Registry, TextEncoder};

use crate::error::{MetricsError, Result};

/// Export metrics in Prometheus text format
pub fn export_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
}
