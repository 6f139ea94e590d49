//! Canary Metrics
//!
//! Prometheus metric surface of the canary.
//!
//! ## Layout
//!
//! - **Operations**: one triple per external operation class,
//!   `<op>_count` (calls started), `<op>_latency_ms` (last call) and `<op>_err`
//! - **Semantic counters**: `unexpected_*` and `process_*` counters for
//!   assertions on remote state, plus the catch-all `uncategorized_err`
//! - **Process gauge**: `process_instance_duration_ms` of the last completed instance
//!
//! All names carry the registry prefix (default `canary`).

pub mod error;
pub mod exporter;
pub mod operation;
pub mod sink;

pub use error::{MetricsError, Result};
pub use exporter::export_metrics;
pub use operation::{Operation, Unexpected};
pub use sink::{MetricSink, DEFAULT_PREFIX};
