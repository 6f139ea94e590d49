//! The process-wide metric sink.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use prometheus::{Gauge, IntCounter, Opts, Registry};

use crate::error::Result;
use crate::exporter::export_metrics;
use crate::operation::{Operation, Unexpected};

/// Registry prefix used unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "canary";

/// Count/latency/error triple of one operation class.
struct OperationMetrics {
    count: IntCounter,
    latency_ms: Gauge,
    err: IntCounter,
}

impl OperationMetrics {
    fn new(registry: &Registry, op: Operation) -> Result<Self> {
        let count = IntCounter::with_opts(Opts::new(
            format!("{}_count", op.name()),
            format!("count of {} calls", op),
        ))?;
        registry.register(Box::new(count.clone()))?;

        let latency_ms = Gauge::with_opts(Opts::new(
            format!("{}_latency_ms", op.name()),
            format!("latency of the last {} call in ms", op),
        ))?;
        registry.register(Box::new(latency_ms.clone()))?;

        let err = IntCounter::with_opts(Opts::new(
            format!("{}_err", op.name()),
            format!("count of failed {} calls", op),
        ))?;
        registry.register(Box::new(err.clone()))?;

        Ok(Self {
            count,
            latency_ms,
            err,
        })
    }
}

/// Named counters and gauges shared by every probe.
///
/// Counters are monotonic for the lifetime of the sink; latency gauges are
/// overwritten by each completed call of their class.
pub struct MetricSink {
    registry: Registry,
    operations: HashMap<Operation, OperationMetrics>,
    unexpected: HashMap<Unexpected, IntCounter>,
    process_instance_duration_ms: Gauge,
}

impl MetricSink {
    /// Create a sink registering all metrics with the default prefix "canary"
    pub fn new() -> Result<Self> {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Create a sink with a custom prefix
    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let registry = Registry::new_custom(Some(prefix.to_string()), None)?;

        let operations = Operation::ALL
            .iter()
            .map(|op| Ok((*op, OperationMetrics::new(&registry, *op)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        let unexpected = Unexpected::ALL
            .iter()
            .map(|kind| {
                let counter = IntCounter::with_opts(Opts::new(kind.name(), kind.help()))?;
                registry.register(Box::new(counter.clone()))?;
                Ok((*kind, counter))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let process_instance_duration_ms = Gauge::with_opts(Opts::new(
            "process_instance_duration_ms",
            "duration of the last completed process instance in ms",
        ))?;
        registry.register(Box::new(process_instance_duration_ms.clone()))?;

        Ok(Self {
            registry,
            operations,
            unexpected,
            process_instance_duration_ms,
        })
    }

    fn op(&self, op: Operation) -> &OperationMetrics {
        // Populated from Operation::ALL in the constructor.
        &self.operations[&op]
    }

    /// Record a finished call of the given class
    pub fn record(&self, op: Operation, latency: Duration, ok: bool) {
        let metrics = self.op(op);
        metrics.count.inc();
        metrics.latency_ms.set(latency.as_micros() as f64 / 1000.0);
        if !ok {
            metrics.err.inc();
        }
    }

    /// Run a call and meter it: count it, time it and count its error
    pub async fn observe<T, E, F>(&self, op: Operation, call: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        let start = Instant::now();
        let result = call.await;
        self.record(op, start.elapsed(), result.is_ok());
        result
    }

    /// Count a failed assertion on remote state
    pub fn unexpected(&self, kind: Unexpected) {
        self.unexpected[&kind].inc();
    }

    /// Count an encoding, decoding or internal failure
    pub fn uncategorized(&self) {
        self.unexpected(Unexpected::Uncategorized);
    }

    /// Record the duration of a completed process instance
    pub fn set_process_instance_duration_ms(&self, duration_ms: f64) {
        self.process_instance_duration_ms.set(duration_ms);
    }

    /// Number of calls recorded for an operation class
    pub fn count(&self, op: Operation) -> u64 {
        self.op(op).count.get()
    }

    /// Number of failed calls recorded for an operation class
    pub fn errors(&self, op: Operation) -> u64 {
        self.op(op).err.get()
    }

    /// Latency of the last call of an operation class
    pub fn latency_ms(&self, op: Operation) -> f64 {
        self.op(op).latency_ms.get()
    }

    /// Value of a semantic error counter
    pub fn unexpected_count(&self, kind: Unexpected) -> u64 {
        self.unexpected[&kind].get()
    }

    pub fn process_instance_duration_ms(&self) -> f64 {
        self.process_instance_duration_ms.get()
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        export_metrics(&self.registry)
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for MetricSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSink")
            .field("operations", &self.operations.len())
            .field("unexpected", &self.unexpected.len())
            .finish()
    }
}
