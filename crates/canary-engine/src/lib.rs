//! # Canary Engine - Probe orchestration
//!
//! Runs canary test cycles against the platform:
//!
//! 1. [`Canary::start_cycle`] starts a cycle unless one is running ([`RunGuard`]).
//! 2. The cycle logs in and resolves its [`TestSubject`](canary_types::TestSubject)
//!    (device type, device, hub) through the [`SetupResolver`].
//! 3. The connection, metadata, notification and process probes run
//!    concurrently. Each records its outcomes on the
//!    [`MetricSink`](canary_metrics::MetricSink) and never fails the cycle.
//! 4. The cycle logs out and releases the guard.
//!
//! Enable the `test-utils` feature for the in-memory [`testing::FakePlatform`].

pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod probes;
pub mod run_guard;
pub mod setup;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{CanaryConfig, ConnectorConfig, DeviceTypeConfig};
pub use context::{Collaborators, ProbeContext};
pub use error::{EngineError, EngineResult};
pub use orchestrator::Canary;
pub use probes::{CommandListener, Probe, ProbeKind, ProcessRunState};
pub use run_guard::{RunGuard, RunPermit};
pub use setup::SetupResolver;
