//! Probe implementations
//!
//! A probe exercises one end-to-end platform behavior against the cycle's
//! [`TestSubject`]. Probes never fail: every step records its own outcome on
//! the metric sink and returns early when later steps cannot run.

mod connection;
mod metadata;
mod notification;
mod process;

pub use connection::ConnectionProbe;
pub use metadata::MetadataProbe;
pub use notification::NotificationProbe;
pub use process::{process_window, ProcessProbe, ProcessWindow, ProcessWindowClosed};

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use canary_types::{Session, TestSubject};
use serde::{Deserialize, Serialize};

/// Probe kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Broker connectivity and the event data path
    Connection,
    /// Device metadata propagation into the registry and the index
    Metadata,
    /// Notification delivery
    Notification,
    /// Process deployment and execution
    Process,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Connection => write!(f, "connection"),
            ProbeKind::Metadata => write!(f, "metadata"),
            ProbeKind::Notification => write!(f, "notification"),
            ProbeKind::Process => write!(f, "process"),
        }
    }
}

/// Probe trait
#[async_trait]
pub trait Probe: Send + Sync {
    /// Get the probe kind
    fn kind(&self) -> ProbeKind;

    /// Run every step of the probe
    async fn run(&self, session: &Session, subject: &TestSubject);

    /// Get probe name for logging
    fn name(&self) -> String {
        format!("{}-probe", self.kind())
    }
}

/// Receives every command delivered to the canary device
pub trait CommandListener: Send + Sync {
    fn on_command(&self, topic: &str, payload: &[u8]);
}

/// Commands seen during one process run
#[derive(Debug, Default)]
pub struct ProcessRunState {
    commands: AtomicU64,
}

impl ProcessRunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.commands.store(0, Ordering::SeqCst);
    }

    pub fn received(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }
}

impl CommandListener for ProcessRunState {
    fn on_command(&self, _topic: &str, _payload: &[u8]) {
        self.commands.fetch_add(1, Ordering::SeqCst);
    }
}
