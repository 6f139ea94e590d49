//! Application state for API handlers

use canary_engine::Canary;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cycle runner and its metric sink
    pub canary: Canary,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(canary: Canary) -> Self {
        Self {
            canary,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Human-readable uptime
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds().max(0);
        humantime::format_duration(std::time::Duration::from_secs(secs as u64)).to_string()
    }
}
