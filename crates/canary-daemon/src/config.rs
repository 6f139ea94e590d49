//! Configuration for canaryd

use std::net::SocketAddr;

use canary_clients::ClientsConfig;
use canary_engine::CanaryConfig;
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Probe engine configuration
    #[serde(default)]
    pub canary: CanaryConfig,

    /// Platform endpoints
    #[serde(default)]
    pub clients: ClientsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `CANARY_`-prefixed environment variables.
    ///
    /// Nested keys are separated by `__`, e.g.
    /// `CANARY_CANARY__CHANGE_GUARANTEE=20s` or `CANARY_CLIENTS__AUTH__PASSWORD=...`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with CANARY_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("CANARY")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: DaemonConfig = builder.build()?.try_deserialize()?;
        config.inherit_broker_credentials();
        Ok(config)
    }

    /// The canary user doubles as broker user unless credentials are set
    fn inherit_broker_credentials(&mut self) {
        let connector = &mut self.canary.connector;
        if connector.username.is_empty() {
            connector.username = self.clients.auth.username.clone();
            connector.password = self.clients.auth.password.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.canary.hub_name, "canary-hub");
        assert_eq!(config.clients.auth.realm, "master");
    }

    #[test]
    fn test_load_without_file_yields_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.canary.change_guarantee, Duration::from_secs(10));
        assert_eq!(config.clients.notification_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("canaryd-test-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[server]
listen_addr = "127.0.0.1:9100"

[canary]
change_guarantee = "1m 30s"
hub_name = "staging-canary"

[clients.auth]
username = "canary"
password = "secret"
"#,
        )
        .unwrap();

        let config = DaemonConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.listen_addr.port(), 9100);
        assert_eq!(config.canary.change_guarantee, Duration::from_secs(90));
        assert_eq!(config.canary.hub_name, "staging-canary");
        // Untouched sections keep their defaults
        assert_eq!(config.canary.device_marker, "senergy/canary-device");
        assert_eq!(config.canary.connector.username, "canary");
        assert_eq!(config.canary.connector.password, "secret");
    }
}
