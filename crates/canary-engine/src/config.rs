//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings consumed by the setup resolver and the probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryConfig {
    /// Time the platform needs to propagate a change to every read model
    #[serde(default = "default_change_guarantee", with = "canary_types::duration")]
    pub change_guarantee: Duration,

    /// Attribute key marking the canary device
    #[serde(default = "default_device_marker")]
    pub device_marker: String,

    /// Attribute key marking the canary device type
    #[serde(default = "default_device_type_marker")]
    pub device_type_marker: String,

    /// Name of the canary hub
    #[serde(default = "default_hub_name")]
    pub hub_name: String,

    /// Broker connection
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Blueprint of the synthetic device type
    #[serde(default)]
    pub device_type: DeviceTypeConfig,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            change_guarantee: default_change_guarantee(),
            device_marker: default_device_marker(),
            device_type_marker: default_device_type_marker(),
            hub_name: default_hub_name(),
            connector: ConnectorConfig::default(),
            device_type: DeviceTypeConfig::default(),
        }
    }
}

/// Broker connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Topics carry the owner id: `event/<owner>/<local id>/sensor`
    #[serde(default)]
    pub topics_with_owner: bool,

    /// Time in-flight broker work gets before the connection is closed
    #[serde(default = "default_disconnect_quiesce", with = "canary_types::duration")]
    pub disconnect_quiesce: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            username: String::new(),
            password: String::new(),
            topics_with_owner: false,
            disconnect_quiesce: default_disconnect_quiesce(),
        }
    }
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("broker_url", &self.broker_url)
            .field("username", &self.username)
            .field("topics_with_owner", &self.topics_with_owner)
            .field("disconnect_quiesce", &self.disconnect_quiesce)
            .finish()
    }
}

/// Protocol and semantic bindings of the synthetic device type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTypeConfig {
    pub device_class_id: String,
    pub protocol_id: String,
    pub protocol_segment_id: String,
    /// Key of published payloads, e.g. `{"<segment name>": "42"}`
    pub protocol_segment_name: String,
    pub cmd_value_type: String,
    pub cmd_characteristic_id: String,
    pub cmd_function_id: String,
    pub sensor_value_type: String,
    pub sensor_characteristic_id: String,
    pub sensor_function_id: String,
    pub sensor_aspect_id: String,
}

// Default value helpers
fn default_change_guarantee() -> Duration {
    Duration::from_secs(10)
}

fn default_device_marker() -> String {
    "senergy/canary-device".to_string()
}

fn default_device_type_marker() -> String {
    "senergy/canary-device-type".to_string()
}

fn default_hub_name() -> String {
    "canary-hub".to_string()
}

fn default_broker_url() -> String {
    "tcp://connector:1883".to_string()
}

fn default_disconnect_quiesce() -> Duration {
    Duration::from_millis(250)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CanaryConfig::default();
        assert_eq!(config.device_marker, "senergy/canary-device");
        assert_eq!(config.device_type_marker, "senergy/canary-device-type");
        assert_eq!(config.connector.disconnect_quiesce, Duration::from_millis(250));
        assert!(!config.connector.topics_with_owner);
    }

    #[test]
    fn test_partial_document() {
        let config: CanaryConfig = serde_json::from_str(
            r#"{
                "change_guarantee": "0s",
                "connector": {"topics_with_owner": true, "password": "secret"},
                "device_type": {"protocol_segment_name": "data"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.change_guarantee, Duration::ZERO);
        assert!(config.connector.topics_with_owner);
        assert_eq!(config.connector.broker_url, "tcp://connector:1883");
        assert_eq!(config.device_type.protocol_segment_name, "data");
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
