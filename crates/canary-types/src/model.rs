//! Platform entities the canary creates, reuses and reads back.

use serde::{Deserialize, Serialize};

/// Local id of the event-interaction service that receives published sensor values.
pub const SENSOR_SERVICE_LOCAL_ID: &str = "sensor";

/// Local id of the request-interaction service that receives commands.
pub const COMMAND_SERVICE_LOCAL_ID: &str = "cmd";

/// Key/value attribute attached to devices and device types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
    pub origin: String,
}

impl Attribute {
    /// Marker attribute used to find canary entities again.
    pub fn marker(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: "true".to_string(),
            origin: "canary".to_string(),
        }
    }
}

/// A device as seen by the probes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Platform-assigned device id.
    pub id: String,

    /// Device-chosen identifier, used in broker topics.
    pub local_id: String,

    /// Owning user, used in owner-scoped broker topics.
    pub owner_id: String,

    /// Display name.
    pub name: String,

    /// Id of the device type the device was created from.
    pub device_type_id: String,

    /// Attributes (the canary marker lives here).
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Device {
    /// Whether the device carries an attribute with the given key.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key == key)
    }
}

/// Connectivity as reported by the device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Online,
    Offline,
    Unknown,
}

impl ConnectionState {
    pub fn is_online(self) -> bool {
        matches!(self, ConnectionState::Online)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Online => write!(f, "online"),
            ConnectionState::Offline => write!(f, "offline"),
            ConnectionState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A service of a device type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub local_id: String,
}

/// A device type reduced to what the probes need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl DeviceType {
    /// Find the id of the service with the given local id.
    pub fn service_id(&self, local_id: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.local_id == local_id)
            .map(|s| s.id.as_str())
    }

    /// Id of the sensor service, if present.
    pub fn sensor_service_id(&self) -> Option<&str> {
        self.service_id(SENSOR_SERVICE_LOCAL_ID)
    }
}

/// How a service exchanges data with its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    /// Device-initiated messages
    Event,
    /// Platform-initiated commands
    Request,
}

/// Content variable bound to a protocol segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlueprint {
    pub name: String,
    pub value_type: String,
    pub characteristic_id: String,
    pub function_id: String,
    pub aspect_id: Option<String>,
    pub protocol_segment_id: String,
}

/// Service of a device type that is about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBlueprint {
    pub local_id: String,
    pub name: String,
    pub description: String,
    pub interaction: Interaction,
    pub protocol_id: String,
    #[serde(default)]
    pub inputs: Vec<ContentBlueprint>,
    #[serde(default)]
    pub outputs: Vec<ContentBlueprint>,
}

/// Device type that is about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTypeBlueprint {
    pub name: String,
    pub description: String,
    pub device_class_id: String,
    pub attributes: Vec<Attribute>,
    pub services: Vec<ServiceBlueprint>,
}

/// A hub grouping devices behind one broker client identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub device_ids: Vec<String>,
    #[serde(default)]
    pub device_local_ids: Vec<String>,
}

impl Hub {
    /// True when the hub lists both the id and the local id of the device.
    pub fn lists_device(&self, device: &Device) -> bool {
        self.device_ids.iter().any(|id| id == &device.id)
            && self.device_local_ids.iter().any(|id| id == &device.local_id)
    }
}

/// The fixed subject every probe of a cycle works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSubject {
    pub device: Device,
    pub hub: Hub,
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
}

/// Selects one device service column for a last-value query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastValueRequest {
    pub device_id: String,
    pub service_id: String,
    pub column_name: String,
}

/// Most recent value recorded for a device service column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastValue {
    pub time: Option<String>,
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device {
            id: "device-1".to_string(),
            local_id: "canary_1".to_string(),
            owner_id: "owner".to_string(),
            name: "canary".to_string(),
            device_type_id: "dt-1".to_string(),
            attributes: vec![Attribute::marker("senergy/canary-device")],
        }
    }

    #[test]
    fn test_hub_lists_device_requires_both_ids() {
        let device = device();
        let mut hub = Hub {
            id: "hub-1".to_string(),
            name: "canary-hub".to_string(),
            device_ids: vec![],
            device_local_ids: vec!["canary_1".to_string()],
        };
        assert!(!hub.lists_device(&device));

        hub.device_ids.push("device-1".to_string());
        assert!(hub.lists_device(&device));
    }

    #[test]
    fn test_device_type_service_lookup() {
        let dt = DeviceType {
            id: "dt-1".to_string(),
            services: vec![
                Service {
                    id: "s-cmd".to_string(),
                    local_id: COMMAND_SERVICE_LOCAL_ID.to_string(),
                },
                Service {
                    id: "s-sensor".to_string(),
                    local_id: SENSOR_SERVICE_LOCAL_ID.to_string(),
                },
            ],
        };
        assert_eq!(dt.sensor_service_id(), Some("s-sensor"));
        assert_eq!(dt.service_id(COMMAND_SERVICE_LOCAL_ID), Some("s-cmd"));
        assert_eq!(dt.service_id("missing"), None);
    }

    #[test]
    fn test_marker_attribute() {
        let device = device();
        assert!(device.has_attribute("senergy/canary-device"));
        assert!(!device.has_attribute("other"));
    }
}
