//! Device repository (reads) and device manager (writes) over HTTP

use std::time::Duration;

use async_trait::async_trait;
use canary_types::{
    Attribute, ConnectionState, ContentBlueprint, Device, DeviceType, DeviceTypeBlueprint, Hub,
    Interaction, Service, Session,
};
use serde::{Deserialize, Serialize};

use crate::api::DeviceRegistry;
use crate::error::ClientResult;
use crate::http::HttpClient;

/// Device as exchanged with the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    attributes: Vec<Attribute>,
    #[serde(default)]
    device_type_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    owner_id: String,
}

impl From<DeviceWire> for Device {
    fn from(wire: DeviceWire) -> Self {
        Device {
            id: wire.id,
            local_id: wire.local_id,
            owner_id: wire.owner_id,
            name: wire.name,
            device_type_id: wire.device_type_id,
            attributes: wire.attributes,
        }
    }
}

impl From<&Device> for DeviceWire {
    fn from(device: &Device) -> Self {
        DeviceWire {
            id: device.id.clone(),
            local_id: device.local_id.clone(),
            name: device.name.clone(),
            attributes: device.attributes.clone(),
            device_type_id: device.device_type_id.clone(),
            owner_id: device.owner_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExtendedDeviceWire {
    #[serde(default)]
    connection_state: String,
}

fn connection_state(raw: &str) -> ConnectionState {
    match raw {
        "online" => ConnectionState::Online,
        "offline" => ConnectionState::Offline,
        _ => ConnectionState::Unknown,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentVariableWire {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    value_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    characteristic_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    function_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    aspect_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentWire {
    content_variable: ContentVariableWire,
    #[serde(default)]
    serialization: String,
    #[serde(default)]
    protocol_segment_id: String,
}

impl From<&ContentBlueprint> for ContentWire {
    fn from(content: &ContentBlueprint) -> Self {
        ContentWire {
            content_variable: ContentVariableWire {
                name: content.name.clone(),
                value_type: content.value_type.clone(),
                characteristic_id: content.characteristic_id.clone(),
                function_id: content.function_id.clone(),
                aspect_id: content.aspect_id.clone().unwrap_or_default(),
            },
            serialization: "json".to_string(),
            protocol_segment_id: content.protocol_segment_id.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServiceWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    interaction: String,
    #[serde(default)]
    protocol_id: String,
    #[serde(default)]
    inputs: Vec<ContentWire>,
    #[serde(default)]
    outputs: Vec<ContentWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeviceTypeWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    device_class_id: String,
    #[serde(default)]
    attributes: Vec<Attribute>,
    #[serde(default)]
    services: Vec<ServiceWire>,
}

impl From<DeviceTypeWire> for DeviceType {
    fn from(wire: DeviceTypeWire) -> Self {
        DeviceType {
            id: wire.id,
            services: wire
                .services
                .into_iter()
                .map(|s| Service {
                    id: s.id,
                    local_id: s.local_id,
                })
                .collect(),
        }
    }
}

impl From<&DeviceTypeBlueprint> for DeviceTypeWire {
    fn from(blueprint: &DeviceTypeBlueprint) -> Self {
        DeviceTypeWire {
            id: String::new(),
            name: blueprint.name.clone(),
            description: blueprint.description.clone(),
            device_class_id: blueprint.device_class_id.clone(),
            attributes: blueprint.attributes.clone(),
            services: blueprint
                .services
                .iter()
                .map(|s| ServiceWire {
                    id: String::new(),
                    local_id: s.local_id.clone(),
                    name: s.name.clone(),
                    description: s.description.clone(),
                    interaction: match s.interaction {
                        Interaction::Event => "event".to_string(),
                        Interaction::Request => "request".to_string(),
                    },
                    protocol_id: s.protocol_id.clone(),
                    inputs: s.inputs.iter().map(ContentWire::from).collect(),
                    outputs: s.outputs.iter().map(ContentWire::from).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HubWire {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    device_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    device_local_ids: Vec<String>,
}

impl From<HubWire> for Hub {
    fn from(wire: HubWire) -> Self {
        Hub {
            id: wire.id,
            name: wire.name,
            device_ids: wire.device_ids,
            device_local_ids: wire.device_local_ids,
        }
    }
}

impl From<&Hub> for HubWire {
    fn from(hub: &Hub) -> Self {
        // The manager derives device ids from local ids.
        HubWire {
            id: hub.id.clone(),
            name: hub.name.clone(),
            device_ids: Vec::new(),
            device_local_ids: hub.device_local_ids.clone(),
        }
    }
}

/// Registry client backed by the device repository and device manager
pub struct HttpDeviceRegistry {
    repository: HttpClient,
    manager: HttpClient,
}

impl HttpDeviceRegistry {
    pub fn new(repository_url: &str, manager_url: &str, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            repository: HttpClient::new(repository_url, timeout)?,
            manager: HttpClient::new(manager_url, timeout)?,
        })
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn read_device(&self, session: &Session, id: &str) -> ClientResult<Device> {
        let url = self.repository.endpoint(&["devices", id])?;
        let device: DeviceWire = self.repository.get(session, url).await?;
        Ok(device.into())
    }

    async fn read_connection_state(
        &self,
        session: &Session,
        id: &str,
    ) -> ClientResult<ConnectionState> {
        let url = self.repository.endpoint(&["extended-devices", id])?;
        let device: ExtendedDeviceWire = self.repository.get(session, url).await?;
        Ok(connection_state(&device.connection_state))
    }

    async fn read_device_type(&self, session: &Session, id: &str) -> ClientResult<DeviceType> {
        let url = self.repository.endpoint(&["device-types", id])?;
        let device_type: DeviceTypeWire = self.repository.get(session, url).await?;
        Ok(device_type.into())
    }

    async fn list_hubs(
        &self,
        session: &Session,
        search: &str,
        limit: usize,
    ) -> ClientResult<Vec<Hub>> {
        let mut url = self.repository.endpoint(&["hubs"])?;
        url.query_pairs_mut()
            .append_pair("search", search)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", "0");
        let hubs: Vec<HubWire> = self.repository.get(session, url).await?;
        Ok(hubs.into_iter().map(Hub::from).collect())
    }

    async fn create_device(&self, session: &Session, device: &Device) -> ClientResult<Device> {
        let url = self.manager.endpoint(&["devices"])?;
        let created: DeviceWire = self
            .manager
            .post(session, url, &DeviceWire::from(device))
            .await?;
        Ok(created.into())
    }

    async fn update_device(&self, session: &Session, device: &Device) -> ClientResult<Device> {
        let url = self.manager.endpoint(&["devices", &device.id])?;
        let updated: DeviceWire = self
            .manager
            .put(session, url, &DeviceWire::from(device))
            .await?;
        Ok(updated.into())
    }

    async fn create_device_type(
        &self,
        session: &Session,
        blueprint: &DeviceTypeBlueprint,
    ) -> ClientResult<DeviceType> {
        let url = self.manager.endpoint(&["device-types"])?;
        let created: DeviceTypeWire = self
            .manager
            .post(session, url, &DeviceTypeWire::from(blueprint))
            .await?;
        Ok(created.into())
    }

    async fn create_hub(&self, session: &Session, hub: &Hub) -> ClientResult<Hub> {
        let mut url = self.manager.endpoint(&["hubs"])?;
        url.query_pairs_mut().append_pair("wait", "true");
        let created: HubWire = self.manager.post(session, url, &HubWire::from(hub)).await?;
        Ok(created.into())
    }

    async fn update_hub(&self, session: &Session, hub: &Hub) -> ClientResult<Hub> {
        let mut url = self.manager.endpoint(&["hubs", &hub.id])?;
        url.query_pairs_mut().append_pair("wait", "true");
        let updated: HubWire = self.manager.put(session, url, &HubWire::from(hub)).await?;
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canary_types::ServiceBlueprint;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session::new("token", "refresh")
    }

    async fn registry(server: &MockServer) -> HttpDeviceRegistry {
        HttpDeviceRegistry::new(&server.uri(), &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_read_connection_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/extended-devices/device-1"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "device-1",
                "local_id": "canary_1",
                "connection_state": "online"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/extended-devices/device-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "device-2",
                "connection_state": ""
            })))
            .mount(&server)
            .await;

        let registry = registry(&server).await;
        assert_eq!(
            registry.read_connection_state(&session(), "device-1").await.unwrap(),
            ConnectionState::Online
        );
        assert_eq!(
            registry.read_connection_state(&session(), "device-2").await.unwrap(),
            ConnectionState::Unknown
        );
    }

    #[tokio::test]
    async fn test_read_device_type_maps_services() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/device-types/dt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dt-1",
                "name": "canary-device-type",
                "services": [
                    {"id": "s-1", "local_id": "cmd", "interaction": "request"},
                    {"id": "s-2", "local_id": "sensor", "interaction": "event"}
                ]
            })))
            .mount(&server)
            .await;

        let dt = registry(&server)
            .await
            .read_device_type(&session(), "dt-1")
            .await
            .unwrap();
        assert_eq!(dt.sensor_service_id(), Some("s-2"));
    }

    #[tokio::test]
    async fn test_list_hubs_passes_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hubs"))
            .and(query_param("search", "canary-hub"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "hub-1", "name": "canary-hub", "device_ids": ["d"], "device_local_ids": ["l"]}
            ])))
            .mount(&server)
            .await;

        let hubs = registry(&server)
            .await
            .list_hubs(&session(), "canary-hub", 1)
            .await
            .unwrap();
        assert_eq!(hubs.len(), 1);
        assert_eq!(hubs[0].device_local_ids, vec!["l".to_string()]);
    }

    #[tokio::test]
    async fn test_update_hub_waits_and_sends_local_ids() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/hubs/hub-1"))
            .and(query_param("wait", "true"))
            .and(body_partial_json(json!({
                "id": "hub-1",
                "name": "canary-hub",
                "device_local_ids": ["canary_1"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "hub-1",
                "name": "canary-hub",
                "device_ids": ["device-1"],
                "device_local_ids": ["canary_1"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hub = Hub {
            id: "hub-1".to_string(),
            name: "canary-hub".to_string(),
            device_ids: vec!["device-1".to_string()],
            device_local_ids: vec!["canary_1".to_string()],
        };
        let updated = registry(&server)
            .await
            .update_hub(&session(), &hub)
            .await
            .unwrap();
        assert_eq!(updated, hub);
    }

    #[tokio::test]
    async fn test_create_device_type_serializes_blueprint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/device-types"))
            .and(body_partial_json(json!({
                "device_class_id": "class-1",
                "services": [{
                    "local_id": "sensor",
                    "interaction": "event",
                    "protocol_id": "proto-1",
                    "outputs": [{
                        "serialization": "json",
                        "protocol_segment_id": "segment-1",
                        "content_variable": {"name": "value", "type": "https://schema.org/Integer"}
                    }]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dt-new",
                "services": [{"id": "s-new", "local_id": "sensor"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let blueprint = DeviceTypeBlueprint {
            name: "canary-device-type".to_string(),
            description: "canary".to_string(),
            device_class_id: "class-1".to_string(),
            attributes: vec![Attribute::marker("senergy/canary-device-type")],
            services: vec![ServiceBlueprint {
                local_id: "sensor".to_string(),
                name: "sensor".to_string(),
                description: "sensor".to_string(),
                interaction: Interaction::Event,
                protocol_id: "proto-1".to_string(),
                inputs: vec![],
                outputs: vec![ContentBlueprint {
                    name: "value".to_string(),
                    value_type: "https://schema.org/Integer".to_string(),
                    characteristic_id: String::new(),
                    function_id: String::new(),
                    aspect_id: None,
                    protocol_segment_id: "segment-1".to_string(),
                }],
            }],
        };

        let created = registry(&server)
            .await
            .create_device_type(&session(), &blueprint)
            .await
            .unwrap();
        assert_eq!(created.id, "dt-new");
        assert_eq!(created.sensor_service_id(), Some("s-new"));
    }

    #[tokio::test]
    async fn test_missing_device_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = registry(&server)
            .await
            .read_device(&session(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ClientError::NotFound(_)));
    }
}
