//! In-memory platform for engine tests
//!
//! [`FakePlatform`] implements every collaborator trait over one shared
//! state, so the probes observe the same causal effects they would on the
//! real platform: connecting a hub's client brings its devices online,
//! publishing a sensor event stores a last value and starting a process
//! instance delivers a command to subscribed clients. [`Behavior`] switches
//! individual services into failure modes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use canary_clients::{
    Broker, BrokerConnection, BrokerMessage, ClientError, ClientResult, ConnectOptions,
    DeviceRegistry, IdentityClient, LastValueQuery, MessageCallback, NotificationClient,
    PermissionSearch, ProcessEngine, QoS,
};
use canary_metrics::MetricSink;
use canary_types::{
    ConnectionState, Device, DeviceType, DeviceTypeBlueprint, Hub, LastValue, LastValueRequest,
    Notification, PreparedDeployment, PreparedElement, PreparedSelectionOption, ProcessInstance,
    Service, Session, CANARY_TASK_BPMN_ID, PROCESS_INSTANCE_COMPLETED,
};
use serde_json::{json, Value};

use crate::config::{CanaryConfig, DeviceTypeConfig};
use crate::context::{Collaborators, ProbeContext};

/// Engine configuration with zero delays
pub fn test_config() -> CanaryConfig {
    CanaryConfig {
        change_guarantee: Duration::ZERO,
        device_type: DeviceTypeConfig {
            protocol_id: "canary-protocol".to_string(),
            protocol_segment_id: "canary-segment".to_string(),
            protocol_segment_name: "data".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Failure modes of the fake platform
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub fail_login: bool,
    pub fail_permissions: bool,
    pub fail_connect: bool,
    pub fail_subscribe: bool,
    /// Sensor events are rejected by the broker
    pub fail_publish: bool,
    /// Connecting does not bring the hub's devices online
    pub device_stays_offline: bool,
    /// Disconnecting leaves the hub's devices online
    pub device_stays_online_after_disconnect: bool,
    /// Device repository keeps returning an old device name
    pub stale_registry_name: bool,
    /// Permission index finds no device by id
    pub empty_index: bool,
    /// Accept notifications without storing them
    pub drop_notifications: bool,
    /// Permission index returns outdated device names
    pub stale_index: bool,
    /// Last values come back as JSON strings
    pub string_last_values: bool,
    /// Started instances never send a command
    pub suppress_commands: bool,
    /// Started instances stay active
    pub leave_instances_running: bool,
    /// Prepared deployments offer nothing
    pub hide_selectables: bool,
    /// Listing notifications panics
    pub panic_on_notification_list: bool,
}

/// A deployment of the canary process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDeployment {
    pub id: String,
    pub device_id: String,
    pub service_id: String,
}

#[derive(Clone)]
struct Subscription {
    connection: u64,
    filter: String,
    callback: MessageCallback,
}

/// Everything the fake platform stores
#[derive(Clone, Default)]
pub struct PlatformState {
    pub devices: Vec<Device>,
    pub device_types: Vec<DeviceType>,
    pub hubs: Vec<Hub>,
    /// Ids of online devices
    pub online: HashSet<String>,
    /// Last values by device id and service id
    pub last_values: HashMap<(String, String), Value>,
    pub notifications: Vec<Notification>,
    pub deployments: Vec<FakeDeployment>,
    /// Instances by deployment id
    pub instances: Vec<(String, ProcessInstance)>,
    /// Every message published by a client
    pub published: Vec<BrokerMessage>,
    pub logins: usize,
    pub logouts: usize,
    device_type_markers: HashMap<String, Vec<String>>,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl PlatformState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn device_by_local_id(&self, local_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.local_id == local_id)
    }

    fn device_ids_for(&self, local_ids: &[String]) -> Vec<String> {
        local_ids
            .iter()
            .filter_map(|l| self.device_by_local_id(l))
            .map(|d| d.id.clone())
            .collect()
    }

    fn hub_devices(&self, hub_id: &str) -> Vec<String> {
        self.hubs
            .iter()
            .filter(|h| h.id == hub_id)
            .flat_map(|h| h.device_ids.clone())
            .collect()
    }

    fn sensor_service_of(&self, device: &Device) -> Option<String> {
        self.device_types
            .iter()
            .find(|t| t.id == device.device_type_id)
            .and_then(|t| t.sensor_service_id())
            .map(str::to_string)
    }

    /// Messages matching `topic`, paired with the callbacks to run
    fn deliveries(&self, topic: &str, payload: &[u8]) -> Vec<(MessageCallback, BrokerMessage)> {
        self.subscriptions
            .iter()
            .filter(|s| topic_matches(&s.filter, topic))
            .map(|s| {
                (
                    s.callback.clone(),
                    BrokerMessage {
                        topic: topic.to_string(),
                        payload: payload.to_vec(),
                    },
                )
            })
            .collect()
    }
}

/// In-memory implementation of every collaborator
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
    behavior: Mutex<Behavior>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn behavior(&self) -> Behavior {
        self.behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the failure modes
    pub fn behave(&self, change: impl FnOnce(&mut Behavior)) {
        change(&mut self.behavior.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PlatformState {
        self.state().clone()
    }

    /// Store a hub listing the given device ids
    pub fn seed_hub(&self, name: &str, device_ids: &[&str]) -> Hub {
        let mut state = self.state();
        let hub = Hub {
            id: state.next_id("hub"),
            name: name.to_string(),
            device_ids: device_ids.iter().map(|s| s.to_string()).collect(),
            device_local_ids: vec![],
        };
        state.hubs.push(hub.clone());
        hub
    }

    /// Store a notification
    pub fn seed_notification(&self, message: &str) -> Notification {
        let mut state = self.state();
        let notification = Notification {
            id: state.next_id("notification"),
            title: "old".to_string(),
            message: message.to_string(),
        };
        state.notifications.push(notification.clone());
        notification
    }

    /// Store a deployment of the canary process
    pub fn seed_deployment(&self) -> FakeDeployment {
        let mut state = self.state();
        let deployment = FakeDeployment {
            id: state.next_id("deployment"),
            device_id: String::new(),
            service_id: String::new(),
        };
        state.deployments.push(deployment.clone());
        deployment
    }

    /// Collaborators backed by this platform
    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            identity: self.clone(),
            registry: self.clone(),
            permissions: self.clone(),
            last_values: self.clone(),
            notifications: self.clone(),
            process: self.clone(),
            broker: Arc::new(FakeBroker {
                platform: self.clone(),
            }),
        }
    }

    /// Probe context with a fresh metric sink
    pub fn context(self: &Arc<Self>, config: CanaryConfig) -> ProbeContext {
        let metrics = MetricSink::new().expect("metric sink");
        ProbeContext::new(self.collaborators(), Arc::new(metrics), config)
    }

    fn deliver(&self, deliveries: Vec<(MessageCallback, BrokerMessage)>) {
        // Callbacks run outside the state lock.
        for (callback, message) in deliveries {
            callback(message);
        }
    }
}

fn unavailable(service: &str) -> ClientError {
    ClientError::Api {
        status: 503,
        message: format!("{} unavailable", service),
    }
}

/// MQTT topic filter matching with `+` and `#`
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut topic = topic.split('/');
    for level in filter.split('/') {
        match (level, topic.next()) {
            ("#", _) => return true,
            ("+", Some(_)) => {}
            (level, Some(actual)) if level == actual => {}
            _ => return false,
        }
    }
    topic.next().is_none()
}

#[async_trait]
impl IdentityClient for FakePlatform {
    async fn login(&self) -> ClientResult<Session> {
        if self.behavior().fail_login {
            return Err(ClientError::Api {
                status: 401,
                message: "invalid_grant".to_string(),
            });
        }
        let mut state = self.state();
        state.logins += 1;
        Ok(Session::new(format!("token-{}", state.logins), "refresh"))
    }

    async fn logout(&self, _session: &Session) -> ClientResult<()> {
        self.state().logouts += 1;
        Ok(())
    }
}

#[async_trait]
impl DeviceRegistry for FakePlatform {
    async fn read_device(&self, _session: &Session, id: &str) -> ClientResult<Device> {
        let stale = self.behavior().stale_registry_name;
        self.state()
            .devices
            .iter()
            .find(|d| d.id == id)
            .map(|d| Device {
                name: if stale { "stale".to_string() } else { d.name.clone() },
                ..d.clone()
            })
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn read_connection_state(
        &self,
        _session: &Session,
        id: &str,
    ) -> ClientResult<ConnectionState> {
        let state = self.state();
        if !state.devices.iter().any(|d| d.id == id) {
            return Err(ClientError::NotFound(id.to_string()));
        }
        Ok(if state.online.contains(id) {
            ConnectionState::Online
        } else {
            ConnectionState::Offline
        })
    }

    async fn read_device_type(&self, _session: &Session, id: &str) -> ClientResult<DeviceType> {
        self.state()
            .device_types
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn list_hubs(
        &self,
        _session: &Session,
        search: &str,
        limit: usize,
    ) -> ClientResult<Vec<Hub>> {
        Ok(self
            .state()
            .hubs
            .iter()
            .filter(|h| h.name.contains(search))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_device(&self, _session: &Session, device: &Device) -> ClientResult<Device> {
        let mut state = self.state();
        let created = Device {
            id: state.next_id("device"),
            owner_id: "owner-1".to_string(),
            ..device.clone()
        };
        state.devices.push(created.clone());
        Ok(created)
    }

    async fn update_device(&self, _session: &Session, device: &Device) -> ClientResult<Device> {
        let mut state = self.state();
        let Some(stored) = state.devices.iter_mut().find(|d| d.id == device.id) else {
            return Err(ClientError::NotFound(device.id.clone()));
        };
        *stored = device.clone();
        Ok(device.clone())
    }

    async fn create_device_type(
        &self,
        _session: &Session,
        blueprint: &DeviceTypeBlueprint,
    ) -> ClientResult<DeviceType> {
        let mut state = self.state();
        let id = state.next_id("device-type");
        let services = blueprint
            .services
            .iter()
            .map(|s| Service {
                id: state.next_id("service"),
                local_id: s.local_id.clone(),
            })
            .collect();
        let created = DeviceType { id, services };
        let markers = blueprint.attributes.iter().map(|a| a.key.clone()).collect();
        state.device_type_markers.insert(created.id.clone(), markers);
        state.device_types.push(created.clone());
        Ok(created)
    }

    async fn create_hub(&self, _session: &Session, hub: &Hub) -> ClientResult<Hub> {
        let mut state = self.state();
        let created = Hub {
            id: state.next_id("hub"),
            name: hub.name.clone(),
            device_ids: state.device_ids_for(&hub.device_local_ids),
            device_local_ids: hub.device_local_ids.clone(),
        };
        state.hubs.push(created.clone());
        Ok(created)
    }

    async fn update_hub(&self, _session: &Session, hub: &Hub) -> ClientResult<Hub> {
        let mut state = self.state();
        let updated = Hub {
            device_ids: state.device_ids_for(&hub.device_local_ids),
            ..hub.clone()
        };
        let Some(stored) = state.hubs.iter_mut().find(|h| h.id == hub.id) else {
            return Err(ClientError::NotFound(hub.id.clone()));
        };
        *stored = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl PermissionSearch for FakePlatform {
    async fn find_devices(
        &self,
        _session: &Session,
        attribute_key: &str,
        limit: usize,
    ) -> ClientResult<Vec<Device>> {
        if self.behavior().fail_permissions {
            return Err(unavailable("permission search"));
        }
        let state = self.state();
        let mut found: Vec<Device> = state
            .devices
            .iter()
            .filter(|d| d.has_attribute(attribute_key))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit);
        Ok(found)
    }

    async fn find_device_types(
        &self,
        _session: &Session,
        attribute_key: &str,
        limit: usize,
    ) -> ClientResult<Vec<DeviceType>> {
        if self.behavior().fail_permissions {
            return Err(unavailable("permission search"));
        }
        let state = self.state();
        Ok(state
            .device_types
            .iter()
            .filter(|t| {
                state
                    .device_type_markers
                    .get(&t.id)
                    .is_some_and(|keys| keys.iter().any(|k| k == attribute_key))
            })
            .take(limit)
            // The index does not carry services.
            .map(|t| DeviceType {
                id: t.id.clone(),
                services: vec![],
            })
            .collect())
    }

    async fn list_devices(&self, _session: &Session, ids: &[String]) -> ClientResult<Vec<Device>> {
        let behavior = self.behavior();
        if behavior.fail_permissions {
            return Err(unavailable("permission search"));
        }
        if behavior.empty_index {
            return Ok(vec![]);
        }
        Ok(self
            .state()
            .devices
            .iter()
            .filter(|d| ids.contains(&d.id))
            .map(|d| Device {
                name: if behavior.stale_index {
                    "stale".to_string()
                } else {
                    d.name.clone()
                },
                ..d.clone()
            })
            .collect())
    }
}

#[async_trait]
impl LastValueQuery for FakePlatform {
    async fn last_values(
        &self,
        _session: &Session,
        requests: &[LastValueRequest],
    ) -> ClientResult<Vec<LastValue>> {
        let as_string = self.behavior().string_last_values;
        let state = self.state();
        Ok(requests
            .iter()
            .filter_map(|r| {
                state
                    .last_values
                    .get(&(r.device_id.clone(), r.service_id.clone()))
            })
            .map(|value| LastValue {
                time: Some("2024-01-01T00:00:00Z".to_string()),
                value: if as_string {
                    Value::String(value.to_string())
                } else {
                    value.clone()
                },
            })
            .collect())
    }
}

#[async_trait]
impl NotificationClient for FakePlatform {
    async fn send(&self, _session: &Session, title: &str, message: &str) -> ClientResult<()> {
        if self.behavior().drop_notifications {
            return Ok(());
        }
        let mut state = self.state();
        let notification = Notification {
            id: state.next_id("notification"),
            title: title.to_string(),
            message: message.to_string(),
        };
        state.notifications.push(notification);
        Ok(())
    }

    async fn list(&self, _session: &Session) -> ClientResult<Vec<Notification>> {
        if self.behavior().panic_on_notification_list {
            panic!("notification listing exploded");
        }
        Ok(self.state().notifications.clone())
    }

    async fn delete(&self, _session: &Session, ids: &[String]) -> ClientResult<()> {
        self.state().notifications.retain(|n| !ids.contains(&n.id));
        Ok(())
    }
}

#[async_trait]
impl ProcessEngine for FakePlatform {
    async fn list_deployments(&self, _session: &Session) -> ClientResult<Vec<String>> {
        Ok(self
            .state()
            .deployments
            .iter()
            .map(|d| d.id.clone())
            .collect())
    }

    async fn delete_deployment(&self, _session: &Session, id: &str) -> ClientResult<()> {
        let mut state = self.state();
        if !state.deployments.iter().any(|d| d.id == id) {
            return Err(ClientError::NotFound(id.to_string()));
        }
        state.deployments.retain(|d| d.id != id);
        state.instances.retain(|(deployment, _)| deployment != id);
        Ok(())
    }

    async fn prepared_deployment(&self, _session: &Session) -> ClientResult<PreparedDeployment> {
        let hide = self.behavior().hide_selectables;
        let state = self.state();
        let options = if hide {
            vec![]
        } else {
            state
                .devices
                .iter()
                .map(|d| PreparedSelectionOption {
                    device_id: Some(d.id.clone()),
                    service_ids: state
                        .device_types
                        .iter()
                        .filter(|t| t.id == d.device_type_id)
                        .flat_map(|t| t.services.iter().map(|s| s.id.clone()))
                        .collect(),
                })
                .collect()
        };
        Ok(PreparedDeployment {
            elements: vec![
                PreparedElement {
                    bpmn_id: "StartEvent_1".to_string(),
                    selection_options: None,
                },
                PreparedElement {
                    bpmn_id: CANARY_TASK_BPMN_ID.to_string(),
                    selection_options: Some(options),
                },
            ],
        })
    }

    async fn deploy(
        &self,
        _session: &Session,
        device_id: &str,
        service_id: &str,
    ) -> ClientResult<String> {
        let mut state = self.state();
        let deployment = FakeDeployment {
            id: state.next_id("deployment"),
            device_id: device_id.to_string(),
            service_id: service_id.to_string(),
        };
        let id = deployment.id.clone();
        state.deployments.push(deployment);
        Ok(id)
    }

    async fn start_instance(&self, _session: &Session, deployment_id: &str) -> ClientResult<()> {
        let behavior = self.behavior();
        let deliveries = {
            let mut state = self.state();
            let Some(deployment) = state
                .deployments
                .iter()
                .find(|d| d.id == deployment_id)
                .cloned()
            else {
                return Err(ClientError::NotFound(deployment_id.to_string()));
            };

            let instance = ProcessInstance {
                id: state.next_id("instance"),
                state: if behavior.leave_instances_running {
                    "ACTIVE".to_string()
                } else {
                    PROCESS_INSTANCE_COMPLETED.to_string()
                },
                duration_in_millis: 42,
            };
            state.instances.push((deployment_id.to_string(), instance));

            let device = state
                .devices
                .iter()
                .find(|d| d.id == deployment.device_id)
                .cloned();
            match device {
                Some(device) if !behavior.suppress_commands => {
                    let correlation_id = state.next_id("correlation");
                    let payload = json!({
                        "correlation_id": correlation_id,
                        "payload": {"data": "on"},
                    })
                    .to_string()
                    .into_bytes();
                    let plain = format!("command/{}/{}", device.local_id, deployment.service_id);
                    let owned = format!(
                        "command/{}/{}/{}",
                        device.owner_id, device.local_id, deployment.service_id
                    );
                    let mut deliveries = state.deliveries(&plain, &payload);
                    deliveries.extend(state.deliveries(&owned, &payload));
                    deliveries
                }
                _ => vec![],
            }
        };
        self.deliver(deliveries);
        Ok(())
    }

    async fn list_instances(&self, _session: &Session) -> ClientResult<Vec<ProcessInstance>> {
        Ok(self
            .state()
            .instances
            .iter()
            .map(|(_, instance)| instance.clone())
            .collect())
    }
}

/// Broker side of [`FakePlatform`]
pub struct FakeBroker {
    platform: Arc<FakePlatform>,
}

#[async_trait]
impl Broker for FakeBroker {
    async fn connect(&self, options: &ConnectOptions) -> ClientResult<Arc<dyn BrokerConnection>> {
        let behavior = self.platform.behavior();
        if behavior.fail_connect {
            return Err(ClientError::Broker("connection refused".to_string()));
        }
        let mut state = self.platform.state();
        let id = state.next_id;
        state.next_id += 1;
        if !behavior.device_stays_offline {
            for device_id in state.hub_devices(&options.client_id) {
                state.online.insert(device_id);
            }
        }
        Ok(Arc::new(FakeConnection {
            platform: self.platform.clone(),
            id,
            hub_id: options.client_id.clone(),
        }))
    }
}

/// Connection of one hub client
pub struct FakeConnection {
    platform: Arc<FakePlatform>,
    id: u64,
    hub_id: String,
}

#[async_trait]
impl BrokerConnection for FakeConnection {
    async fn subscribe(
        &self,
        topic: &str,
        _qos: QoS,
        callback: MessageCallback,
    ) -> ClientResult<()> {
        if self.platform.behavior().fail_subscribe {
            return Err(ClientError::Broker("subscription rejected".to_string()));
        }
        self.platform.state().subscriptions.push(Subscription {
            connection: self.id,
            filter: topic.to_string(),
            callback,
        });
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        _qos: QoS,
        _retain: bool,
        payload: Vec<u8>,
    ) -> ClientResult<()> {
        if self.platform.behavior().fail_publish && topic.starts_with("event/") {
            return Err(ClientError::Broker("publish rejected".to_string()));
        }
        let mut state = self.platform.state();
        state.published.push(BrokerMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        });

        let segments: Vec<&str> = topic.split('/').collect();
        if segments.first() != Some(&"event") || segments.last() != Some(&"sensor") {
            return Ok(());
        }
        let Some(local_id) = segments.len().checked_sub(2).map(|i| segments[i]) else {
            return Ok(());
        };
        let Some(device) = state.device_by_local_id(local_id).cloned() else {
            return Ok(());
        };
        let Some(service_id) = state.sensor_service_of(&device) else {
            return Ok(());
        };

        // The platform converts the string payload to the service's value type.
        let event: HashMap<String, String> = serde_json::from_slice(&payload)?;
        if let Some(value) = event.values().next().and_then(|v| v.parse::<i64>().ok()) {
            state
                .last_values
                .insert((device.id, service_id), Value::from(value));
        }
        Ok(())
    }

    async fn disconnect(&self, _quiesce: Duration) {
        let stays_online = self.platform.behavior().device_stays_online_after_disconnect;
        let mut state = self.platform.state();
        state.subscriptions.retain(|s| s.connection != self.id);
        if !stays_online {
            for device_id in state.hub_devices(&self.hub_id) {
                state.online.remove(&device_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("command/dev/+", "command/dev/svc"));
        assert!(topic_matches("command/#", "command/owner/dev/svc"));
        assert!(!topic_matches("command/dev/+", "command/owner/dev/svc"));
        assert!(!topic_matches("command/dev/+", "command/dev"));
        assert!(!topic_matches("command/dev/+", "response/dev/svc"));
    }

    #[tokio::test]
    async fn test_connection_drives_online_state_and_last_value() {
        let platform = Arc::new(FakePlatform::new());
        let session = Session::new("t", "r");
        let device_type = platform
            .create_device_type(
                &session,
                &crate::setup::device_type_blueprint(&test_config().device_type, "marker"),
            )
            .await
            .unwrap();
        let device = platform
            .create_device(
                &session,
                &Device {
                    local_id: "canary_1".to_string(),
                    device_type_id: device_type.id.clone(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let hub = platform
            .create_hub(
                &session,
                &Hub {
                    name: "canary-hub".to_string(),
                    device_local_ids: vec!["canary_1".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let broker = FakeBroker {
            platform: platform.clone(),
        };
        let connection = broker
            .connect(&ConnectOptions {
                broker_url: "tcp://fake:1883".to_string(),
                client_id: hub.id,
                username: String::new(),
                password: String::new(),
                clean_session: true,
            })
            .await
            .unwrap();
        assert!(platform.snapshot().online.contains(&device.id));

        connection
            .publish(
                "event/canary_1/sensor",
                QoS::ExactlyOnce,
                false,
                br#"{"data":"7"}"#.to_vec(),
            )
            .await
            .unwrap();
        let sensor = device_type.sensor_service_id().unwrap().to_string();
        assert_eq!(
            platform.snapshot().last_values[&(device.id.clone(), sensor)],
            json!(7)
        );

        connection.disconnect(Duration::ZERO).await;
        assert!(!platform.snapshot().online.contains(&device.id));
    }
}
