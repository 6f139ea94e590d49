//! Collaborator interfaces consumed by the probe engine.
//!
//! Each trait exposes only what the probes need, in terms of the core types
//! from `canary-types`. HTTP and MQTT implementations live next to this
//! module; the engine's test fakes implement the same traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canary_types::{
    ConnectionState, Device, DeviceType, DeviceTypeBlueprint, Hub, LastValue, LastValueRequest,
    Notification, PreparedDeployment, ProcessInstance, Session,
};

use crate::error::ClientResult;

/// Identity provider
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Acquire a token pair for the canary user
    async fn login(&self) -> ClientResult<Session>;

    /// Release the token pair
    async fn logout(&self, session: &Session) -> ClientResult<()>;
}

/// Device repository (reads) and device manager (writes)
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn read_device(&self, session: &Session, id: &str) -> ClientResult<Device>;

    /// Connection state from the extended device view
    async fn read_connection_state(
        &self,
        session: &Session,
        id: &str,
    ) -> ClientResult<ConnectionState>;

    async fn read_device_type(&self, session: &Session, id: &str) -> ClientResult<DeviceType>;

    /// Hubs whose name matches `search`, at most `limit`
    async fn list_hubs(&self, session: &Session, search: &str, limit: usize)
        -> ClientResult<Vec<Hub>>;

    async fn create_device(&self, session: &Session, device: &Device) -> ClientResult<Device>;

    async fn update_device(&self, session: &Session, device: &Device) -> ClientResult<Device>;

    async fn create_device_type(
        &self,
        session: &Session,
        blueprint: &DeviceTypeBlueprint,
    ) -> ClientResult<DeviceType>;

    async fn create_hub(&self, session: &Session, hub: &Hub) -> ClientResult<Hub>;

    async fn update_hub(&self, session: &Session, hub: &Hub) -> ClientResult<Hub>;
}

/// Permission/search index. Queries are issued with read rights.
#[async_trait]
pub trait PermissionSearch: Send + Sync {
    /// Devices carrying an attribute with the given key, sorted by name
    async fn find_devices(
        &self,
        session: &Session,
        attribute_key: &str,
        limit: usize,
    ) -> ClientResult<Vec<Device>>;

    /// Device types carrying an attribute with the given key, sorted by name
    async fn find_device_types(
        &self,
        session: &Session,
        attribute_key: &str,
        limit: usize,
    ) -> ClientResult<Vec<DeviceType>>;

    /// Devices by id
    async fn list_devices(&self, session: &Session, ids: &[String]) -> ClientResult<Vec<Device>>;
}

/// Last-value query service
#[async_trait]
pub trait LastValueQuery: Send + Sync {
    async fn last_values(
        &self,
        session: &Session,
        requests: &[LastValueRequest],
    ) -> ClientResult<Vec<LastValue>>;
}

/// Notification service
#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send(&self, session: &Session, title: &str, message: &str) -> ClientResult<()>;

    async fn list(&self, session: &Session) -> ClientResult<Vec<Notification>>;

    async fn delete(&self, session: &Session, ids: &[String]) -> ClientResult<()>;
}

/// Process engine, scoped to the canary process
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Ids of all canary deployments
    async fn list_deployments(&self, session: &Session) -> ClientResult<Vec<String>>;

    async fn delete_deployment(&self, session: &Session, id: &str) -> ClientResult<()>;

    /// Selectables the platform offers for the canary process model
    async fn prepared_deployment(&self, session: &Session) -> ClientResult<PreparedDeployment>;

    /// Deploy the canary process bound to a device service, returning the deployment id
    async fn deploy(
        &self,
        session: &Session,
        device_id: &str,
        service_id: &str,
    ) -> ClientResult<String>;

    async fn start_instance(&self, session: &Session, deployment_id: &str) -> ClientResult<()>;

    /// Instances of canary deployments
    async fn list_instances(&self, session: &Session) -> ClientResult<Vec<ProcessInstance>>;
}

/// Delivery guarantee of a broker message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Message received on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Invoked for every message matching a subscription
pub type MessageCallback = Arc<dyn Fn(BrokerMessage) + Send + Sync>;

/// Parameters of a broker connection
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// `tcp://`, `mqtt://`, `ssl://`, `tls://` or `mqtts://` URL
    pub broker_url: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub clean_session: bool,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("broker_url", &self.broker_url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("clean_session", &self.clean_session)
            .finish()
    }
}

/// Message broker
#[async_trait]
pub trait Broker: Send + Sync {
    /// Connect and wait for the broker's acknowledgement.
    ///
    /// The returned connection reconnects on its own after a lost connection.
    async fn connect(&self, options: &ConnectOptions) -> ClientResult<Arc<dyn BrokerConnection>>;
}

/// Live broker connection
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Subscribe and wait for the acknowledgement
    async fn subscribe(&self, topic: &str, qos: QoS, callback: MessageCallback)
        -> ClientResult<()>;

    /// Publish and wait for the acknowledgement the QoS level implies
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> ClientResult<()>;

    /// Give in-flight work `quiesce` to finish, then close the connection
    async fn disconnect(&self, quiesce: Duration);
}
