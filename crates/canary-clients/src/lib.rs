//! # Canary Clients - Platform collaborators
//!
//! Interfaces the probe engine uses to talk to the platform, plus the
//! production implementations:
//!
//! | Trait | Implementation | Transport |
//! |-------|----------------|-----------|
//! | [`IdentityClient`] | [`OidcIdentity`] | OpenID-Connect password grant |
//! | [`DeviceRegistry`] | [`HttpDeviceRegistry`] | device repository + device manager |
//! | [`PermissionSearch`] | [`HttpPermissionSearch`] | permission search `v3/query` |
//! | [`LastValueQuery`] | [`HttpLastValueQuery`] | last-value endpoint |
//! | [`NotificationClient`] | [`HttpNotificationClient`] | notifier |
//! | [`ProcessEngine`] | [`HttpProcessEngine`] | process deployment + engine wrapper |
//! | [`Broker`] | [`MqttBroker`] | MQTT via `rumqttc` |
//!
//! Wire formats stay private to each implementation and are mapped to the
//! `canary-types` model at this boundary.

pub mod api;
pub mod config;
pub mod device_registry;
pub mod error;
mod http;
pub mod identity;
pub mod last_value;
pub mod mqtt;
pub mod notification;
pub mod permissions;
pub mod process;

pub use api::{
    Broker, BrokerConnection, BrokerMessage, ConnectOptions, DeviceRegistry, IdentityClient,
    LastValueQuery, MessageCallback, NotificationClient, PermissionSearch, ProcessEngine, QoS,
};
pub use config::{AuthConfig, BrokerClientConfig, ClientsConfig, ProcessEndpoints};
pub use device_registry::HttpDeviceRegistry;
pub use error::{ClientError, ClientResult};
pub use identity::OidcIdentity;
pub use last_value::HttpLastValueQuery;
pub use mqtt::{MqttBroker, MqttConnection};
pub use notification::HttpNotificationClient;
pub use permissions::HttpPermissionSearch;
pub use process::HttpProcessEngine;
