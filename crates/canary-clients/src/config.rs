//! Endpoint configuration of the platform collaborators

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how to reach every platform service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsConfig {
    /// Identity provider
    #[serde(default)]
    pub auth: AuthConfig,

    /// Device repository (reads)
    #[serde(default = "default_device_repository_url")]
    pub device_repository_url: String,

    /// Device manager (writes)
    #[serde(default = "default_device_manager_url")]
    pub device_manager_url: String,

    /// Permission search index
    #[serde(default = "default_permission_search_url")]
    pub permission_search_url: String,

    /// Last-value query endpoint (full URL, POSTed to as-is)
    #[serde(default = "default_last_value_url")]
    pub last_value_url: String,

    /// Notification service
    #[serde(default = "default_notification_url")]
    pub notification_url: String,

    /// Process engine endpoints
    #[serde(default)]
    pub process: ProcessEndpoints,

    /// MQTT client tuning
    #[serde(default)]
    pub broker: BrokerClientConfig,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_request_timeout", with = "canary_types::duration")]
    pub request_timeout: Duration,

    /// Deadline of notification calls
    #[serde(default = "default_notification_timeout", with = "canary_types::duration")]
    pub notification_timeout: Duration,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            device_repository_url: default_device_repository_url(),
            device_manager_url: default_device_manager_url(),
            permission_search_url: default_permission_search_url(),
            last_value_url: default_last_value_url(),
            notification_url: default_notification_url(),
            process: ProcessEndpoints::default(),
            broker: BrokerClientConfig::default(),
            request_timeout: default_request_timeout(),
            notification_timeout: default_notification_timeout(),
        }
    }
}

/// OpenID-Connect password grant settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the identity provider
    #[serde(default = "default_auth_endpoint")]
    pub endpoint: String,

    /// Realm holding the canary user
    #[serde(default = "default_realm")]
    pub realm: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Canary user; also used as broker credentials
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("endpoint", &self.endpoint)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: default_auth_endpoint(),
            realm: default_realm(),
            client_id: default_client_id(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Process engine endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEndpoints {
    /// Deployment service (deployments, prepared deployments)
    #[serde(default = "default_process_deployment_url")]
    pub deployment_url: String,

    /// Engine wrapper (starting and listing instances)
    #[serde(default = "default_process_engine_url")]
    pub engine_url: String,

    /// Name of the canary process; deployments and instances are found by it
    #[serde(default = "default_process_name")]
    pub process_name: String,
}

impl Default for ProcessEndpoints {
    fn default() -> Self {
        Self {
            deployment_url: default_process_deployment_url(),
            engine_url: default_process_engine_url(),
            process_name: default_process_name(),
        }
    }
}

/// MQTT client tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerClientConfig {
    /// How long connect/subscribe/publish wait for their acknowledgement
    #[serde(default = "default_ack_timeout", with = "canary_types::duration")]
    pub ack_timeout: Duration,

    /// Zero disables keep-alive; otherwise at least one second
    #[serde(
        default = "default_keep_alive",
        serialize_with = "canary_types::duration::serialize",
        deserialize_with = "deserialize_keep_alive"
    )]
    pub keep_alive: Duration,

    /// Pause between reconnect attempts after a lost connection
    #[serde(default = "default_reconnect_delay", with = "canary_types::duration")]
    pub reconnect_delay: Duration,
}

/// Shortest keep-alive interval the MQTT client accepts
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Check a keep-alive interval against [`MIN_KEEP_ALIVE`]
pub fn validate_keep_alive(keep_alive: Duration) -> Result<Duration, String> {
    if !keep_alive.is_zero() && keep_alive < MIN_KEEP_ALIVE {
        return Err(format!(
            "keep_alive must be 0 or at least {}, got {}",
            humantime::format_duration(MIN_KEEP_ALIVE),
            humantime::format_duration(keep_alive)
        ));
    }
    Ok(keep_alive)
}

fn deserialize_keep_alive<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let keep_alive = canary_types::duration::deserialize(deserializer)?;
    validate_keep_alive(keep_alive).map_err(serde::de::Error::custom)
}

impl Default for BrokerClientConfig {
    fn default() -> Self {
        Self {
            ack_timeout: default_ack_timeout(),
            keep_alive: default_keep_alive(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

// Default value helpers
fn default_device_repository_url() -> String {
    "http://device-repository:8080".to_string()
}

fn default_device_manager_url() -> String {
    "http://device-manager:8080".to_string()
}

fn default_permission_search_url() -> String {
    "http://permission-search:8080".to_string()
}

fn default_last_value_url() -> String {
    "http://last-value:8080/last-values".to_string()
}

fn default_notification_url() -> String {
    "http://notifier:5000".to_string()
}

fn default_auth_endpoint() -> String {
    "http://keycloak:8080".to_string()
}

fn default_realm() -> String {
    "master".to_string()
}

fn default_client_id() -> String {
    "canary".to_string()
}

fn default_process_deployment_url() -> String {
    "http://process-deployment:8080".to_string()
}

fn default_process_engine_url() -> String {
    "http://process-engine-wrapper:8080".to_string()
}

fn default_process_name() -> String {
    "canary-process".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_notification_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_ack_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ClientsConfig = serde_json::from_str(
            r#"{
                "notification_url": "http://localhost:5000",
                "broker": { "ack_timeout": "2s" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.notification_url, "http://localhost:5000");
        assert_eq!(config.notification_timeout, Duration::from_secs(5));
        assert_eq!(config.broker.ack_timeout, Duration::from_secs(2));
        assert_eq!(config.broker.keep_alive, Duration::from_secs(30));
        assert_eq!(config.auth.realm, "master");
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let auth = AuthConfig {
            username: "canary".to_string(),
            password: "hunter2".to_string(),
            client_secret: "s3cr3t".to_string(),
            ..AuthConfig::default()
        };
        let config = ClientsConfig {
            auth,
            ..ClientsConfig::default()
        };
        let rendered = format!("{:?}", config);

        assert!(rendered.contains("canary"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn test_sub_second_keep_alive_is_rejected() {
        let err = serde_json::from_str::<BrokerClientConfig>(r#"{"keep_alive": "500ms"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("keep_alive"));

        let disabled: BrokerClientConfig =
            serde_json::from_str(r#"{"keep_alive": "0s"}"#).unwrap();
        assert_eq!(disabled.keep_alive, Duration::ZERO);

        let minimal: BrokerClientConfig = serde_json::from_str(r#"{"keep_alive": "1s"}"#).unwrap();
        assert_eq!(minimal.keep_alive, MIN_KEEP_ALIVE);
    }
}
