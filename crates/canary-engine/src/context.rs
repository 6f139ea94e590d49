//! Shared state handed to the setup resolver and every probe.

use std::future::Future;
use std::sync::Arc;

use canary_clients::{
    Broker, ClientResult, ClientsConfig, DeviceRegistry, HttpDeviceRegistry,
    HttpLastValueQuery, HttpNotificationClient, HttpPermissionSearch, HttpProcessEngine,
    IdentityClient, LastValueQuery, MqttBroker, NotificationClient, OidcIdentity,
    PermissionSearch, ProcessEngine,
};
use canary_metrics::{MetricSink, Operation};
use tracing::error;

use crate::config::CanaryConfig;

/// The platform collaborators, as trait objects
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityClient>,
    pub registry: Arc<dyn DeviceRegistry>,
    pub permissions: Arc<dyn PermissionSearch>,
    pub last_values: Arc<dyn LastValueQuery>,
    pub notifications: Arc<dyn NotificationClient>,
    pub process: Arc<dyn ProcessEngine>,
    pub broker: Arc<dyn Broker>,
}

impl Collaborators {
    /// Build the HTTP and MQTT implementations
    pub fn from_config(config: &ClientsConfig) -> ClientResult<Self> {
        let timeout = config.request_timeout;
        Ok(Self {
            identity: Arc::new(OidcIdentity::new(config.auth.clone(), timeout)?),
            registry: Arc::new(HttpDeviceRegistry::new(
                &config.device_repository_url,
                &config.device_manager_url,
                timeout,
            )?),
            permissions: Arc::new(HttpPermissionSearch::new(
                &config.permission_search_url,
                timeout,
            )?),
            last_values: Arc::new(HttpLastValueQuery::new(&config.last_value_url, timeout)?),
            notifications: Arc::new(HttpNotificationClient::new(
                &config.notification_url,
                config.notification_timeout,
            )?),
            process: Arc::new(HttpProcessEngine::new(&config.process, timeout)?),
            broker: Arc::new(MqttBroker::new(config.broker.clone())),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Collaborators, metric sink and configuration of one canary
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub clients: Collaborators,
    pub metrics: Arc<MetricSink>,
    pub config: Arc<CanaryConfig>,
}

impl ProbeContext {
    pub fn new(clients: Collaborators, metrics: Arc<MetricSink>, config: CanaryConfig) -> Self {
        Self {
            clients,
            metrics,
            config: Arc::new(config),
        }
    }

    /// Wait until changes made so far are visible in every read model
    pub async fn change_guarantee(&self) {
        tokio::time::sleep(self.config.change_guarantee).await;
    }

    /// Meter a collaborator call under `op`; log and discard a failure.
    ///
    /// Undecodable responses also count as uncategorized errors.
    pub(crate) async fn call<T, F>(&self, op: Operation, what: &str, call: F) -> Option<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        match self.metrics.observe(op, call).await {
            Ok(value) => Some(value),
            Err(err) => {
                if err.is_decode() {
                    self.metrics.uncategorized();
                }
                error!(operation = %op, error = %err, "{} failed", what);
                None
            }
        }
    }
}
