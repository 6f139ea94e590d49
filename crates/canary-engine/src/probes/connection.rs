//! Connection probe: drive the canary device through the broker and check
//! connection state and the event data path.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use canary_clients::{BrokerConnection, BrokerMessage, ConnectOptions, MessageCallback, QoS};
use canary_metrics::{Operation, Unexpected};
use canary_types::{Device, LastValueRequest, Session, TestSubject};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{CommandListener, Probe, ProbeKind, ProcessWindowClosed};
use crate::context::ProbeContext;
use crate::setup::SetupResolver;

/// Column holding the sensor value in last-value queries
const VALUE_COLUMN: &str = "value";

/// Command sent by the platform to the device
#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    correlation_id: String,
    #[serde(default)]
    payload: BTreeMap<String, Value>,
}

/// Answer to a [`RequestEnvelope`]
#[derive(Debug, Serialize)]
struct ResponseEnvelope {
    correlation_id: String,
    payload: BTreeMap<String, String>,
}

/// Connects the device, publishes a sensor value and checks that the
/// platform saw the device go online, store the value and go offline again.
pub struct ConnectionProbe {
    ctx: ProbeContext,
    listener: Arc<dyn CommandListener>,
    process_window: ProcessWindowClosed,
}

impl ConnectionProbe {
    pub fn new(
        ctx: ProbeContext,
        listener: Arc<dyn CommandListener>,
        process_window: ProcessWindowClosed,
    ) -> Self {
        Self {
            ctx,
            listener,
            process_window,
        }
    }

    fn topic(&self, kind: &str, device: &Device, tail: &str) -> String {
        if self.ctx.config.connector.topics_with_owner {
            format!("{}/{}/{}/{}", kind, device.owner_id, device.local_id, tail)
        } else {
            format!("{}/{}/{}", kind, device.local_id, tail)
        }
    }

    /// Read the connection state and count a mismatch
    async fn expect_state(&self, session: &Session, device: &Device, online: bool) {
        let Some(state) = self
            .ctx
            .call(
                Operation::DeviceRepoRequest,
                "Reading connection state",
                self.ctx.clients.registry.read_connection_state(session, &device.id),
            )
            .await
        else {
            return;
        };

        if state.is_online() != online {
            warn!(state = %state, expected_online = online, "Unexpected device connection state");
            self.ctx.metrics.unexpected(if online {
                Unexpected::DeviceOfflineState
            } else {
                Unexpected::DeviceOnlineState
            });
        }
    }

    /// Compare the last value of the sensor service with the published one
    async fn expect_value(&self, session: &Session, device: &Device, published: i64) {
        let ctx = &self.ctx;
        let Some(device_type) = ctx
            .call(
                Operation::DeviceRepoRequest,
                "Reading device type",
                ctx.clients.registry.read_device_type(session, &device.device_type_id),
            )
            .await
        else {
            return;
        };
        let Some(service_id) = device_type.sensor_service_id() else {
            error!(device_type_id = %device_type.id, "Device type has no sensor service");
            ctx.metrics.uncategorized();
            return;
        };

        let request = LastValueRequest {
            device_id: device.id.clone(),
            service_id: service_id.to_string(),
            column_name: VALUE_COLUMN.to_string(),
        };
        let Some(values) = ctx
            .call(
                Operation::DeviceDataRequest,
                "Querying last value",
                ctx.clients.last_values.last_values(session, &[request]),
            )
            .await
        else {
            return;
        };

        match values.as_slice() {
            [last] if json_number_eq(&last.value, published) => {}
            _ => {
                warn!(published, values = ?values, "Unexpected last value");
                ctx.metrics.unexpected(Unexpected::DeviceData);
            }
        }
    }

    /// Steps that run while the broker connection is open
    async fn connected(
        &self,
        session: &Session,
        device: &Device,
        connection: &Arc<dyn BrokerConnection>,
    ) {
        let ctx = &self.ctx;

        let command_topic = self.topic("command", device, "+");
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = self.listener.clone();
        let on_command: MessageCallback = Arc::new(move |message: BrokerMessage| {
            listener.on_command(&message.topic, &message.payload);
            // Fails only once the responder has stopped.
            let _ = tx.send(message);
        });
        let responder = spawn_responder(ctx.clone(), connection.clone(), rx);

        if ctx
            .call(
                Operation::ConnectorSubscribe,
                "Subscribing to commands",
                connection.subscribe(&command_topic, QoS::ExactlyOnce, on_command),
            )
            .await
            .is_some()
        {
            debug!(topic = %command_topic, "Subscribed to commands");
        }

        let value = rand::thread_rng().gen_range(0..1_000_000_000i64);
        self.publish_value(connection, device, value).await;

        ctx.change_guarantee().await;
        self.expect_state(session, device, true).await;
        self.expect_value(session, device, value).await;

        self.process_window.wait().await;
        responder.abort();
    }

    async fn publish_value(
        &self,
        connection: &Arc<dyn BrokerConnection>,
        device: &Device,
        value: i64,
    ) {
        let segment = &self.ctx.config.device_type.protocol_segment_name;
        let payload = match serde_json::to_vec(&BTreeMap::from([(segment, value.to_string())])) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "Encoding sensor event failed");
                self.ctx.metrics.uncategorized();
                return;
            }
        };

        let topic = self.topic("event", device, "sensor");
        if self
            .ctx
            .call(
                Operation::ConnectorPublish,
                "Publishing sensor event",
                connection.publish(&topic, QoS::ExactlyOnce, false, payload),
            )
            .await
            .is_some()
        {
            debug!(topic = %topic, value, "Published sensor event");
        }
    }
}

#[async_trait]
impl Probe for ConnectionProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Connection
    }

    #[instrument(skip_all, fields(probe = "connection", device_id = %subject.device.id))]
    async fn run(&self, session: &Session, subject: &TestSubject) {
        let ctx = &self.ctx;
        let device = &subject.device;

        self.expect_state(session, device, false).await;

        let hub = match SetupResolver::new(ctx.clone()).ensure_hub(session, device).await {
            Ok(hub) => hub,
            Err(err) => {
                error!(error = %err, "Hub membership check failed");
                return;
            }
        };

        let connector = &ctx.config.connector;
        let options = ConnectOptions {
            broker_url: connector.broker_url.clone(),
            client_id: hub.id.clone(),
            username: connector.username.clone(),
            password: connector.password.clone(),
            clean_session: true,
        };
        let Some(connection) = ctx
            .call(
                Operation::ConnectorLogin,
                "Connecting to broker",
                ctx.clients.broker.connect(&options),
            )
            .await
        else {
            return;
        };
        info!(hub_id = %hub.id, "Connected to broker");

        self.connected(session, device, &connection).await;

        connection.disconnect(connector.disconnect_quiesce).await;
        info!("Disconnected from broker");

        ctx.change_guarantee().await;
        self.expect_state(session, device, false).await;
    }
}

/// Answer every command on the mirrored response topic
fn spawn_responder(
    ctx: ProbeContext,
    connection: Arc<dyn BrokerConnection>,
    mut commands: mpsc::UnboundedReceiver<BrokerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = commands.recv().await {
            let Some(response) = response_for(&message) else {
                ctx.metrics.uncategorized();
                continue;
            };
            if let Err(err) = connection
                .publish(&response.topic, QoS::ExactlyOnce, false, response.payload)
                .await
            {
                error!(error = %err, topic = %response.topic, "Publishing command response failed");
                ctx.metrics.uncategorized();
            }
        }
    })
}

/// Build the response to a command: same correlation id, same payload keys
/// with empty values, published on `response/...`.
fn response_for(message: &BrokerMessage) -> Option<BrokerMessage> {
    let request: RequestEnvelope = match serde_json::from_slice(&message.payload) {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, topic = %message.topic, "Decoding command failed");
            return None;
        }
    };

    let response = ResponseEnvelope {
        correlation_id: request.correlation_id,
        payload: request
            .payload
            .into_keys()
            .map(|key| (key, String::new()))
            .collect(),
    };
    match serde_json::to_vec(&response) {
        Ok(payload) => Some(BrokerMessage {
            topic: message.topic.replacen("command/", "response/", 1),
            payload,
        }),
        Err(err) => {
            error!(error = %err, "Encoding command response failed");
            None
        }
    }
}

/// Numeric equality as JSON sees it: `42`, `42.0` match, `"42"` does not
fn json_number_eq(value: &Value, expected: i64) -> bool {
    value.as_f64() == Some(expected as f64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_number_eq() {
        assert!(json_number_eq(&json!(42), 42));
        assert!(json_number_eq(&json!(42.0), 42));
        assert!(!json_number_eq(&json!("42"), 42));
        assert!(!json_number_eq(&json!(43), 42));
        assert!(!json_number_eq(&Value::Null, 42));
    }

    #[test]
    fn test_response_mirrors_command() {
        let message = BrokerMessage {
            topic: "command/owner/canary_1/cmd".to_string(),
            payload: serde_json::to_vec(&json!({
                "correlation_id": "c-1",
                "payload": {"data": "on", "extra": 1},
                "device_id": "ignored"
            }))
            .unwrap(),
        };

        let response = response_for(&message).unwrap();
        assert_eq!(response.topic, "response/owner/canary_1/cmd");

        let body: Value = serde_json::from_slice(&response.payload).unwrap();
        assert_eq!(
            body,
            json!({"correlation_id": "c-1", "payload": {"data": "", "extra": ""}})
        );
    }

    #[test]
    fn test_undecodable_command_has_no_response() {
        let message = BrokerMessage {
            topic: "command/canary_1/cmd".to_string(),
            payload: b"not json".to_vec(),
        };
        assert!(response_for(&message).is_none());
    }
}
