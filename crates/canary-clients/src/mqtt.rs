//! MQTT broker client built on `rumqttc`
//!
//! `rumqttc` drives the connection from an event loop that has to be polled.
//! Each connection spawns one task polling it: incoming publishes are handed to
//! the matching subscription callbacks, acknowledgements are forwarded to the
//! operation waiting for them, and lost connections are re-established after
//! a short pause.
//!
//! Operations that wait for an acknowledgement hold the acknowledgement
//! receiver for their whole duration, so at most one is in flight per
//! connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, SubscribeReasonCode, Transport,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{Broker, BrokerConnection, BrokerMessage, ConnectOptions, MessageCallback, QoS};
use crate::config::{validate_keep_alive, BrokerClientConfig};
use crate::error::{ClientError, ClientResult};

/// Request queue capacity of the `rumqttc` client
const REQUEST_CAPACITY: usize = 16;

/// Acknowledgements relayed from the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
enum Ack {
    Connected,
    ConnectFailed(String),
    Subscribed { granted: bool },
    PubAck,
    PubComp,
}

type Subscriptions = Arc<RwLock<Vec<(String, MessageCallback)>>>;

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Host, port and TLS flag of a broker URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

pub(crate) fn parse_broker_url(raw: &str) -> ClientResult<BrokerAddress> {
    let url = Url::parse(raw)?;
    let tls = match url.scheme() {
        "tcp" | "mqtt" => false,
        "ssl" | "tls" | "mqtts" => true,
        other => {
            return Err(ClientError::Config(format!(
                "unsupported broker URL scheme '{}'",
                other
            )))
        }
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ClientError::Config(format!("broker URL '{}' has no host", raw)))?
        .to_string();
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok(BrokerAddress { host, port, tls })
}

/// Opens `rumqttc` connections
#[derive(Debug, Clone, Default)]
pub struct MqttBroker {
    config: BrokerClientConfig,
}

impl MqttBroker {
    pub fn new(config: BrokerClientConfig) -> Self {
        Self { config }
    }

    fn mqtt_options(&self, options: &ConnectOptions) -> ClientResult<MqttOptions> {
        let address = parse_broker_url(&options.broker_url)?;
        // rumqttc panics on a sub-second keep-alive.
        let keep_alive =
            validate_keep_alive(self.config.keep_alive).map_err(ClientError::Config)?;
        let mut mqtt = MqttOptions::new(options.client_id.clone(), address.host, address.port);
        mqtt.set_credentials(options.username.clone(), options.password.clone());
        mqtt.set_clean_session(options.clean_session);
        mqtt.set_keep_alive(keep_alive);
        if address.tls {
            mqtt.set_transport(Transport::tls_with_default_config());
        }
        Ok(mqtt)
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn connect(&self, options: &ConnectOptions) -> ClientResult<Arc<dyn BrokerConnection>> {
        let mqtt = self.mqtt_options(options)?;
        let (client, eventloop) = AsyncClient::new(mqtt, REQUEST_CAPACITY);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let subscriptions: Subscriptions = Arc::default();
        let closing = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(drive(
            eventloop,
            ack_tx,
            subscriptions.clone(),
            closing.clone(),
            options.client_id.clone(),
            self.config.reconnect_delay,
        ));

        let connection = MqttConnection {
            client,
            client_id: options.client_id.clone(),
            acks: Mutex::new(ack_rx),
            subscriptions,
            closing,
            task: Mutex::new(Some(task)),
            ack_timeout: self.config.ack_timeout,
        };

        let connected = {
            let mut acks = connection.acks.lock().await;
            connection
                .await_ack(&mut acks, "connack", |ack| {
                    matches!(ack, Ack::Connected | Ack::ConnectFailed(_))
                })
                .await
        };

        match connected {
            Ok(Ack::Connected) => {
                info!(client_id = %options.client_id, "Connected to broker");
                Ok(Arc::new(connection))
            }
            Ok(Ack::ConnectFailed(reason)) => {
                connection.abort().await;
                Err(ClientError::Broker(reason))
            }
            Ok(other) => {
                connection.abort().await;
                Err(ClientError::Broker(format!("unexpected {:?}", other)))
            }
            Err(err) => {
                connection.abort().await;
                Err(err)
            }
        }
    }
}

/// Polls the event loop until the connection is closed on purpose
async fn drive(
    mut eventloop: EventLoop,
    acks: mpsc::UnboundedSender<Ack>,
    subscriptions: Subscriptions,
    closing: Arc<AtomicBool>,
    client_id: String,
    reconnect_delay: Duration,
) {
    let mut connected = false;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if connected {
                    info!(client_id = %client_id, "Reconnected to broker");
                }
                connected = true;
                let _ = acks.send(Ack::Connected);
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                let granted = suback
                    .return_codes
                    .iter()
                    .all(|code| !matches!(code, SubscribeReasonCode::Failure));
                let _ = acks.send(Ack::Subscribed { granted });
            }
            Ok(Event::Incoming(Packet::PubAck(_))) => {
                let _ = acks.send(Ack::PubAck);
            }
            Ok(Event::Incoming(Packet::PubComp(_))) => {
                let _ = acks.send(Ack::PubComp);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = BrokerMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                for (filter, callback) in subscriptions.read().await.iter() {
                    if rumqttc::matches(&message.topic, filter) {
                        callback(message.clone());
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(client_id = %client_id, "Disconnect sent");
            }
            Ok(_) => {}
            Err(err) => {
                if closing.load(Ordering::SeqCst) {
                    debug!(client_id = %client_id, "Broker connection closed");
                    break;
                }
                if !connected {
                    let _ = acks.send(Ack::ConnectFailed(err.to_string()));
                    break;
                }
                warn!(client_id = %client_id, error = %err, "Lost broker connection");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

/// A live `rumqttc` connection
pub struct MqttConnection {
    client: AsyncClient,
    client_id: String,
    acks: Mutex<mpsc::UnboundedReceiver<Ack>>,
    subscriptions: Subscriptions,
    closing: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    ack_timeout: Duration,
}

impl MqttConnection {
    async fn await_ack<F>(
        &self,
        acks: &mut mpsc::UnboundedReceiver<Ack>,
        what: &str,
        accept: F,
    ) -> ClientResult<Ack>
    where
        F: Fn(&Ack) -> bool,
    {
        let wait = async {
            while let Some(ack) = acks.recv().await {
                if accept(&ack) {
                    return Ok(ack);
                }
                debug!(client_id = %self.client_id, ?ack, "Skipping unrelated acknowledgement");
            }
            Err(ClientError::Broker("connection closed".to_string()))
        };
        tokio::time::timeout(self.ack_timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout(what.to_string()))?
    }

    /// Drop acknowledgements left over from earlier operations
    fn drain(acks: &mut mpsc::UnboundedReceiver<Ack>) {
        while acks.try_recv().is_ok() {}
    }

    async fn abort(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl BrokerConnection for MqttConnection {
    async fn subscribe(
        &self,
        topic: &str,
        qos: QoS,
        callback: MessageCallback,
    ) -> ClientResult<()> {
        self.subscriptions
            .write()
            .await
            .push((topic.to_string(), callback));

        let mut acks = self.acks.lock().await;
        Self::drain(&mut acks);
        self.client.subscribe(topic, to_mqtt_qos(qos)).await?;
        match self
            .await_ack(&mut acks, "suback", |ack| matches!(ack, Ack::Subscribed { .. }))
            .await?
        {
            Ack::Subscribed { granted: true } => {
                debug!(client_id = %self.client_id, topic, "Subscribed");
                Ok(())
            }
            _ => Err(ClientError::Broker(format!(
                "subscription to '{}' rejected",
                topic
            ))),
        }
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> ClientResult<()> {
        let mut acks = self.acks.lock().await;
        Self::drain(&mut acks);
        self.client
            .publish(topic, to_mqtt_qos(qos), retain, payload)
            .await?;
        match qos {
            QoS::AtMostOnce => {}
            QoS::AtLeastOnce => {
                self.await_ack(&mut acks, "puback", |ack| *ack == Ack::PubAck)
                    .await?;
            }
            QoS::ExactlyOnce => {
                self.await_ack(&mut acks, "pubcomp", |ack| *ack == Ack::PubComp)
                    .await?;
            }
        }
        Ok(())
    }

    async fn disconnect(&self, quiesce: Duration) {
        // Let in-flight acknowledgements complete first.
        drop(self.acks.lock().await);
        self.closing.store(true, Ordering::SeqCst);
        if let Err(err) = self.client.disconnect().await {
            debug!(client_id = %self.client_id, error = %err, "Disconnect request failed");
        }

        if let Some(mut task) = self.task.lock().await.take() {
            if tokio::time::timeout(quiesce, &mut task).await.is_err() {
                task.abort();
            }
        }
        info!(client_id = %self.client_id, "Disconnected from broker");
    }
}
