//! MQTT transport for FarmBot devices
//!
//! The broker authenticates with the device id as username and the session
//! token as password. rumqttc splits a connection into an `AsyncClient`
//! (cheap, cloneable, used for publish/subscribe) and an `EventLoop` that must
//! be polled continuously; the event loop runs on a background pump task that
//! forwards inbound publishes into the inbox.
//!
//! Sessions are clean, so the broker forgets subscriptions whenever the
//! connection drops. The transport remembers what it subscribed to and the
//! pump subscribes again after every reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use farmbot_core::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEP_ALIVE, DEFAULT_MQTT_PORT};

use crate::{error::*, Inbox, Message, Transport};

/// Requests buffered between client handles and the event loop
const REQUEST_CAPACITY: usize = 16;

/// Inbound messages buffered for the consumer
const INBOX_CAPACITY: usize = 64;

/// Delay before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT transport for FarmBot devices
pub struct MqttTransport {
    host: String,
    port: u16,
    client_id: String,
    username: String,
    password: String,
    keep_alive: Duration,
    connect_timeout: Duration,
    client: Option<AsyncClient>,
    pump: Option<JoinHandle<()>>,
    online: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MqttTransport {
    /// Create new MQTT transport on the default port
    pub fn new(host: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MQTT_PORT,
            client_id: client_id.into(),
            username: String::new(),
            password: String::new(),
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            client: None,
            pump: None,
            online: Arc::new(AtomicBool::new(false)),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set broker credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if !self.username.is_empty() {
            options.set_credentials(&self.username, &self.password);
        }
        options
    }
}

/// Poll until the broker answers the CONNECT
async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(Error::Refused(format!("{:?}", code))),
                };
            }
            event => trace!("Pre-connack event: {:?}", event),
        }
    }
}

/// Shared between the transport and its pump task
struct PumpContext {
    client: AsyncClient,
    inbox: mpsc::Sender<Message>,
    online: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl PumpContext {
    /// Restore subscriptions lost with the previous broker session
    fn resubscribe(&self) {
        let topics = self.subscriptions.lock().clone();
        debug!(
            "Broker session re-established, resubscribing to {} topic(s)",
            topics.len()
        );

        for topic in topics {
            // The pump drains the request queue, so it must not wait on it
            if let Err(e) = self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                warn!("Failed to resubscribe to {}: {}", topic, e);
            }
        }
    }
}

/// Drive the event loop and forward publishes until the inbox is dropped
async fn pump(mut eventloop: EventLoop, context: PumpContext) {
    let PumpContext { inbox, online, .. } = &context;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!(
                    "Received {} bytes on {}",
                    publish.payload.len(),
                    publish.topic
                );

                let message = Message {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                if inbox.send(message).await.is_err() {
                    debug!("Inbox closed, stopping MQTT pump");
                    break;
                }
            }
            // The first CONNACK is consumed by `connect`
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                online.store(true, Ordering::Release);
                context.resubscribe();
            }
            Ok(event) => trace!("MQTT event: {:?}", event),
            Err(e) => {
                // rumqttc reconnects on the next poll
                warn!("MQTT connection error: {}", e);
                online.store(false, Ordering::Release);
                if inbox.is_closed() {
                    break;
                }
                sleep(RECONNECT_DELAY).await;
            }
        }
    }

    online.store(false, Ordering::Release);
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<Inbox> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Connecting to {}...", self.remote_addr());

        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);

        timeout(self.connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| Error::ConnectionTimeout)??;

        debug!("Connected to {}", self.remote_addr());

        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.online.store(true, Ordering::Release);

        let context = PumpContext {
            client: client.clone(),
            inbox: tx,
            online: Arc::clone(&self.online),
            subscriptions: Arc::clone(&self.subscriptions),
        };
        self.pump = Some(tokio::spawn(pump(eventloop, context)));
        self.client = Some(client);

        Ok(rx)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            debug!("Disconnecting from {}...", self.remote_addr());

            // Graceful shutdown
            let _ = client.disconnect().await;
        }

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        self.online.store(false, Ordering::Release);
        self.subscriptions.lock().clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.online.load(Ordering::Acquire)
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        let client = self.client.as_ref().ok_or(Error::NotConnected)?;

        debug!("Subscribing to {}", topic);
        client.subscribe(topic, QoS::AtMostOnce).await?;

        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.iter().any(|known| known == topic) {
            subscriptions.push(topic.to_string());
        }

        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        let client = self.client.as_ref().ok_or(Error::NotConnected)?;

        trace!("Publishing {} bytes to {}", payload.len(), topic);
        client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await?;

        Ok(())
    }

    fn remote_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            warn!("MQTT transport dropped while still connected");
            pump.abort();
        }
    }
}
