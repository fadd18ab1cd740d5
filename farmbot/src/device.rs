//! High-level device interface

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use farmbot_core::constants::{DEFAULT_MQTT_PORT, DEFAULT_RPC_TIMEOUT_MS, DEFAULT_SPEED};
use farmbot_core::{decode_claims, Command, RpcReply, RpcRequest, Session};
use farmbot_transport::{Inbox, MqttTransport, Transport};
use farmbot_types::Offset;

use crate::app::Bot;
use crate::error::{Error, Result};
use crate::rpc::PendingRpcs;

/// FarmBot device session
///
/// Wraps a session token into a broker connection that can send commands to
/// one device.
///
/// # Examples
///
/// ```no_run
/// use farmbot::{Farmbot, Offset};
///
/// #[tokio::main]
/// async fn main() -> farmbot::Result<()> {
///     let token = std::env::var("FARMBOT_TOKEN").unwrap();
///     let mut bot = Farmbot::new(token);
///
///     bot.connect().await?;
///     bot.move_relative(Offset::z(1.0)).await?;
///
///     bot.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Farmbot {
    token: String,
    transport: Option<Box<dyn Transport>>,
    session: Session,
    pending: PendingRpcs,
    dispatcher: Option<JoinHandle<()>>,
    mqtt_port: u16,
    timeout: Duration,
    speed: u32,
}

impl Farmbot {
    /// Create a new device session from an encoded session token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            transport: None,
            session: Session::new(),
            pending: PendingRpcs::default(),
            dispatcher: None,
            mqtt_port: DEFAULT_MQTT_PORT,
            timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            speed: DEFAULT_SPEED,
        }
    }

    /// Set broker port
    pub fn with_mqtt_port(mut self, port: u16) -> Self {
        self.mqtt_port = port;
        self
    }

    /// Set how long to wait for a command reply
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set movement speed (percent of max speed)
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    /// Use a custom transport instead of dialing the broker named in the token
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Session token this device was created with
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Device id, once connected
    pub fn bot_id(&self) -> Option<String> {
        self.session.bot()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
            && self
                .transport
                .as_ref()
                .is_some_and(|transport| transport.is_connected())
    }

    /// Connect to the device's message broker
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The token is not a decodable JWT
    /// - The broker is unreachable or rejects the token
    /// - Subscribing to device replies fails
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_connected() {
            return Err(farmbot_core::Error::InvalidSessionState("Already connected".into()).into());
        }

        let claims = decode_claims(&self.token)?;
        let topics = farmbot_core::Topics::for_bot(&claims.bot);

        if self.transport.is_none() {
            let client_id = uuid::Uuid::new_v4().to_string();
            let mqtt: Box<dyn Transport> = Box::new(
                MqttTransport::new(&claims.mqtt, client_id)
                    .with_port(self.mqtt_port)
                    .with_credentials(claims.mqtt_username(), self.token.clone()),
            );
            self.transport = Some(mqtt);
        }
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;

        info!("Connecting to {} as {}...", transport.remote_addr(), claims.bot);

        let inbox = transport.connect().await?;

        if let Err(e) = transport.subscribe(&topics.from_device).await {
            warn!("Failed to subscribe to {}: {}", topics.from_device, e);
            let _ = transport.disconnect().await;
            return Err(e.into());
        }

        self.dispatcher = Some(tokio::spawn(dispatch_replies(
            inbox,
            topics.from_device,
            self.pending.clone(),
        )));
        self.session.initialize(claims.bot)?;

        info!("Connected successfully (bot={})", self.session.bot().unwrap_or_default());

        Ok(())
    }

    /// Disconnect from the broker
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.session.is_connected() {
            return Ok(());
        }

        info!("Disconnecting...");

        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        self.pending.clear();

        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect().await?;
        }
        self.session.close();

        info!("Disconnected");
        Ok(())
    }

    /// Offset the current position
    ///
    /// Resolves once the device acknowledges the command with `rpc_ok`.
    pub async fn move_relative(&self, offset: Offset) -> Result<()> {
        self.ensure_connected()?;

        debug!("Moving relative {}", offset);

        self.send_rpc(vec![Command::move_relative(offset, self.speed)])
            .await
    }

    // Helper methods

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn send_rpc(&self, body: Vec<Command>) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(Error::NotConnected)?;
        let topics = self.session.topics()?;
        let label = self.session.next_label()?;

        let request = RpcRequest::new(label.clone(), body);
        let payload = Bytes::from(request.encode()?);

        // Register before publishing; the reply can beat publish() back
        let reply = self.pending.register(&label);

        trace!("Sending rpc_request {}: {:?}", label, request);

        if let Err(e) = transport.publish(&topics.from_clients, payload).await {
            self.pending.cancel(&label);
            return Err(e.into());
        }

        let reply = match timeout(self.timeout, reply).await {
            Ok(Ok(reply)) => reply,
            // Dispatcher went away: connection closed under us
            Ok(Err(_)) => return Err(Error::NotConnected),
            Err(_) => {
                self.pending.cancel(&label);
                return Err(Error::RpcTimeout {
                    label,
                    millis: self.timeout.as_millis(),
                });
            }
        };

        match reply.message() {
            None => {
                debug!("rpc_ok {}", label);
                Ok(())
            }
            Some(message) => Err(Error::RpcFailed { label, message }),
        }
    }
}

/// Route `rpc_ok` / `rpc_error` replies to their waiters until the inbox closes
async fn dispatch_replies(mut inbox: Inbox, from_device: String, pending: PendingRpcs) {
    while let Some(message) = inbox.recv().await {
        if message.topic != from_device {
            trace!("Ignoring message on {}", message.topic);
            continue;
        }

        match RpcReply::decode(&message.payload) {
            Ok(reply) => {
                pending.resolve(reply);
            }
            Err(e) => debug!("Ignoring non-RPC message on {}: {}", message.topic, e),
        }
    }

    debug!("Inbox closed, failing outstanding requests");
    pending.clear();
}

#[async_trait]
impl Bot for Farmbot {
    async fn connect(&mut self) -> Result<()> {
        Farmbot::connect(self).await
    }

    async fn move_relative(&self, offset: Offset) -> Result<()> {
        Farmbot::move_relative(self, offset).await
    }
}

impl Drop for Farmbot {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}
