//! Transport layer for the FarmBot protocol
//!
//! Provides publish/subscribe access to the device's message broker.

pub mod error;
pub mod mqtt;

pub use error::{Error, Result};
pub use mqtt::MqttTransport;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

/// Stream of inbound messages, handed out once per connection
pub type Inbox = mpsc::Receiver<Message>;

/// Transport trait for different broker connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the broker
    ///
    /// Resolves once the broker has accepted the session.
    async fn connect(&mut self) -> Result<Inbox>;

    /// Disconnect from the broker
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Subscribe to a topic; messages arrive in the inbox
    async fn subscribe(&self, topic: &str) -> Result<()>;

    /// Publish raw bytes to a topic
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}
