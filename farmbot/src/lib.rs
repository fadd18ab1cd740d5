//! # farmbot
//!
//! Rust client for remote-controlling a FarmBot.
//!
//! ## Features
//!
//! - Session token exchange against the web app
//! - Device session over MQTT with CeleryScript RPCs
//! - Async/await API using Tokio
//! - A demo application that bounces the Z axis on a timer
//!
//! ## Quick Start
//!
//! ```no_run
//! use farmbot::{Credentials, Farmbot, Offset, TokenClient};
//!
//! #[tokio::main]
//! async fn main() -> farmbot::Result<()> {
//!     // Trade credentials for a session token
//!     let api = TokenClient::new("https://my.farm.bot")?;
//!     let token = api
//!         .create_token(&Credentials::new("you@example.com", "secret")?)
//!         .await?;
//!
//!     // Connect to the device
//!     let mut bot = Farmbot::new(token);
//!     bot.connect().await?;
//!
//!     // Raise the Z axis by one millimeter
//!     bot.move_relative(Offset::z(1.0)).await?;
//!
//!     bot.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod device;
pub mod error;
mod rpc;

#[cfg(test)]
mod test_support;

// Re-exports
pub use api::TokenClient;
pub use config::Config;
pub use device::Farmbot;
pub use error::{Error, Result};

// Re-export types
pub use farmbot_core::{Command, RpcReply, RpcRequest, Session};
pub use farmbot_types::{Credentials, Direction, Offset};
