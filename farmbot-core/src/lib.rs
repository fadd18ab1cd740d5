//! # farmbot-core
//!
//! Core protocol implementation for FarmBot devices.
//!
//! This crate provides the low-level protocol primitives:
//! - CeleryScript RPC request/reply messages
//! - Session token (JWT) claim decoding
//! - MQTT topic naming
//! - Session state tracking
//! - Protocol constants

pub mod celery;
pub mod constants;
pub mod error;
pub mod session;
pub mod token;
pub mod topics;

pub use celery::{Command, RpcReply, RpcRequest};
pub use error::{Error, Result};
pub use session::{Session, SessionState};
pub use token::{decode_claims, TokenClaims};
pub use topics::Topics;
