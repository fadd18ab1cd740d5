//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] farmbot_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] farmbot_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] farmbot_types::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("You did not set {0} in the environment")]
    MissingCredentials(String),

    #[error("Invalid configuration for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Device not connected")]
    NotConnected,

    #[error("Device session already attached")]
    AlreadyAttached,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("RPC {label} failed: {message}")]
    RpcFailed { label: String, message: String },

    #[error("RPC {label} timed out after {millis}ms")]
    RpcTimeout { label: String, millis: u128 },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}
