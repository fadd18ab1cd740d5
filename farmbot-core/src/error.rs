//! Error types for farmbot-core

/// Result type alias for farmbot-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Message could not be encoded or decoded as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session token is not a well-formed JWT
    #[error("Malformed session token: {0}")]
    MalformedToken(String),

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Session not initialized
    #[error("Session not initialized - connect to device first")]
    SessionNotInitialized,
}

