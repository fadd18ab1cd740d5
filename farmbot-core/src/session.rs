//! Session management for the FarmBot protocol
//!
//! A session represents a live broker connection to one device and tracks:
//! - Device id (from the session token)
//! - RPC request counter
//! - Connection state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::topics::Topics;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// Connected to the broker and subscribed to device replies
    Connected,
}

/// Session manager
///
/// Thread-safe and can be cloned cheaply (Arc internally).
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Device id (None when not connected)
    bot: parking_lot::RwLock<Option<String>>,

    /// Number of RPC requests issued in this session
    requests: AtomicU64,

    /// Current session state
    state: parking_lot::RwLock<SessionState>,
}

impl Session {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                bot: parking_lot::RwLock::new(None),
                requests: AtomicU64::new(0),
                state: parking_lot::RwLock::new(SessionState::Disconnected),
            }),
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(self.state(), SessionState::Connected)
    }

    /// Device id of the connected bot
    pub fn bot(&self) -> Option<String> {
        self.inner.bot.read().clone()
    }

    /// Topics of the connected bot
    pub fn topics(&self) -> Result<Topics> {
        self.inner
            .bot
            .read()
            .as_deref()
            .map(Topics::for_bot)
            .ok_or(Error::SessionNotInitialized)
    }

    /// Initialize session for a device
    pub fn initialize(&self, bot: impl Into<String>) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot initialize from state: {:?}",
                *state
            )));
        }

        let bot = bot.into();
        debug!("Session initialized for {}", bot);

        *self.inner.bot.write() = Some(bot);
        self.inner.requests.store(0, Ordering::Release);
        *state = SessionState::Connected;

        Ok(())
    }

    /// Close session
    pub fn close(&self) {
        if let Some(bot) = self.inner.bot.write().take() {
            debug!("Session closed for {} after {} requests", bot, self.requests_sent());
        }
        *self.inner.state.write() = SessionState::Disconnected;
    }

    /// Allocate a label for the next RPC request
    ///
    /// Labels are random v4 UUIDs so replies cannot collide across clients
    /// sharing the same device tree.
    pub fn next_label(&self) -> Result<String> {
        if !self.is_connected() {
            return Err(Error::SessionNotInitialized);
        }

        self.inner.requests.fetch_add(1, Ordering::AcqRel);
        Ok(uuid::Uuid::new_v4().to_string())
    }

    /// Number of RPC requests issued since the session was initialized
    pub fn requests_sent(&self) -> u64 {
        self.inner.requests.load(Ordering::Acquire)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
