//! Startup sequence: token, session, connect

use tracing::{debug, error, info};

use farmbot_types::Credentials;

use super::{ApplicationState, Bot, TokenIssuer};
use crate::error::{Error, Result};

/// Startup progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    Unauthenticated,
    Connecting,
    /// Session attached; the motion loop may be armed
    Connected,
    /// A step failed; nothing will be sent to the device
    Failed,
}

/// Runs the one-shot startup sequence
#[derive(Debug)]
pub struct Startup {
    state: StartupState,
}

impl Startup {
    pub fn new() -> Self {
        Self {
            state: StartupState::Unauthenticated,
        }
    }

    pub fn state(&self) -> StartupState {
        self.state
    }

    /// Request a token, build the session from it, connect, and attach the
    /// session to `app`
    ///
    /// `make_bot` receives exactly the token the issuer returned. Each step
    /// waits for the previous one; the first failure moves to
    /// [`StartupState::Failed`], is logged, and is returned.
    pub async fn run<I, B, F>(
        &mut self,
        credentials: &Credentials,
        issuer: &I,
        app: &mut ApplicationState<B>,
        make_bot: F,
    ) -> Result<()>
    where
        I: TokenIssuer + ?Sized,
        B: Bot,
        F: FnOnce(String) -> B,
    {
        if self.state != StartupState::Unauthenticated {
            return Err(Error::InvalidState(format!(
                "startup already ran ({:?})",
                self.state
            )));
        }

        self.state = StartupState::Connecting;
        debug!("Requesting token for {}", credentials.email());

        let result = async {
            let token = issuer.create_token(credentials).await?;

            let mut bot = make_bot(token);
            bot.connect().await?;

            app.attach_session(bot)?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.state = StartupState::Connected;
                info!("CONNECTED TO FARMBOT!");
                Ok(())
            }
            Err(err) => {
                self.state = StartupState::Failed;
                error!(error = ?err, "=== ERROR ===");
                Err(err)
            }
        }
    }
}

impl Default for Startup {
    fn default() -> Self {
        Self::new()
    }
}
