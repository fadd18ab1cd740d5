//! Demo application: authenticate, connect, then bounce the Z axis
//!
//! The pieces are generic over two seams so the lifecycle can be driven
//! without a web app or a broker:
//! - [`TokenIssuer`] trades credentials for a session token
//! - [`Bot`] is a connectable device session that can move

mod motion;
mod startup;
mod state;

pub use motion::{CommandOutcome, FailurePolicy, MotionLoop, Tick};
pub use startup::{Startup, StartupState};
pub use state::{ApplicationState, CommandId, PendingMove};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use farmbot_types::{Credentials, Offset};

use crate::error::Result;

/// Something that can issue session tokens
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn create_token(&self, credentials: &Credentials) -> Result<String>;
}

/// A device session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Resolves once the session is live
    async fn connect(&mut self) -> Result<()>;

    /// Resolves once the device has executed the move
    async fn move_relative(&self, offset: Offset) -> Result<()>;
}

/// Run startup, then the motion loop, until `shutdown` resolves
///
/// A failed startup arms nothing: no command is ever sent and the call just
/// waits for `shutdown`. Returns how far startup got.
pub async fn run_until<I, B, F, S>(
    credentials: &Credentials,
    issuer: &I,
    make_bot: F,
    period: Duration,
    policy: FailurePolicy,
    shutdown: S,
) -> StartupState
where
    I: TokenIssuer + ?Sized,
    B: Bot,
    F: FnOnce(String) -> B,
    S: Future<Output = ()>,
{
    let mut state = ApplicationState::new();
    let mut startup = Startup::new();

    // Startup logs its own failure
    let motion = match startup.run(credentials, issuer, &mut state, make_bot).await {
        Ok(()) => match MotionLoop::arm(state, policy) {
            Ok(motion) => Some(motion),
            Err(err) => {
                error!(error = ?err, "=== ERROR ===");
                None
            }
        },
        Err(_) => None,
    };

    match motion {
        Some(motion) => {
            tokio::select! {
                _ = motion.run(period) => {}
                _ = shutdown => {}
            }
        }
        None => {
            debug!("Startup did not connect, idling until shutdown");
            shutdown.await;
        }
    }

    startup.state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve_once, LogCapture};
    use crate::{Error, TokenClient};

    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::time::{sleep, Instant};

    fn credentials() -> Credentials {
        Credentials::new("a@example.com", "x").unwrap()
    }

    /// a@example.com / x against a web app issuing "T123", through to the
    /// first command of the motion loop
    #[tokio::test]
    async fn test_end_to_end_first_tick() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let (server, request) = serve_once(200, r#"{"token":{"encoded":"T123"}}"#).await;
        let config = crate::Config::from_lookup(|key| match key {
            "FARMBOT_EMAIL" => Some("a@example.com".to_string()),
            "FARMBOT_PASSWORD" => Some("x".to_string()),
            "FARMBOT_SERVER" => Some(server.clone()),
            _ => None,
        })
        .unwrap();
        let issuer = TokenClient::new(&config.server).unwrap();

        let seen_token = Arc::new(Mutex::new(None));
        let sent = Arc::new(Mutex::new(Vec::new()));

        let mut state = ApplicationState::new();
        let mut startup = Startup::new();
        startup
            .run(&config.credentials, &issuer, &mut state, {
                let seen_token = Arc::clone(&seen_token);
                let sent = Arc::clone(&sent);
                move |token| {
                    *seen_token.lock() = Some(token);
                    let mut bot = MockBot::new();
                    bot.expect_connect().times(1).returning(|| Ok(()));
                    bot.expect_move_relative().returning(move |offset| {
                        sent.lock().push(offset);
                        Ok(())
                    });
                    bot
                }
            })
            .await
            .unwrap();

        assert_eq!(startup.state(), StartupState::Connected);
        assert_eq!(seen_token.lock().as_deref(), Some("T123"));
        assert!(request.await.unwrap().contains("a@example.com"));

        let mut motion = MotionLoop::arm(state, config.failure_policy).unwrap();
        assert_eq!(motion.tick(), Tick::Issued(Offset::new(0.0, 0.0, 1.0)));

        let outcome = motion.next_outcome().await.unwrap();
        motion.settle(outcome);

        assert_eq!(*sent.lock(), vec![Offset::new(0.0, 0.0, 1.0)]);

        let connected = logs.find("CONNECTED TO FARMBOT!").expect("connect line");
        let first_move = logs.find("Move Z Axis up").expect("first move line");
        assert!(connected < first_move, "{}", logs.contents());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_moves_until_shutdown() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_create_token()
            .times(1)
            .returning(|_| Ok("T123".to_string()));

        let sent = Arc::new(Mutex::new(Vec::new()));
        let make_bot = {
            let sent = Arc::clone(&sent);
            move |_token: String| {
                let mut bot = MockBot::new();
                bot.expect_connect().times(1).returning(|| Ok(()));
                bot.expect_move_relative().returning(move |offset| {
                    sent.lock().push(offset.z);
                    Ok(())
                });
                bot
            }
        };

        // Ticks at 3 s and 6 s, shutdown at 7 s
        let state = run_until(
            &credentials(),
            &issuer,
            make_bot,
            Duration::from_millis(3000),
            FailurePolicy::Reset,
            sleep(Duration::from_millis(7000)),
        )
        .await;

        assert_eq!(state, StartupState::Connected);
        assert_eq!(*sent.lock(), vec![1.0, -1.0]);

        let output = logs.contents();
        let connected = output.find("CONNECTED TO FARMBOT!").expect("connect line");
        let up = output.find("Move Z Axis up").expect("up line");
        let down = output.find("Move Z Axis down").expect("down line");
        assert!(connected < up && up < down, "{}", output);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_startup_idles_until_shutdown() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        let mut issuer = MockTokenIssuer::new();
        issuer
            .expect_create_token()
            .times(1)
            .returning(|_| Err(Error::InvalidResponse("bad credentials".into())));

        let started = Instant::now();
        let state = run_until(
            &credentials(),
            &issuer,
            |_token: String| -> MockBot { panic!("no session may be built without a token") },
            Duration::from_millis(3000),
            FailurePolicy::Reset,
            sleep(Duration::from_secs(60)),
        )
        .await;

        assert_eq!(state, StartupState::Failed);
        // Still running long after the first tick would have fired
        assert!(started.elapsed() >= Duration::from_secs(60));

        let output = logs.contents();
        assert!(output.contains("=== ERROR ==="), "{}", output);
        assert!(!output.contains("CONNECTED TO FARMBOT!"));
        assert!(!output.contains("Move Z Axis"));
    }
}
