//! Fixed-period motion loop with a single in-flight command
//!
//! Every tick either admits one move through the busy guard or is skipped.
//! Commands run on their own task and report back over a channel; the loop
//! applies each outcome, success or failure, before the slot can be reused.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use farmbot_types::Offset;

use super::{ApplicationState, Bot, CommandId};
use crate::error::{Error, Result};

/// What a failed move does to the busy guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Free the slot; the same move is retried on the next tick
    #[default]
    Reset,
    /// Keep the slot occupied; the loop never sends again
    Halt,
}

/// Result of one loop invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Issued(Offset),
    Skipped,
}

/// Completion report of a spawned move
#[derive(Debug)]
pub struct CommandOutcome {
    pub id: CommandId,
    pub result: Result<()>,
}

struct Driver<B> {
    state: ApplicationState<B>,
    bot: Arc<B>,
    policy: FailurePolicy,
    completions: mpsc::UnboundedSender<CommandOutcome>,
}

impl<B: Bot> Driver<B> {
    fn tick(&mut self) -> Tick {
        let Some(pending) = self.state.begin() else {
            info!("Busy. Not running loop.");
            return Tick::Skipped;
        };

        info!("Move Z Axis {}", pending.direction);

        let bot = Arc::clone(&self.bot);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = bot.move_relative(pending.offset).await;
            // Receiver lives as long as the loop
            let _ = completions.send(CommandOutcome {
                id: pending.id,
                result,
            });
        });

        Tick::Issued(pending.offset)
    }

    fn settle(&mut self, outcome: CommandOutcome) {
        let CommandOutcome { id, result } = outcome;

        match result {
            Ok(()) => {
                if self.state.complete(id) {
                    debug!(
                        "Command {} done, next direction {}",
                        id.value(),
                        self.state.direction()
                    );
                } else {
                    debug!("Ignoring stale outcome of command {}", id.value());
                }
            }
            Err(err) => {
                error!(error = ?err, "=== ERROR ===");

                if self.state.fail(id, self.policy) && self.state.is_busy() {
                    warn!("Motion loop halted after failed command {}", id.value());
                }
            }
        }
    }
}

/// The armed motion loop
pub struct MotionLoop<B> {
    driver: Driver<B>,
    outcomes: mpsc::UnboundedReceiver<CommandOutcome>,
}

impl<B: Bot> MotionLoop<B> {
    /// Take over the application state
    ///
    /// Fails with [`Error::NotConnected`] if no session was attached, so no
    /// command can precede a successful connect.
    pub fn arm(state: ApplicationState<B>, policy: FailurePolicy) -> Result<Self> {
        let bot = state.session().cloned().ok_or(Error::NotConnected)?;
        let (completions, outcomes) = mpsc::unbounded_channel();

        Ok(Self {
            driver: Driver {
                state,
                bot,
                policy,
                completions,
            },
            outcomes,
        })
    }

    pub fn state(&self) -> &ApplicationState<B> {
        &self.driver.state
    }

    /// One loop invocation: issue the next move unless busy
    pub fn tick(&mut self) -> Tick {
        self.driver.tick()
    }

    /// Apply a command outcome to the state
    pub fn settle(&mut self, outcome: CommandOutcome) {
        self.driver.settle(outcome)
    }

    /// Wait for the next spawned command to finish
    pub async fn next_outcome(&mut self) -> Option<CommandOutcome> {
        self.outcomes.recv().await
    }

    /// Tick every `period` forever, the first tick one period from now
    pub async fn run(self, period: Duration) {
        let Self {
            mut driver,
            mut outcomes,
        } = self;

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Motion loop armed (every {:?})", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    driver.tick();
                }
                Some(outcome) = outcomes.recv() => {
                    driver.settle(outcome);
                }
            }
        }
    }
}
