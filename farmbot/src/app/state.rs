//! Application state shared by the startup sequence and the motion loop

use std::sync::Arc;

use farmbot_types::{Direction, Offset};

use super::motion::FailurePolicy;
use crate::error::{Error, Result};

/// Identifies one issued move command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(u64);

impl CommandId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// A move that has been admitted through the busy guard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMove {
    pub id: CommandId,
    pub direction: Direction,
    pub offset: Offset,
}

/// Session handle, motion direction and the single in-flight slot
///
/// The slot holds the id of the outstanding command, if any; the app is busy
/// exactly while it is occupied.
#[derive(Debug)]
pub struct ApplicationState<B> {
    session: Option<Arc<B>>,
    direction: Direction,
    in_flight: Option<CommandId>,
    next_id: u64,
}

impl<B> ApplicationState<B> {
    pub fn new() -> Self {
        Self {
            session: None,
            direction: Direction::Up,
            in_flight: None,
            next_id: 0,
        }
    }

    /// Store the connected session; only allowed once
    pub fn attach_session(&mut self, bot: B) -> Result<Arc<B>> {
        if self.session.is_some() {
            return Err(Error::AlreadyAttached);
        }

        let bot = Arc::new(bot);
        self.session = Some(Arc::clone(&bot));
        Ok(bot)
    }

    pub fn session(&self) -> Option<&Arc<B>> {
        self.session.as_ref()
    }

    /// Direction of the next move
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<CommandId> {
        self.in_flight
    }

    /// Occupy the in-flight slot; `None` while another command is outstanding
    pub fn begin(&mut self) -> Option<PendingMove> {
        if self.in_flight.is_some() {
            return None;
        }

        let id = CommandId(self.next_id);
        self.next_id += 1;
        self.in_flight = Some(id);

        Some(PendingMove {
            id,
            direction: self.direction,
            offset: self.direction.offset(),
        })
    }

    /// Record a successful command: flip direction and free the slot
    ///
    /// Returns false (and changes nothing) if `id` is not the outstanding
    /// command.
    pub fn complete(&mut self, id: CommandId) -> bool {
        if self.in_flight != Some(id) {
            return false;
        }

        self.direction = self.direction.flip();
        self.in_flight = None;
        true
    }

    /// Record a failed command; direction is kept
    ///
    /// Under [`FailurePolicy::Halt`] the slot stays occupied, so no further
    /// command is ever admitted.
    pub fn fail(&mut self, id: CommandId, policy: FailurePolicy) -> bool {
        if self.in_flight != Some(id) {
            return false;
        }

        if policy == FailurePolicy::Reset {
            self.in_flight = None;
        }
        true
    }
}

impl<B> Default for ApplicationState<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let state = ApplicationState::<()>::new();
        assert!(state.session().is_none());
        assert_eq!(state.direction(), Direction::Up);
        assert!(!state.is_busy());
    }

    #[test]
    fn test_attach_session_once() {
        let mut state = ApplicationState::new();
        state.attach_session("bot").unwrap();
        assert_eq!(state.session().map(|b| **b), Some("bot"));

        assert!(matches!(
            state.attach_session("other"),
            Err(Error::AlreadyAttached)
        ));
        assert_eq!(state.session().map(|b| **b), Some("bot"));
    }

    #[test]
    fn test_busy_guard() {
        let mut state = ApplicationState::<()>::new();
        let first = state.begin().unwrap();

        assert!(state.is_busy());
        assert_eq!(state.in_flight(), Some(first.id));
        assert!(state.begin().is_none());
        assert_eq!(state.direction(), Direction::Up);
    }

    #[test]
    fn test_failure_reset_keeps_direction() {
        let mut state = ApplicationState::<()>::new();
        let pending = state.begin().unwrap();

        assert!(state.fail(pending.id, FailurePolicy::Reset));
        assert!(!state.is_busy());
        assert_eq!(state.direction(), Direction::Up);

        let retry = state.begin().unwrap();
        assert_eq!(retry.offset, Offset::z(1.0));
        assert_ne!(retry.id, pending.id);
    }

    #[test]
    fn test_failure_halt_stalls() {
        let mut state = ApplicationState::<()>::new();
        let pending = state.begin().unwrap();

        assert!(state.fail(pending.id, FailurePolicy::Halt));
        assert!(state.is_busy());
        assert!(state.begin().is_none());
        assert!(state.begin().is_none());
        assert_eq!(state.direction(), Direction::Up);
    }

    #[test]
    fn test_stale_outcome_ignored() {
        let mut state = ApplicationState::<()>::new();
        let pending = state.begin().unwrap();
        let stale = CommandId(pending.id.value() + 7);

        assert!(!state.complete(stale));
        assert!(!state.fail(stale, FailurePolicy::Reset));
        assert_eq!(state.in_flight(), Some(pending.id));
        assert_eq!(state.direction(), Direction::Up);

        assert!(state.complete(pending.id));
        // Completing twice is a no-op
        assert!(!state.complete(pending.id));
        assert_eq!(state.direction(), Direction::Down);
    }

    proptest! {
        #[test]
        fn successful_moves_alternate(n in 1usize..64) {
            let mut state = ApplicationState::<()>::new();

            for i in 0..n {
                let pending = state.begin().unwrap();
                let expected = if i % 2 == 0 { 1.0 } else { -1.0 };
                prop_assert_eq!(pending.offset, Offset::z(expected));
                prop_assert!(state.begin().is_none());
                prop_assert!(state.complete(pending.id));
            }
        }

        #[test]
        fn only_successes_flip_direction(outcomes in prop::collection::vec(any::<bool>(), 1..64)) {
            let mut state = ApplicationState::<()>::new();
            let mut expected = Direction::Up;

            for succeeded in outcomes {
                let pending = state.begin().unwrap();
                prop_assert_eq!(pending.direction, expected);

                if succeeded {
                    state.complete(pending.id);
                    expected = expected.flip();
                } else {
                    state.fail(pending.id, FailurePolicy::Reset);
                }
                prop_assert!(!state.is_busy());
                prop_assert_eq!(state.direction(), expected);
            }
        }
    }
}
