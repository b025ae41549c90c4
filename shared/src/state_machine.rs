//! Adapter Reconnection State Machine
//!
//! Tracks consecutive adapter connect failures and decides when the next
//! attempt should run. Delays grow exponentially from a base delay and are
//! capped at a 32x multiplier; after the attempt ceiling the machine gives up.

use std::time::Duration;

use crate::backoff;

/// Connection state of the device adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectState {
    /// No connect attempt has finished yet
    #[default]
    Idle,
    /// Adapter is connected
    Connected,
    /// A reconnect attempt is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },
    /// Attempt ceiling reached, no further automatic attempts
    Exhausted,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectEvent {
    ConnectSucceeded,
    ConnectFailed,
}

/// Bounded exponential backoff for adapter reconnection
#[derive(Debug)]
pub struct ReconnectStateMachine {
    state: ReconnectState,
    attempts: u32,
    base_delay: Duration,
    max_attempts: u32,
}

impl Default for ReconnectStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectStateMachine {
    /// Create a machine with the standard backoff parameters
    pub fn new() -> Self {
        Self::with_limits(
            Duration::from_secs(backoff::BASE_DELAY_SECS),
            backoff::MAX_ATTEMPTS,
        )
    }

    pub fn with_limits(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            state: ReconnectState::Idle,
            attempts: 0,
            base_delay,
            max_attempts,
        }
    }

    /// Get current state
    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Number of consecutive failures since the last successful connect
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ReconnectState::Exhausted
    }

    /// Process an event and return the resulting state
    pub fn process_event(&mut self, event: ReconnectEvent) -> ReconnectState {
        self.state = match event {
            ReconnectEvent::ConnectSucceeded => {
                self.attempts = 0;
                ReconnectState::Connected
            }
            ReconnectEvent::ConnectFailed => {
                self.attempts = self.attempts.saturating_add(1);
                if self.attempts > self.max_attempts {
                    ReconnectState::Exhausted
                } else {
                    ReconnectState::Reconnecting {
                        attempt: self.attempts,
                        delay: backoff_delay(self.base_delay, self.attempts),
                    }
                }
            }
        };
        self.state
    }
}

/// Delay before reconnect attempt `attempt` (1-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(backoff::MAX_EXPONENT);
    base * 2u32.pow(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = ReconnectStateMachine::new();
        assert_eq!(fsm.state(), ReconnectState::Idle);
        assert_eq!(fsm.attempts(), 0);
    }

    #[test]
    fn test_delay_sequence() {
        let mut fsm = ReconnectStateMachine::new();
        let expected = [5, 10, 20, 40, 80, 160, 160, 160, 160, 160];

        for (i, secs) in expected.iter().enumerate() {
            let state = fsm.process_event(ReconnectEvent::ConnectFailed);
            assert_eq!(
                state,
                ReconnectState::Reconnecting {
                    attempt: i as u32 + 1,
                    delay: Duration::from_secs(*secs),
                }
            );
        }

        // 11th failure gives up
        assert_eq!(fsm.process_event(ReconnectEvent::ConnectFailed), ReconnectState::Exhausted);
        assert!(fsm.is_exhausted());
    }

    #[test]
    fn test_exhausted_stays_exhausted() {
        let mut fsm = ReconnectStateMachine::with_limits(Duration::from_secs(1), 2);
        fsm.process_event(ReconnectEvent::ConnectFailed);
        fsm.process_event(ReconnectEvent::ConnectFailed);
        assert_eq!(fsm.process_event(ReconnectEvent::ConnectFailed), ReconnectState::Exhausted);
        assert_eq!(fsm.process_event(ReconnectEvent::ConnectFailed), ReconnectState::Exhausted);
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut fsm = ReconnectStateMachine::new();
        fsm.process_event(ReconnectEvent::ConnectFailed);
        fsm.process_event(ReconnectEvent::ConnectFailed);
        assert_eq!(fsm.attempts(), 2);

        assert_eq!(fsm.process_event(ReconnectEvent::ConnectSucceeded), ReconnectState::Connected);
        assert_eq!(fsm.attempts(), 0);

        // Next failure starts over at the base delay
        let state = fsm.process_event(ReconnectEvent::ConnectFailed);
        assert_eq!(
            state,
            ReconnectState::Reconnecting { attempt: 1, delay: Duration::from_secs(5) }
        );
    }

    #[test]
    fn test_backoff_delay_cap() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 6), Duration::from_millis(3200));
        assert_eq!(backoff_delay(base, 50), Duration::from_millis(3200));
    }
}
