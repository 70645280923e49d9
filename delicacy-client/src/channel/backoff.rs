//! Reconnect policy
//!
//! Pure state: no timers, no I/O. The connection task asks the policy what
//! to do after each failure and sleeps accordingly.

use crate::ChannelConfig;
use std::time::Duration;

/// Transport state of an [`EventChannel`](super::EventChannel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Never opened, or closed by the owner
    #[default]
    Closed,
    /// Handshake in progress (`attempt` = failures so far)
    Connecting { attempt: u32 },
    Open,
    /// Waiting before the next attempt
    Backoff { attempt: u32, delay: Duration },
    /// Consecutive failure limit reached; polling only from here on
    GaveUp,
}

impl ChannelState {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Closed => "closed",
            ChannelState::Connecting { .. } => "connecting",
            ChannelState::Open => "open",
            ChannelState::Backoff { .. } => "backoff",
            ChannelState::GaveUp => "gave_up",
        }
    }
}

/// Exponential backoff: `initial × 2^n`, capped at `max`, abandoned after
/// `max_failures` consecutive failures.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    max_failures: u32,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Duration, max_failures: u32) -> Self {
        Self {
            initial,
            max,
            max_failures,
            failures: 0,
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.initial_delay, config.max_delay, config.max_failures)
    }

    /// Consecutive failures since the last successful open
    pub fn attempt(&self) -> u32 {
        self.failures
    }

    pub fn exhausted(&self) -> bool {
        self.failures >= self.max_failures
    }

    /// Connection established: start over
    pub fn on_open(&mut self) {
        self.failures = 0;
    }

    /// Connection lost or attempt failed.
    ///
    /// Returns the delay before the next attempt, or `None` once the limit
    /// is reached.
    pub fn on_failure(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        let factor = 1u32.checked_shl(self.failures).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(factor).min(self.max);
        self.failures += 1;
        Some(delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ChannelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_then_give_up() {
        let mut policy = ReconnectPolicy::default();
        let delays: Vec<u64> = std::iter::from_fn(|| policy.on_failure())
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert!(policy.exhausted());
        assert_eq!(policy.on_failure(), None);
    }

    #[test]
    fn test_cap_applies() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 8);
        let delays: Vec<u64> = std::iter::from_fn(|| policy.on_failure())
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn test_open_resets_counter() {
        let mut policy = ReconnectPolicy::default();
        policy.on_failure();
        policy.on_failure();
        policy.on_failure();
        assert_eq!(policy.attempt(), 3);

        policy.on_open();
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.on_failure(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_failures_gives_up_immediately() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(10), Duration::from_secs(1), 0);
        assert_eq!(policy.on_failure(), None);
    }
}
