//! Reconnection backoff.
//!
//! The child side of a tunnel retries lost connections with exponential
//! backoff; this tracker owns the attempt counter and the current delay.

use std::time::Duration;

use crate::options::TunnelOptions;

/// Backoff state for one tunnel connector.
///
/// ```
/// use forkweave_core::options::TunnelOptions;
/// use forkweave_core::reconnect::ReconnectState;
/// use std::time::Duration;
///
/// let options = TunnelOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
///
/// // Reset on successful connection
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    base_interval: Duration,
    max_interval: Duration,
    attempt: u32,
    current_interval: Duration,
}

impl ReconnectState {
    #[must_use]
    pub const fn new(options: &TunnelOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
            current_interval: options.reconnect_ivl,
        }
    }

    /// Delay before the next attempt; doubles per attempt up to the
    /// configured maximum.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval;

        self.attempt += 1;
        self.current_interval = self.base_interval * (1_u32 << self.attempt.min(10));
        if self.current_interval > self.max_interval {
            self.current_interval = self.max_interval;
        }

        delay
    }

    /// Reset after a successful handshake.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(base_ms: u64, max_ms: u64) -> TunnelOptions {
        TunnelOptions::default()
            .with_reconnect_ivl(Duration::from_millis(base_ms))
            .with_reconnect_ivl_max(Duration::from_millis(max_ms))
    }

    #[test]
    fn backoff_doubles() {
        let mut state = ReconnectState::new(&options(100, 10_000));

        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(400));
        assert_eq!(state.attempt(), 3);
    }

    #[test]
    fn backoff_caps_at_max() {
        let mut state = ReconnectState::new(&options(100, 500));

        state.next_delay();
        state.next_delay();
        state.next_delay();
        assert_eq!(state.next_delay(), Duration::from_millis(500));
        assert_eq!(state.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn reset_restores_base() {
        let mut state = ReconnectState::new(&options(100, 10_000));
        state.next_delay();
        state.next_delay();

        state.reset();
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.next_delay(), Duration::from_millis(100));
    }
}
