//! Tunnel configuration options
//!
//! One options struct covers both ends of the event tunnel: handshake and
//! keepalive timing, reconnect backoff, queue bounds and frame limits.

use std::time::Duration;

/// Tunnel configuration options.
///
/// # Examples
///
/// ```
/// use forkweave_core::options::TunnelOptions;
/// use std::time::Duration;
///
/// let opts = TunnelOptions::default()
///     .with_idle_window(Duration::from_secs(30))
///     .with_send_hwm(512);
/// ```
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    /// Maximum time to complete the session handshake after connect.
    pub handshake_timeout: Duration,

    /// Idle window after which a ping is sent. Two consecutive unanswered
    /// pings close the tunnel.
    pub idle_window: Duration,

    /// Initial reconnection delay after connection loss.
    pub reconnect_ivl: Duration,

    /// Maximum reconnection delay for exponential backoff.
    pub reconnect_ivl_max: Duration,

    /// High water mark for the outbound queue, in envelopes. `send`
    /// suspends past this bound.
    pub send_hwm: usize,

    /// High water mark for the inbound queue, in envelopes.
    pub recv_hwm: usize,

    /// Upper bound on the active-peer cache (replayed on reconnect).
    pub max_peers: usize,

    /// Frames declaring a larger total length are malformed.
    pub max_frame_size: usize,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            idle_window: Duration::from_secs(60),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::from_secs(30),
            send_hwm: 1000,
            recv_hwm: 1000,
            max_peers: 1024,
            max_frame_size: 8 * 1024 * 1024,
        }
    }
}

impl TunnelOptions {
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_idle_window(mut self, window: Duration) -> Self {
        self.idle_window = window;
        self
    }

    #[must_use]
    pub const fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    #[must_use]
    pub const fn with_reconnect_ivl_max(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl_max = ivl;
        self
    }

    #[must_use]
    pub const fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    #[must_use]
    pub const fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    #[must_use]
    pub const fn with_max_peers(mut self, max: usize) -> Self {
        self.max_peers = max;
        self
    }

    #[must_use]
    pub const fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }
}
