//! Keepalive state machine (sans I/O).
//!
//! When the idle window elapses without a frame the connection actor asks
//! this tracker what to do: send a ping, or give up after two pings went
//! unanswered. Any inbound frame counts as liveness, not just pongs.

/// What the actor must do after an idle window elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    SendPing,
    Close,
}

/// Tracks unanswered pings on one connection.
#[derive(Debug, Default)]
pub struct Keepalive {
    outstanding: u8,
}

impl Keepalive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame arrived; the peer is alive.
    pub fn on_frame(&mut self) {
        self.outstanding = 0;
    }

    /// The idle window elapsed with no frame.
    pub fn on_idle(&mut self) -> KeepaliveAction {
        if self.outstanding >= 2 {
            KeepaliveAction::Close
        } else {
            self.outstanding += 1;
            KeepaliveAction::SendPing
        }
    }

    #[must_use]
    pub const fn outstanding(&self) -> u8 {
        self.outstanding
    }
}
