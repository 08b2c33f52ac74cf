//! Session identity and resumption.
//!
//! The parent assigns every child a random non-zero session id. A child
//! that reconnects presents its previous id; if the registry still knows
//! it the handshake completes with `reconnect = true` and the caller
//! replays cached state before live traffic. An id the registry does not
//! recognize (for instance after a parent restart) is silently replaced
//! by a fresh one.

use hashbrown::HashSet;
use rand::Rng;

use forkweave_core::envelope::SessionId;

use crate::handshake::HandshakeOutcome;

/// Parent-side registry of session ids seen on this tunnel endpoint.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    known: HashSet<SessionId>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connecting child. A known non-zero id resumes the old
    /// session; anything else gets a fresh id.
    pub fn admit(&mut self, offered: SessionId) -> HandshakeOutcome {
        if !offered.is_none() && self.known.contains(&offered) {
            return HandshakeOutcome {
                session: offered,
                reconnect: true,
            };
        }

        let session = self.fresh_id();
        self.known.insert(session);
        HandshakeOutcome {
            session,
            reconnect: false,
        }
    }

    /// Drop a session id so it can no longer resume.
    pub fn forget(&mut self, session: SessionId) {
        self.known.remove(&session);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    fn fresh_id(&self) -> SessionId {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = SessionId(rng.gen());
            if !candidate.is_none() && !self.known.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connect_gets_new_session() {
        let mut registry = SessionRegistry::new();
        let outcome = registry.admit(SessionId::NONE);
        assert!(!outcome.reconnect);
        assert!(!outcome.session.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn known_session_resumes() {
        let mut registry = SessionRegistry::new();
        let first = registry.admit(SessionId::NONE);

        let again = registry.admit(first.session);
        assert!(again.reconnect);
        assert_eq!(again.session, first.session);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_session_is_replaced() {
        let mut registry = SessionRegistry::new();
        let outcome = registry.admit(SessionId(12345));
        assert!(!outcome.reconnect);
        assert_ne!(outcome.session, SessionId(12345));
    }

    #[test]
    fn forgotten_session_cannot_resume() {
        let mut registry = SessionRegistry::new();
        let first = registry.admit(SessionId::NONE);
        registry.forget(first.session);

        let again = registry.admit(first.session);
        assert!(!again.reconnect);
    }
}
