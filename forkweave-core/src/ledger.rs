//! Solicited-data ledger.
//!
//! Records, per `(fork, origin-nonce)`, the inventory hashes this node
//! asked for with `GetData`. When a block or tx arrives from upstream the
//! dispatcher consumes the matching entry; data with no entry was never
//! solicited and must not reach the local peer network.

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::event::{Inv, Nonce};
use crate::hash::{ForkId, Hash256};

type Key = (ForkId, Nonce);

/// At-most-once delivery record for solicited inventory.
///
/// The contract forbids false positives: `consume` returns true only for
/// a hash a prior `record` stored and no later `consume` already took.
#[derive(Debug, Default)]
pub struct SolicitedLedger {
    entries: HashMap<Key, HashSet<Hash256>>,
}

impl SolicitedLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole hash set for `(fork, nonce)` with the hashes of
    /// `inv`.
    pub fn record(&mut self, fork: ForkId, nonce: Nonce, inv: &[Inv]) {
        let set: HashSet<Hash256> = inv.iter().map(|i| i.hash).collect();
        trace!(fork = %fork, nonce, hashes = set.len(), "recording solicited inventory");
        self.entries.insert((fork, nonce), set);
    }

    /// True iff `hash` was solicited under `(fork, nonce)`; removes it on
    /// success so a duplicate delivery is rejected.
    pub fn consume(&mut self, fork: ForkId, nonce: Nonce, hash: Hash256) -> bool {
        let Some(set) = self.entries.get_mut(&(fork, nonce)) else {
            return false;
        };
        if !set.remove(&hash) {
            return false;
        }
        if set.is_empty() {
            self.entries.remove(&(fork, nonce));
        }
        true
    }

    /// Drop one key outright.
    pub fn forget(&mut self, fork: ForkId, nonce: Nonce) {
        self.entries.remove(&(fork, nonce));
    }

    /// Drop every entry recorded for a peer nonce, across all forks.
    /// Used when that peer goes away.
    pub fn forget_nonce(&mut self, nonce: Nonce) {
        self.entries.retain(|(_, n), _| *n != nonce);
    }

    /// Outstanding hashes for a key.
    #[must_use]
    pub fn pending(&self, fork: ForkId, nonce: Nonce) -> usize {
        self.entries.get(&(fork, nonce)).map_or(0, HashSet::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
