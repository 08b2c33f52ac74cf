//! Reference-counted fork subscriptions.
//!
//! The router keeps two independent `(fork, nonce)` count tables:
//!
//! - the **downstream** table speaks for child nodes: how many children
//!   hold a live subscription to a fork on behalf of a peer nonce;
//! - the **local** table speaks for this node's own consumers relative to
//!   its parent.
//!
//! Only the 0 -> 1 transition forwards a subscribe upstream and only the
//! 1 -> 0 transition forwards an unsubscribe. The two tables stay
//! separate on purpose: they speak for opposite sides of the tunnel, and
//! merging them has caused forwarding loops before.

use hashbrown::HashMap;
use tracing::trace;

use crate::event::Nonce;
use crate::hash::ForkId;

type Key = (ForkId, Nonce);

/// One side's reference counts.
#[derive(Debug, Default)]
struct SubscriptionCounts {
    counts: HashMap<Key, u32>,
}

impl SubscriptionCounts {
    /// Count each fork in; forks whose count went 0 -> 1 are returned in
    /// input order.
    fn filter_subscribe(&mut self, nonce: Nonce, forks: &[ForkId]) -> Vec<ForkId> {
        let mut delta = Vec::new();
        for fork in forks {
            let count = self.counts.entry((*fork, nonce)).or_insert(0);
            *count += 1;
            if *count == 1 {
                delta.push(*fork);
            }
        }
        delta
    }

    /// Count each fork out; forks whose count went 1 -> 0 are returned in
    /// input order and their keys erased. Unknown keys are ignored:
    /// unsubscribes are never fatal.
    fn filter_unsubscribe(&mut self, nonce: Nonce, forks: &[ForkId]) -> Vec<ForkId> {
        let mut delta = Vec::new();
        for fork in forks {
            let key = (*fork, nonce);
            match self.counts.get_mut(&key) {
                Some(count) if *count == 1 => {
                    self.counts.remove(&key);
                    delta.push(*fork);
                }
                Some(count) => *count -= 1,
                None => trace!(fork = %fork, nonce, "unsubscribe for unknown key ignored"),
            }
        }
        delta
    }

    fn count(&self, fork: ForkId, nonce: Nonce) -> u32 {
        self.counts.get(&(fork, nonce)).copied().unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.counts.len()
    }
}

/// Per-direction subscription state for one node.
#[derive(Debug, Default)]
pub struct SubscriptionRouter {
    child: SubscriptionCounts,
    local: SubscriptionCounts,
}

impl SubscriptionRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A child subscribed; returns the forks that must now be subscribed
    /// upstream (first subscriber only).
    pub fn filter_child_subscribe(&mut self, nonce: Nonce, forks: &[ForkId]) -> Vec<ForkId> {
        self.child.filter_subscribe(nonce, forks)
    }

    /// A child unsubscribed; returns the forks whose last child
    /// subscriber is gone.
    pub fn filter_child_unsubscribe(&mut self, nonce: Nonce, forks: &[ForkId]) -> Vec<ForkId> {
        self.child.filter_unsubscribe(nonce, forks)
    }

    /// A local consumer subscribed; same transition logic against the
    /// local table.
    pub fn filter_this_subscribe(&mut self, nonce: Nonce, forks: &[ForkId]) -> Vec<ForkId> {
        self.local.filter_subscribe(nonce, forks)
    }

    /// A local consumer unsubscribed.
    pub fn filter_this_unsubscribe(&mut self, nonce: Nonce, forks: &[ForkId]) -> Vec<ForkId> {
        self.local.filter_unsubscribe(nonce, forks)
    }

    /// Live downstream count for a key.
    #[must_use]
    pub fn child_count(&self, fork: ForkId, nonce: Nonce) -> u32 {
        self.child.count(fork, nonce)
    }

    /// Live local count for a key.
    #[must_use]
    pub fn local_count(&self, fork: ForkId, nonce: Nonce) -> u32 {
        self.local.count(fork, nonce)
    }

    /// Number of live downstream keys.
    #[must_use]
    pub fn child_keys(&self) -> usize {
        self.child.len()
    }
}
