//! Active-peer cache.
//!
//! Retains the last `Active` envelope per connected peer so a child that
//! connects (or reconnects) can replay the current peer set before any
//! live traffic. Replay order is insertion order, which is why the map is
//! paired with an order vector kept in sync on every mutation.

use hashbrown::HashMap;

use crate::envelope::Envelope;
use crate::event::Nonce;

/// Insertion-ordered `Nonce -> Envelope` cache, bounded by the configured
/// max-peer count.
#[derive(Debug)]
pub struct ActiveCache {
    entries: HashMap<Nonce, Envelope>,
    order: Vec<Nonce>,
    capacity: usize,
}

impl ActiveCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            capacity,
        }
    }

    /// Cache the latest `Active` envelope for a peer. Re-inserting an
    /// existing nonce keeps its original replay position. At capacity the
    /// oldest entry is evicted.
    pub fn insert(&mut self, nonce: Nonce, envelope: Envelope) {
        if self.entries.insert(nonce, envelope).is_none() {
            self.order.push(nonce);
            if self.order.len() > self.capacity {
                let oldest = self.order.remove(0);
                self.entries.remove(&oldest);
            }
        }
    }

    /// Drop a peer that went away.
    pub fn remove(&mut self, nonce: Nonce) {
        if self.entries.remove(&nonce).is_some() {
            if let Some(pos) = self.order.iter().position(|n| *n == nonce) {
                self.order.remove(pos);
            }
        }
    }

    /// Envelopes in insertion order, for replay to a fresh session.
    pub fn replay(&self) -> impl Iterator<Item = &Envelope> {
        self.order.iter().filter_map(|n| self.entries.get(n))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::FrameKind;
    use crate::hash::Hash256;
    use bytes::Bytes;

    fn env(nonce: Nonce, byte: u8) -> Envelope {
        Envelope::new(
            FrameKind::Active,
            nonce,
            Hash256::ZERO,
            Bytes::copy_from_slice(&[byte]),
        )
    }

    #[test]
    fn replay_is_insertion_ordered() {
        let mut cache = ActiveCache::new(8);
        cache.insert(3, env(3, 0));
        cache.insert(1, env(1, 0));
        cache.insert(2, env(2, 0));

        let order: Vec<Nonce> = cache.replay().map(|e| e.nonce).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn reinsert_keeps_position_and_updates_payload() {
        let mut cache = ActiveCache::new(8);
        cache.insert(1, env(1, 0));
        cache.insert(2, env(2, 0));
        cache.insert(1, env(1, 9));

        let order: Vec<Nonce> = cache.replay().map(|e| e.nonce).collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(cache.replay().next().unwrap().payload[0], 9);
    }

    #[test]
    fn remove_unlinks_replay_entry() {
        let mut cache = ActiveCache::new(8);
        cache.insert(1, env(1, 0));
        cache.insert(2, env(2, 0));
        cache.remove(1);

        let order: Vec<Nonce> = cache.replay().map(|e| e.nonce).collect();
        assert_eq!(order, vec![2]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut cache = ActiveCache::new(2);
        cache.insert(1, env(1, 0));
        cache.insert(2, env(2, 0));
        cache.insert(3, env(3, 0));

        let order: Vec<Nonce> = cache.replay().map(|e| e.nonce).collect();
        assert_eq!(order, vec![2, 3]);
    }
}
