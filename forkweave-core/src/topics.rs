//! Topic table.
//!
//! Child sessions subscribe to well-known topics by id; the table maps
//! topic -> subscription ids and id -> owning session so pushes can find
//! every interested session and a broken session can be swept in one
//! pass. Subscribing to a topic the node does not publish is answered
//! with `NoSub` and is not otherwise fatal.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::envelope::SessionId;
use crate::error::{FabricError, Result};

/// New blocks on any fork.
pub const ALL_BLOCK_TOPIC: &str = "all-block";
/// New transactions on any fork.
pub const ALL_TX_TOPIC: &str = "all-tx";
/// System commands.
pub const SYS_CMD_TOPIC: &str = "sys-cmd";
/// Transaction commands.
pub const TX_CMD_TOPIC: &str = "tx-cmd";
/// Block commands.
pub const BLOCK_CMD_TOPIC: &str = "block-cmd";
/// Wallet-visible state changes.
pub const CHANGED_TOPIC: &str = "changed";
/// Wallet-visible removals.
pub const REMOVED_TOPIC: &str = "removed";
/// Administrative RPC distribution.
pub const RPC_CMD_TOPIC: &str = "rpc-cmd";

const KNOWN_TOPICS: [&str; 8] = [
    ALL_BLOCK_TOPIC,
    ALL_TX_TOPIC,
    SYS_CMD_TOPIC,
    TX_CMD_TOPIC,
    BLOCK_CMD_TOPIC,
    CHANGED_TOPIC,
    REMOVED_TOPIC,
    RPC_CMD_TOPIC,
];

/// Per-node registry of topic subscriptions held by child sessions.
#[derive(Debug)]
pub struct TopicTable {
    topic_ids: HashMap<&'static str, HashSet<u64>>,
    id_session: HashMap<u64, SessionId>,
}

impl Default for TopicTable {
    fn default() -> Self {
        let mut topic_ids = HashMap::new();
        for topic in KNOWN_TOPICS {
            topic_ids.insert(topic, HashSet::new());
        }
        Self {
            topic_ids,
            id_session: HashMap::new(),
        }
    }
}

impl TopicTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True for the topics this node publishes.
    #[must_use]
    pub fn is_known(&self, topic: &str) -> bool {
        self.topic_ids.contains_key(topic)
    }

    /// Register subscription `id` from `session` on `topic`.
    pub fn subscribe(&mut self, id: u64, session: SessionId, topic: &str) -> Result<()> {
        let Some(ids) = self.topic_ids.get_mut(topic) else {
            return Err(FabricError::unknown_topic(topic));
        };
        ids.insert(id);
        self.id_session.insert(id, session);
        Ok(())
    }

    /// Drop subscription `id` from every topic.
    pub fn unsubscribe(&mut self, id: u64) {
        for ids in self.topic_ids.values_mut() {
            ids.remove(&id);
        }
        self.id_session.remove(&id);
    }

    /// Sweep every subscription owned by `session`.
    pub fn remove_session(&mut self, session: SessionId) {
        let stale: Vec<u64> = self
            .id_session
            .iter()
            .filter(|(_, s)| **s == session)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            self.unsubscribe(id);
        }
    }

    /// Subscriptions on `topic` as `(id, session)` pairs. Fan-out lists
    /// are short-lived and usually tiny; keep them off the heap.
    #[must_use]
    pub fn subscribers(&self, topic: &str) -> SmallVec<[(u64, SessionId); 8]> {
        let mut out = SmallVec::new();
        if let Some(ids) = self.topic_ids.get(topic) {
            for id in ids {
                if let Some(session) = self.id_session.get(id) {
                    out.push((*id, *session));
                }
            }
        }
        out
    }

    /// Distinct sessions subscribed to `topic`.
    #[must_use]
    pub fn sessions(&self, topic: &str) -> HashSet<SessionId> {
        let mut out = HashSet::new();
        if let Some(ids) = self.topic_ids.get(topic) {
            for id in ids {
                if let Some(session) = self.id_session.get(id) {
                    out.insert(*session);
                }
            }
        }
        out
    }

    /// How many distinct sessions would receive an RPC fan-out.
    #[must_use]
    pub fn rpc_session_count(&self) -> usize {
        self.sessions(RPC_CMD_TOPIC).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_topic_is_rejected() {
        let mut table = TopicTable::new();
        let err = table.subscribe(1, SessionId(10), "no-such-topic");
        assert!(matches!(err, Err(FabricError::UnknownTopic(_))));
        assert!(table.is_known(ALL_BLOCK_TOPIC));
    }

    #[test]
    fn sessions_are_deduplicated() {
        let mut table = TopicTable::new();
        table.subscribe(1, SessionId(10), RPC_CMD_TOPIC).unwrap();
        table.subscribe(2, SessionId(10), RPC_CMD_TOPIC).unwrap();
        table.subscribe(3, SessionId(20), RPC_CMD_TOPIC).unwrap();

        assert_eq!(table.rpc_session_count(), 2);
    }

    #[test]
    fn unsubscribe_spans_topics() {
        let mut table = TopicTable::new();
        table.subscribe(1, SessionId(10), ALL_BLOCK_TOPIC).unwrap();
        table.subscribe(1, SessionId(10), ALL_TX_TOPIC).unwrap();

        table.unsubscribe(1);
        assert!(table.sessions(ALL_BLOCK_TOPIC).is_empty());
        assert!(table.sessions(ALL_TX_TOPIC).is_empty());
    }

    #[test]
    fn remove_session_sweeps_all_ids() {
        let mut table = TopicTable::new();
        table.subscribe(1, SessionId(10), ALL_BLOCK_TOPIC).unwrap();
        table.subscribe(2, SessionId(10), RPC_CMD_TOPIC).unwrap();
        table.subscribe(3, SessionId(20), RPC_CMD_TOPIC).unwrap();

        table.remove_session(SessionId(10));
        assert!(table.sessions(ALL_BLOCK_TOPIC).is_empty());
        assert_eq!(table.rpc_session_count(), 1);
    }
}
