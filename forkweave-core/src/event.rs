//! Peer-event model.
//!
//! Every message the fabric routes is one of a closed set of peer events.
//! Events carry the origin `Nonce` and, for fork-scoped traffic, the
//! `ForkId` they belong to. Routing annotations (`Flow`, sender) live in
//! `RoutedEvent`, outside the serialized value, so the wire codec
//! round-trips events exactly.

use bytes::Bytes;

use crate::hash::{ForkId, Hash256};

/// 64-bit origin identifier of a peer event.
///
/// Any value other than [`NONCE_LOCAL`] names a remote peer session.
pub type Nonce = u64;

/// Reserved nonce meaning "originated locally / destined for all".
pub const NONCE_LOCAL: Nonce = u64::MAX;

/// Service bits advertised by a full node.
pub const NODE_NETWORK: u64 = 1;

/// Inventory item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvKind {
    Tx,
    Block,
}

impl InvKind {
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Tx => 1,
            Self::Block => 2,
        }
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Tx),
            2 => Some(Self::Block),
            _ => None,
        }
    }
}

/// A single inventory announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inv {
    pub kind: InvKind,
    pub hash: Hash256,
}

/// An opaque transaction body plus its hash.
///
/// The fabric never decodes the body; the hash is what the solicited-data
/// ledger keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxData {
    pub hash: Hash256,
    pub payload: Bytes,
}

/// An opaque block body plus its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub hash: Hash256,
    pub payload: Bytes,
}

/// Why a peer connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Network,
    Protocol,
    Banned,
    Shutdown,
}

impl CloseReason {
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Network => 0,
            Self::Protocol => 1,
            Self::Banned => 2,
            Self::Shutdown => 3,
        }
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Network),
            1 => Some(Self::Protocol),
            2 => Some(Self::Banned),
            3 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// A peer-network event.
///
/// The closed union the whole fabric speaks. `Active`, `Deactive`,
/// `NetReward` and `NetClose` are session-scoped; every other variant is
/// scoped to a fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A peer session came up.
    Active { nonce: Nonce, services: u64 },
    /// A peer session went away.
    Deactive { nonce: Nonce, services: u64 },
    /// The origin wants traffic for these forks.
    Subscribe {
        nonce: Nonce,
        fork: ForkId,
        forks: Vec<ForkId>,
    },
    /// The origin no longer wants traffic for these forks.
    Unsubscribe {
        nonce: Nonce,
        fork: ForkId,
        forks: Vec<ForkId>,
    },
    /// Block-locator request.
    GetBlocks {
        nonce: Nonce,
        fork: ForkId,
        locator: Vec<Hash256>,
    },
    /// Solicit the listed inventory.
    GetData {
        nonce: Nonce,
        fork: ForkId,
        inv: Vec<Inv>,
    },
    /// Inventory announcement.
    Inv {
        nonce: Nonce,
        fork: ForkId,
        inv: Vec<Inv>,
    },
    /// Transaction delivery.
    Tx {
        nonce: Nonce,
        fork: ForkId,
        tx: TxData,
    },
    /// Block delivery.
    Block {
        nonce: Nonce,
        fork: ForkId,
        block: BlockData,
    },
    /// Endpoint-manager reward adjustment for a peer.
    NetReward { nonce: Nonce, kind: u32, score: i32 },
    /// Ask the endpoint manager to close a peer.
    NetClose {
        nonce: Nonce,
        kind: u32,
        reason: CloseReason,
    },
}

impl PeerEvent {
    /// The origin nonce carried by every variant.
    #[must_use]
    pub const fn nonce(&self) -> Nonce {
        match self {
            Self::Active { nonce, .. }
            | Self::Deactive { nonce, .. }
            | Self::Subscribe { nonce, .. }
            | Self::Unsubscribe { nonce, .. }
            | Self::GetBlocks { nonce, .. }
            | Self::GetData { nonce, .. }
            | Self::Inv { nonce, .. }
            | Self::Tx { nonce, .. }
            | Self::Block { nonce, .. }
            | Self::NetReward { nonce, .. }
            | Self::NetClose { nonce, .. } => *nonce,
        }
    }

    /// The fork this event is scoped to, if any.
    #[must_use]
    pub const fn fork(&self) -> Option<ForkId> {
        match self {
            Self::Subscribe { fork, .. }
            | Self::Unsubscribe { fork, .. }
            | Self::GetBlocks { fork, .. }
            | Self::GetData { fork, .. }
            | Self::Inv { fork, .. }
            | Self::Tx { fork, .. }
            | Self::Block { fork, .. } => Some(*fork),
            _ => None,
        }
    }

    /// True when the event originated on this node.
    #[must_use]
    pub const fn is_local_origin(&self) -> bool {
        self.nonce() == NONCE_LOCAL
    }
}

/// Direction annotation for routed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Unset,
    /// Towards the wide-area network (root side).
    Up,
    /// Towards the local peer network.
    Down,
}

/// A peer event plus its in-process routing annotations.
///
/// `sender` names the component that emitted the event; a component must
/// never re-process an event carrying its own name. Annotations are not
/// serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedEvent {
    pub event: PeerEvent,
    pub flow: Flow,
    pub sender: &'static str,
}

impl RoutedEvent {
    #[must_use]
    pub const fn new(event: PeerEvent) -> Self {
        Self {
            event,
            flow: Flow::Unset,
            sender: "",
        }
    }

    #[must_use]
    pub const fn up(event: PeerEvent, sender: &'static str) -> Self {
        Self {
            event,
            flow: Flow::Up,
            sender,
        }
    }

    #[must_use]
    pub const fn down(event: PeerEvent, sender: &'static str) -> Self {
        Self {
            event,
            flow: Flow::Down,
            sender,
        }
    }

    /// Echo guard: true when `component` produced this event itself.
    #[must_use]
    pub fn is_from(&self, component: &str) -> bool {
        self.sender == component
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fork(byte: u8) -> ForkId {
        Hash256([byte; 32])
    }

    #[test]
    fn nonce_and_fork_accessors() {
        let ev = PeerEvent::Subscribe {
            nonce: 7,
            fork: fork(1),
            forks: vec![fork(1), fork(2)],
        };
        assert_eq!(ev.nonce(), 7);
        assert_eq!(ev.fork(), Some(fork(1)));

        let ev = PeerEvent::Active {
            nonce: NONCE_LOCAL,
            services: NODE_NETWORK,
        };
        assert_eq!(ev.fork(), None);
        assert!(ev.is_local_origin());
    }

    #[test]
    fn echo_guard() {
        let routed = RoutedEvent::down(
            PeerEvent::NetReward {
                nonce: 3,
                kind: 0,
                score: 10,
            },
            "dispatcher",
        );
        assert!(routed.is_from("dispatcher"));
        assert!(!routed.is_from("peernet"));
        assert_eq!(routed.flow, Flow::Down);
    }
}
