//! Tunnel envelopes.
//!
//! The tunnel moves `Envelope` records: a frame kind, the origin nonce,
//! an optional fork id and an opaque payload. For peer events the payload
//! is a self-contained serialization of the event, which lets the middle
//! layers forward traffic without decoding it.

use std::fmt;

use bytes::Bytes;

use crate::event::Nonce;
use crate::hash::{ForkId, Hash256};

/// Identifier of one tunnel session.
///
/// Assigned by the parent on first connect; a child presents it again to
/// resume after a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// The empty session id a client sends to request a fresh session.
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Wire identifier of a tunnel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameKind {
    Active = 1,
    Deactive = 2,
    Subscribe = 3,
    Unsubscribe = 4,
    GetBlocks = 5,
    GetData = 6,
    Inv = 7,
    Tx = 8,
    Block = 9,
    Reward = 10,
    Close = 11,
    RpcRequest = 20,
    RpcResponse = 21,
    Connect = 30,
    Connected = 31,
    Failed = 32,
    Ping = 40,
    Pong = 41,
    Sub = 60,
    Unsub = 61,
    NoSub = 62,
    Ready = 63,
    Added = 64,
}

impl FrameKind {
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Active),
            2 => Some(Self::Deactive),
            3 => Some(Self::Subscribe),
            4 => Some(Self::Unsubscribe),
            5 => Some(Self::GetBlocks),
            6 => Some(Self::GetData),
            7 => Some(Self::Inv),
            8 => Some(Self::Tx),
            9 => Some(Self::Block),
            10 => Some(Self::Reward),
            11 => Some(Self::Close),
            20 => Some(Self::RpcRequest),
            21 => Some(Self::RpcResponse),
            30 => Some(Self::Connect),
            31 => Some(Self::Connected),
            32 => Some(Self::Failed),
            40 => Some(Self::Ping),
            41 => Some(Self::Pong),
            60 => Some(Self::Sub),
            61 => Some(Self::Unsub),
            62 => Some(Self::NoSub),
            63 => Some(Self::Ready),
            64 => Some(Self::Added),
            _ => None,
        }
    }

    /// True for the peer-event kinds (1..=11) whose payload is a
    /// serialized `PeerEvent`.
    #[must_use]
    pub const fn is_peer_event(self) -> bool {
        (self as u16) <= 11
    }
}

/// One tunnel record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: FrameKind,
    pub nonce: Nonce,
    /// `Hash256::ZERO` when the frame is not fork-scoped.
    pub fork: ForkId,
    pub payload: Bytes,
}

impl Envelope {
    #[must_use]
    pub const fn new(kind: FrameKind, nonce: Nonce, fork: ForkId, payload: Bytes) -> Self {
        Self {
            kind,
            nonce,
            fork,
            payload,
        }
    }

    /// A frame with no fork scope and no payload (ping, pong, ...).
    #[must_use]
    pub const fn control(kind: FrameKind, nonce: Nonce) -> Self {
        Self {
            kind,
            nonce,
            fork: Hash256::ZERO,
            payload: Bytes::new(),
        }
    }
}
