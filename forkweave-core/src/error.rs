/// Forkweave Error Types
///
/// Shared error taxonomy for the fabric: codec, tunnel, topic and RPC
/// failures all funnel through `FabricError`.

use std::io;
use thiserror::Error;

/// Main error type for fabric operations
#[derive(Error, Debug)]
pub enum FabricError {
    /// IO error during tunnel operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A frame declared a length that does not match the buffer, or an
    /// unknown record tag was seen
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Subscribe named a topic the node does not publish
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The idle window elapsed twice without a pong
    #[error("Session timeout after {0:?}")]
    SessionTimeout(std::time::Duration),

    /// Handshake version is not supported
    #[error("Version mismatch: peer offered {0}")]
    VersionMismatch(u32),

    /// Block or tx arrived that this node never asked for
    #[error("Unsolicited data for fork {fork} nonce {nonce}")]
    UnsolicitedData { fork: String, nonce: u64 },

    /// An RPC reply referenced a nonce with no pending entry
    #[error("Unknown RPC nonce: {0}")]
    RpcNonceUnknown(u64),

    /// Queue overflow; the producer must yield until the queue drains
    #[error("Transient backpressure")]
    Transient,

    /// Channel send error
    #[error("Channel send error")]
    ChannelSend,

    /// Channel receive error
    #[error("Channel receive error")]
    ChannelRecv,

    /// Tunnel closed
    #[error("Tunnel closed")]
    TunnelClosed,
}

/// Result type alias for fabric operations
pub type Result<T> = std::result::Result<T, FabricError>;

impl FabricError {
    /// Create a malformed-frame error with a message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    /// Create an unknown-topic error
    pub fn unknown_topic(topic: impl Into<String>) -> Self {
        Self::UnknownTopic(topic.into())
    }

    /// Check if this error is recoverable without dropping the connection
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::UnknownTopic(_)
            | Self::UnsolicitedData { .. }
            | Self::RpcNonceUnknown(_)
            | Self::Transient => true,
            _ => false,
        }
    }

    /// Check if this error must tear the tunnel down
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_)
                | Self::VersionMismatch(_)
                | Self::SessionTimeout(_)
                | Self::TunnelClosed
        )
    }
}
