//! Forkweave event tunnel.
//!
//! The framed bidirectional channel between a fork node and its parent:
//! - Frame codec (`codec`)
//! - Record serialization for peer events and topics (`wire`)
//! - RPC wire records (`rpc`)
//! - Session handshake and resumption (`handshake`, `session`)
//! - Keepalive state (`keepalive`)
//! - Listener / connector endpoints and the connection actor (`tunnel`)

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
pub mod codec;
pub mod handshake;
pub mod keepalive;
pub mod rpc;
pub mod session;
pub mod tunnel;
pub mod wire;

pub use codec::{encode_frame, FrameDecoder, TunnelError};
pub use handshake::{HandshakeOutcome, PROTOCOL_VERSION};
pub use tunnel::{TunnelConnector, TunnelEvent, TunnelListener};
