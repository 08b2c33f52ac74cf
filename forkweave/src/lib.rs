//! Forkweave
//!
//! A super-node routing fabric for multi-fork blockchain clusters: a
//! *root* node terminates the wide-area peer protocol and *fork* nodes,
//! attached over a framed event tunnel, each serve a subset of forks.
//! From the outside the cluster behaves as a single peer; internally the
//! fabric reference-counts fork interest, deduplicates solicited data,
//! replays the active peer set to (re)connecting children, and fans
//! administrative RPCs out across the cluster and back.
//!
//! Layering:
//! - [`forkweave_core`]: runtime-agnostic tables and the event model
//! - [`forkweave_tunnel`]: the wire protocol and tunnel endpoints
//! - this crate: the dispatcher, the RPC coordinator, and node wiring

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
pub mod chain;
pub mod dispatcher;
pub mod node;
pub mod rpc;

pub use chain::{ChainService, SharedChain};
pub use dispatcher::{
    ChainUpdate, Dispatcher, DispatcherChannels, NodeRole, RpcCall, SENDER_DISPATCHER,
};
pub use node::{ForkNode, NodeHandle, RootNode};
pub use rpc::{merge_results, zero_result, PendingRpc, PENDING_CAPACITY};

// Re-export the vocabulary types so most users need only this crate.
pub use forkweave_core::envelope::{Envelope, FrameKind, SessionId};
pub use forkweave_core::event::{
    BlockData, Flow, Inv, InvKind, Nonce, PeerEvent, RoutedEvent, TxData, NONCE_LOCAL,
};
pub use forkweave_core::hash::{ForkId, Hash256};
pub use forkweave_core::options::TunnelOptions;
pub use forkweave_tunnel::rpc::{ForkProfile, RpcRequest, RpcResult};
pub use forkweave_tunnel::tunnel::TunnelEvent;
