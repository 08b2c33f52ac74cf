//! Chain-service collaborator.
//!
//! The fabric routes events and aggregates RPC results but never touches
//! storage or consensus itself; everything it needs from the node's chain
//! layer goes through this trait.

use std::sync::Arc;

use forkweave_core::hash::{ForkId, Hash256};
use forkweave_tunnel::rpc::ForkProfile;

/// What the fabric asks of the chain layer.
pub trait ChainService: Send + Sync {
    /// Number of forks this node serves itself.
    fn fork_count(&self) -> u64;

    /// Profiles of the forks this node serves. `all` includes retired
    /// forks.
    fn list_fork(&self, all: bool) -> Vec<ForkProfile>;

    /// Where a block lives, if this node knows it.
    fn block_location(&self, block: Hash256) -> Option<(ForkId, u32)>;

    /// Begin node shutdown. Called once the cluster-wide `STOP` has
    /// drained.
    fn shutdown(&self);
}

/// Shared handle to the chain layer.
pub type SharedChain = Arc<dyn ChainService>;
