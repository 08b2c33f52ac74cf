//! RPC aggregation state.
//!
//! Every in-flight administrative RPC owns one slot in a bounded pending
//! table keyed by its nonce; partial results from fork nodes merge into
//! the slot until the outstanding-session count drains. Merge rules are
//! type-specific: counts sum, fork lists concatenate and deduplicate by
//! fork hex (first occurrence wins), block locations keep the first
//! non-empty answer, and `STOP` carries no payload at all.

use std::collections::VecDeque;

use hashbrown::HashSet;
use tracing::trace;

use forkweave_core::event::Nonce;
use forkweave_tunnel::rpc::{ForkProfile, RpcRequest, RpcResult};

/// Capacity of the pending table; the oldest slot is evicted past this.
pub const PENDING_CAPACITY: usize = 100;

/// The neutral element a slot starts from.
#[must_use]
pub fn zero_result(request: &RpcRequest) -> RpcResult {
    match request {
        RpcRequest::Stop { .. } => RpcResult::Stop,
        RpcRequest::GetForkCount { .. } => RpcResult::ForkCount { count: 0 },
        RpcRequest::ListFork { .. } => RpcResult::ListFork { forks: Vec::new() },
        RpcRequest::GetBlockLocation { .. } => RpcResult::BlockLocation {
            fork: None,
            height: 0,
        },
    }
}

/// Deduplicate by fork hex, keeping the first occurrence.
pub fn dedupe_forks(forks: &mut Vec<ForkProfile>) {
    let mut seen = HashSet::new();
    forks.retain(|profile| seen.insert(profile.fork.to_hex()));
}

/// Merge one partial into an accumulator of the same shape. Mismatched
/// shapes are dropped: a reply for another RPC type cannot corrupt the
/// slot.
pub fn merge_results(acc: &mut RpcResult, partial: RpcResult) {
    match (acc, partial) {
        (RpcResult::Stop, RpcResult::Stop) => {}
        (RpcResult::ForkCount { count }, RpcResult::ForkCount { count: add }) => {
            *count += add;
        }
        (RpcResult::ListFork { forks }, RpcResult::ListFork { forks: more }) => {
            forks.extend(more);
            dedupe_forks(forks);
        }
        (
            RpcResult::BlockLocation { fork, height },
            RpcResult::BlockLocation {
                fork: Some(found),
                height: found_height,
            },
        ) => {
            if fork.is_none() {
                *fork = Some(found);
                *height = found_height;
            }
        }
        (RpcResult::BlockLocation { .. }, RpcResult::BlockLocation { fork: None, .. }) => {}
        (acc, partial) => {
            trace!(?acc, ?partial, "mismatched rpc merge dropped");
        }
    }
}

/// Bounded deque of `(nonce, partial result)` slots.
///
/// Push order is age order: at capacity the oldest slot falls off, and a
/// nonce collision replaces the older slot outright.
#[derive(Debug, Default)]
pub struct PendingRpc {
    slots: VecDeque<(Nonce, RpcResult)>,
}

impl PendingRpc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh slot for `request`.
    pub fn insert(&mut self, request: &RpcRequest) {
        let nonce = request.nonce();
        self.slots.retain(|(n, _)| *n != nonce);
        if self.slots.len() >= PENDING_CAPACITY {
            self.slots.pop_front();
        }
        self.slots.push_back((nonce, zero_result(request)));
    }

    /// Merge a partial into the slot for `nonce`. False when the slot is
    /// unknown (evicted, or a stale nonce).
    pub fn merge(&mut self, nonce: Nonce, partial: RpcResult) -> bool {
        match self.slots.iter_mut().find(|(n, _)| *n == nonce) {
            Some((_, acc)) => {
                merge_results(acc, partial);
                true
            }
            None => false,
        }
    }

    /// Remove and return the slot for `nonce`.
    pub fn take(&mut self, nonce: Nonce) -> Option<RpcResult> {
        let pos = self.slots.iter().position(|(n, _)| *n == nonce)?;
        self.slots.remove(pos).map(|(_, result)| result)
    }

    #[must_use]
    pub fn contains(&self, nonce: Nonce) -> bool {
        self.slots.iter().any(|(n, _)| *n == nonce)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
