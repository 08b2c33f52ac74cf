//! Node wiring.
//!
//! Assembles a dispatcher with its tunnel endpoints and hands the caller
//! one [`NodeHandle`] for feeding peer events, publishing chain updates
//! and issuing administrative RPCs. The dispatcher and the tunnel
//! endpoints each run as their own task on the caller's runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use hashbrown::HashSet;
use tracing::debug;

use forkweave_core::error::{FabricError, Result};
use forkweave_core::event::RoutedEvent;
use forkweave_core::hash::{ForkId, Hash256};
use forkweave_core::options::TunnelOptions;
use forkweave_tunnel::rpc::{RpcRequest, RpcResult};
use forkweave_tunnel::tunnel::{TunnelConnector, TunnelEvent, TunnelListener};

use crate::chain::SharedChain;
use crate::dispatcher::{ChainUpdate, Dispatcher, DispatcherChannels, NodeRole, RpcCall};

/// The caller's side of a running node.
pub struct NodeHandle {
    /// Feed decoded events from the real peer network.
    pub local_tx: Sender<RoutedEvent>,
    /// Publish new-block / new-tx notifications.
    pub update_tx: Sender<ChainUpdate>,
    /// Events the dispatcher emits towards the real peer network.
    pub peer_rx: Receiver<RoutedEvent>,

    rpc_tx: Sender<RpcCall>,
    rpc_nonce: AtomicU64,
}

impl NodeHandle {
    /// Issue an administrative RPC; the receiver resolves once the
    /// cluster-wide aggregate is complete.
    pub fn call(&self, build: impl FnOnce(u64) -> RpcRequest) -> Result<oneshot::Receiver<RpcResult>> {
        let nonce = self.rpc_nonce.fetch_add(1, Ordering::Relaxed);
        let (completion, receiver) = oneshot::channel();
        let request = build(nonce);
        self.rpc_tx
            .send(RpcCall {
                request,
                completion,
            })
            .map_err(|_| FabricError::ChannelSend)?;
        Ok(receiver)
    }

    pub fn stop(&self) -> Result<oneshot::Receiver<RpcResult>> {
        self.call(|nonce| RpcRequest::Stop { nonce })
    }

    pub fn get_fork_count(&self) -> Result<oneshot::Receiver<RpcResult>> {
        self.call(|nonce| RpcRequest::GetForkCount { nonce })
    }

    pub fn list_fork(&self, all: bool) -> Result<oneshot::Receiver<RpcResult>> {
        self.call(move |nonce| RpcRequest::ListFork { nonce, all })
    }

    pub fn get_block_location(&self, block: Hash256) -> Result<oneshot::Receiver<RpcResult>> {
        self.call(move |nonce| RpcRequest::GetBlockLocation { nonce, block })
    }
}

fn build(
    role: NodeRole,
    my_forks: HashSet<ForkId>,
    chain: SharedChain,
    options: &TunnelOptions,
) -> (
    NodeHandle,
    Dispatcher,
    Sender<TunnelEvent>,
    Sender<TunnelEvent>,
) {
    let (local_tx, local_rx) = flume::bounded(options.recv_hwm);
    let (child_tx, child_rx) = flume::bounded(options.recv_hwm);
    let (parent_tx, parent_rx) = flume::bounded(options.recv_hwm);
    let (update_tx, update_rx) = flume::bounded(options.recv_hwm);
    let (rpc_tx, rpc_rx) = flume::unbounded();
    let (peer_tx, peer_rx) = flume::bounded(options.recv_hwm);

    let dispatcher = Dispatcher::new(
        role,
        my_forks,
        chain,
        options.max_peers,
        DispatcherChannels {
            local_rx,
            child_rx,
            parent_rx,
            update_rx,
            rpc_rx,
            peer_tx,
        },
    );

    let handle = NodeHandle {
        local_tx,
        update_tx,
        peer_rx,
        rpc_tx,
        rpc_nonce: AtomicU64::new(1),
    };

    (handle, dispatcher, child_tx, parent_tx)
}

/// A root node: terminates the wide-area peer protocol and serves child
/// fork nodes on `listen_addr`.
pub struct RootNode {
    pub handle: Arc<NodeHandle>,
    tasks: Vec<compio::runtime::Task<()>>,
    // A root has no parent; the slot stays open so the dispatcher's
    // select loop never sees a closed channel.
    _parent_tx: Sender<TunnelEvent>,
}

impl RootNode {
    pub async fn spawn(
        listen_addr: &str,
        chain: SharedChain,
        options: TunnelOptions,
    ) -> Result<Self> {
        let (handle, dispatcher, child_tx, parent_tx) =
            build(NodeRole::Root, HashSet::new(), chain, &options);

        let listener = TunnelListener::bind(listen_addr, options, child_tx)
            .await
            .map_err(FabricError::from)?;
        debug!(addr = %listener.local_addr()?, "root node listening");

        let tasks = vec![
            compio::runtime::spawn(listener.run()),
            compio::runtime::spawn(dispatcher.run()),
        ];
        Ok(Self {
            handle: Arc::new(handle),
            tasks,
            _parent_tx: parent_tx,
        })
    }

    #[must_use]
    pub fn tasks(&self) -> usize {
        self.tasks.len()
    }
}

/// A fork node: serves `my_forks` behind a parent tunnel, optionally
/// accepting children of its own.
pub struct ForkNode {
    pub handle: Arc<NodeHandle>,
    tasks: Vec<compio::runtime::Task<()>>,
    // Kept open when this node has no listener of its own.
    _child_tx: Option<Sender<TunnelEvent>>,
}

impl ForkNode {
    pub async fn spawn(
        parent_addr: &str,
        listen_addr: Option<&str>,
        my_forks: HashSet<ForkId>,
        chain: SharedChain,
        options: TunnelOptions,
    ) -> Result<Self> {
        let (handle, dispatcher, child_tx, parent_tx) =
            build(NodeRole::Fork, my_forks, chain, &options);

        let mut tasks = Vec::new();
        let child_keepalive = match listen_addr {
            Some(addr) => {
                let listener = TunnelListener::bind(addr, options.clone(), child_tx)
                    .await
                    .map_err(FabricError::from)?;
                debug!(addr = %listener.local_addr()?, "fork node listening for children");
                tasks.push(compio::runtime::spawn(listener.run()));
                None
            }
            None => Some(child_tx),
        };

        let connector = TunnelConnector::new(parent_addr, options, parent_tx);
        tasks.push(compio::runtime::spawn(connector.run()));
        tasks.push(compio::runtime::spawn(dispatcher.run()));

        Ok(Self {
            handle: Arc::new(handle),
            tasks,
            _child_tx: child_keepalive,
        })
    }

    #[must_use]
    pub fn tasks(&self) -> usize {
        self.tasks.len()
    }
}
