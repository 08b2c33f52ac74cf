//! Virtual peer-net dispatcher.
//!
//! The switchboard between the real peer network, the local chain layer,
//! the parent tunnel and any child tunnels. One instance runs per node as
//! a single-threaded async loop; every table it owns (subscription
//! counts, solicited ledger, active cache, topics, pending RPCs) is
//! touched only from that loop, so handlers see consistent state without
//! locks.
//!
//! Concurrency model:
//! - flume channels in, flume channels out.
//! - `futures::select!` for runtime-agnostic multiplexing.
//! - A handler suspends only on bounded-queue sends (backpressure).

use hashbrown::{HashMap, HashSet};
use flume::{Receiver, Sender};
use futures::channel::oneshot;
use tracing::{debug, trace, warn};

use forkweave_core::cache::ActiveCache;
use forkweave_core::envelope::{Envelope, FrameKind, SessionId};
use forkweave_core::event::{Flow, PeerEvent, RoutedEvent, NODE_NETWORK, NONCE_LOCAL};
use forkweave_core::hash::{ForkId, Hash256};
use forkweave_core::ledger::SolicitedLedger;
use forkweave_core::subscribe::SubscriptionRouter;
use forkweave_core::topics::{TopicTable, ALL_BLOCK_TOPIC, ALL_TX_TOPIC, RPC_CMD_TOPIC};
use forkweave_tunnel::rpc::{
    decode_request, decode_response, request_envelope, response_envelope, RpcRequest, RpcResponse,
    RpcResult,
};
use forkweave_tunnel::tunnel::TunnelEvent;
use forkweave_tunnel::wire::{decode_event, decode_topic, encode_added, encode_topic, AddedRecord};

use crate::chain::SharedChain;
use crate::rpc::{merge_results, zero_result, PendingRpc};

use bytes::Bytes;

/// Sender name stamped on every event the dispatcher emits. The peer
/// network uses it only to suppress self-echo.
pub const SENDER_DISPATCHER: &str = "dispatcher";

/// Which side of the tunnel this node terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Terminates the wide-area peer protocol.
    Root,
    /// Serves a subset of forks behind a parent tunnel.
    Fork,
}

/// Notifications from the local chain layer.
#[derive(Debug, Clone)]
pub enum ChainUpdate {
    Block {
        fork: ForkId,
        hash: Hash256,
        raw: Bytes,
    },
    Tx {
        fork: ForkId,
        hash: Hash256,
        raw: Bytes,
    },
}

/// An administrative RPC entering at this node, with its continuation.
#[derive(Debug)]
pub struct RpcCall {
    pub request: RpcRequest,
    pub completion: oneshot::Sender<RpcResult>,
}

/// The single in-flight fan-out this node is waiting on.
#[derive(Debug)]
struct ActiveRpc {
    request: RpcRequest,
    outstanding: usize,
    /// Present on the origin node; a relay sends its merged result up
    /// instead.
    completion: Option<oneshot::Sender<RpcResult>>,
}

/// Channel bundle wiring a dispatcher into its node.
pub struct DispatcherChannels {
    /// Events from the real peer network and local producers.
    pub local_rx: Receiver<RoutedEvent>,
    /// Lifecycle and frames from child tunnels (the listener side).
    pub child_rx: Receiver<TunnelEvent>,
    /// Lifecycle and frames from the parent tunnel (fork nodes).
    pub parent_rx: Receiver<TunnelEvent>,
    /// New-block / new-tx notifications from the chain layer.
    pub update_rx: Receiver<ChainUpdate>,
    /// Administrative RPC entry.
    pub rpc_rx: Receiver<RpcCall>,
    /// Events dispatched to the real peer network.
    pub peer_tx: Sender<RoutedEvent>,
}

/// The per-node switchboard.
pub struct Dispatcher {
    role: NodeRole,
    my_forks: HashSet<ForkId>,
    chain: SharedChain,

    router: SubscriptionRouter,
    ledger: SolicitedLedger,
    cache: ActiveCache,
    topics: TopicTable,
    pending: PendingRpc,
    active: Option<ActiveRpc>,

    children: HashMap<SessionId, Sender<Envelope>>,
    parent: Option<Sender<Envelope>>,
    next_sub_id: u64,

    local_rx: Receiver<RoutedEvent>,
    child_rx: Receiver<TunnelEvent>,
    parent_rx: Receiver<TunnelEvent>,
    update_rx: Receiver<ChainUpdate>,
    rpc_rx: Receiver<RpcCall>,
    peer_tx: Sender<RoutedEvent>,
}

impl Dispatcher {
    pub fn new(
        role: NodeRole,
        my_forks: HashSet<ForkId>,
        chain: SharedChain,
        max_peers: usize,
        channels: DispatcherChannels,
    ) -> Self {
        Self {
            role,
            my_forks,
            chain,
            router: SubscriptionRouter::new(),
            ledger: SolicitedLedger::new(),
            cache: ActiveCache::new(max_peers),
            topics: TopicTable::new(),
            pending: PendingRpc::new(),
            active: None,
            children: HashMap::new(),
            parent: None,
            next_sub_id: 1,
            local_rx: channels.local_rx,
            child_rx: channels.child_rx,
            parent_rx: channels.parent_rx,
            update_rx: channels.update_rx,
            rpc_rx: channels.rpc_rx,
            peer_tx: channels.peer_tx,
        }
    }

    /// Main event loop. Ends when any input channel's producer goes away.
    pub async fn run(mut self) {
        use futures::select;
        use futures::FutureExt;

        loop {
            select! {
                msg = self.local_rx.recv_async().fuse() => match msg {
                    Ok(routed) => self.on_local_event(routed).await,
                    Err(_) => break,
                },
                msg = self.child_rx.recv_async().fuse() => match msg {
                    Ok(ev) => self.on_child_event(ev).await,
                    Err(_) => break,
                },
                msg = self.parent_rx.recv_async().fuse() => match msg {
                    Ok(ev) => self.on_parent_event(ev).await,
                    Err(_) => break,
                },
                msg = self.update_rx.recv_async().fuse() => match msg {
                    Ok(update) => self.on_chain_update(update).await,
                    Err(_) => break,
                },
                msg = self.rpc_rx.recv_async().fuse() => match msg {
                    Ok(call) => self.on_rpc_call(call).await,
                    Err(_) => break,
                },
            }
        }
        debug!("dispatcher loop ended");
    }

    fn is_my_fork(&self, fork: ForkId) -> bool {
        self.my_forks.contains(&fork)
    }

    async fn push_children(&mut self, envelope: Envelope) {
        for tx in self.children.values() {
            let _ = tx.send_async(envelope.clone()).await;
        }
    }

    async fn send_to_child(&mut self, session: SessionId, envelope: Envelope) {
        if let Some(tx) = self.children.get(&session) {
            let _ = tx.send_async(envelope).await;
        }
    }

    async fn forward_up(&mut self, envelope: Envelope) {
        match &self.parent {
            Some(tx) => {
                let _ = tx.send_async(envelope).await;
            }
            None => warn!(kind = ?envelope.kind, "no parent tunnel, dropping upstream envelope"),
        }
    }

    async fn dispatch_peer(&mut self, event: PeerEvent, flow: Flow) {
        let routed = RoutedEvent {
            event,
            flow,
            sender: SENDER_DISPATCHER,
        };
        let _ = self.peer_tx.send_async(routed).await;
    }

    // === local events (real peer net / local producers) ===

    async fn on_local_event(&mut self, routed: RoutedEvent) {
        // Echo guard: never re-process our own emissions.
        if routed.is_from(SENDER_DISPATCHER) {
            return;
        }
        match self.role {
            NodeRole::Root => self.on_local_event_root(routed.event).await,
            NodeRole::Fork => self.on_local_event_fork(routed.event).await,
        }
    }

    async fn on_local_event_root(&mut self, event: PeerEvent) {
        match &event {
            PeerEvent::Active { nonce, .. } => {
                let envelope = envelope_of(&event);
                self.cache.insert(*nonce, envelope.clone());
                self.push_children(envelope).await;
            }
            PeerEvent::Deactive { nonce, .. } => {
                self.cache.remove(*nonce);
                self.ledger.forget_nonce(*nonce);
                self.push_children(envelope_of(&event)).await;
            }
            PeerEvent::NetReward { .. } | PeerEvent::NetClose { .. } => {
                self.dispatch_peer(event, Flow::Down).await;
            }
            _ => self.push_children(envelope_of(&event)).await,
        }
    }

    async fn on_local_event_fork(&mut self, event: PeerEvent) {
        match &event {
            PeerEvent::Subscribe { nonce, fork, forks } => {
                let delta = self.router.filter_this_subscribe(*nonce, forks);
                if !delta.is_empty() {
                    let up = PeerEvent::Subscribe {
                        nonce: *nonce,
                        fork: *fork,
                        forks: delta,
                    };
                    self.forward_up(envelope_of(&up)).await;
                }
            }
            PeerEvent::Unsubscribe { nonce, fork, forks } => {
                let delta = self.router.filter_this_unsubscribe(*nonce, forks);
                if !delta.is_empty() {
                    let up = PeerEvent::Unsubscribe {
                        nonce: *nonce,
                        fork: *fork,
                        forks: delta,
                    };
                    self.forward_up(envelope_of(&up)).await;
                }
            }
            PeerEvent::GetData { nonce, fork, inv } => {
                self.ledger.record(*fork, *nonce, inv);
                self.forward_up(envelope_of(&event)).await;
            }
            PeerEvent::GetBlocks { .. }
            | PeerEvent::NetReward { .. }
            | PeerEvent::NetClose { .. } => {
                self.forward_up(envelope_of(&event)).await;
            }
            PeerEvent::Inv { .. } | PeerEvent::Tx { .. } | PeerEvent::Block { .. } => {
                if event.nonce() == NONCE_LOCAL {
                    self.push_children(envelope_of(&event)).await;
                } else {
                    self.forward_up(envelope_of(&event)).await;
                }
            }
            PeerEvent::Active { .. } | PeerEvent::Deactive { .. } => {
                trace!("peer lifecycle event on fork node ignored");
            }
        }
    }

    // === child tunnels (listener side) ===

    async fn on_child_event(&mut self, event: TunnelEvent) {
        match event {
            TunnelEvent::Up {
                session,
                reconnect,
                tx,
            } => {
                debug!(%session, reconnect, "child session up");
                // Replay the current peer set before any live traffic. A
                // brand-new cluster has no peers yet; synthesize the
                // local one so the child learns its parent exists.
                if self.cache.is_empty() {
                    let synth = PeerEvent::Active {
                        nonce: NONCE_LOCAL,
                        services: NODE_NETWORK,
                    };
                    let _ = tx.send_async(envelope_of(&synth)).await;
                } else {
                    for envelope in self.cache.replay() {
                        let _ = tx.send_async(envelope.clone()).await;
                    }
                }
                self.children.insert(session, tx);
            }
            TunnelEvent::Down { session, reason } => {
                debug!(%session, %reason, "child session down");
                self.children.remove(&session);
                let was_rpc = self.topics.sessions(RPC_CMD_TOPIC).contains(&session);
                self.topics.remove_session(session);
                if was_rpc {
                    self.rpc_session_lost().await;
                }
            }
            TunnelEvent::Frame { session, envelope } => {
                self.on_child_frame(session, envelope).await;
            }
        }
    }

    async fn on_child_frame(&mut self, session: SessionId, envelope: Envelope) {
        match envelope.kind {
            kind if kind.is_peer_event() => self.on_child_peer_event(envelope).await,
            FrameKind::Sub => match decode_topic(&envelope.payload) {
                Ok(topic) => {
                    let id = envelope.nonce;
                    let reply = match self.topics.subscribe(id, session, &topic) {
                        Ok(()) => FrameKind::Ready,
                        Err(e) => {
                            debug!(%session, error = %e, "subscribe rejected");
                            FrameKind::NoSub
                        }
                    };
                    self.send_to_child(session, Envelope::control(reply, id)).await;
                }
                Err(e) => warn!(%session, error = %e, "malformed subscribe payload"),
            },
            FrameKind::Unsub => self.topics.unsubscribe(envelope.nonce),
            FrameKind::RpcResponse => self.on_rpc_response(envelope).await,
            other => trace!(kind = ?other, "unexpected frame from child dropped"),
        }
    }

    /// Child -> parent traffic: the "up" half of the routing table.
    async fn on_child_peer_event(&mut self, envelope: Envelope) {
        match envelope.kind {
            FrameKind::Reward | FrameKind::Close => match self.role {
                NodeRole::Root => match decode_event(&envelope.payload) {
                    Ok(event) => self.dispatch_peer(event, Flow::Unset).await,
                    Err(e) => warn!(error = %e, "undecodable reward/close from child"),
                },
                NodeRole::Fork => self.forward_up(envelope).await,
            },
            FrameKind::Subscribe => {
                let Ok(PeerEvent::Subscribe { nonce, fork, forks }) =
                    decode_event(&envelope.payload)
                else {
                    warn!("undecodable subscribe from child");
                    return;
                };
                let delta = self.router.filter_child_subscribe(nonce, &forks);
                if delta.is_empty() {
                    return;
                }
                let up = PeerEvent::Subscribe {
                    nonce,
                    fork,
                    forks: delta,
                };
                match self.role {
                    NodeRole::Fork => self.forward_up(envelope_of(&up)).await,
                    NodeRole::Root => self.dispatch_peer(up, Flow::Up).await,
                }
            }
            FrameKind::Unsubscribe => {
                let Ok(PeerEvent::Unsubscribe { nonce, fork, forks }) =
                    decode_event(&envelope.payload)
                else {
                    warn!("undecodable unsubscribe from child");
                    return;
                };
                let delta = self.router.filter_child_unsubscribe(nonce, &forks);
                if delta.is_empty() {
                    return;
                }
                let up = PeerEvent::Unsubscribe {
                    nonce,
                    fork,
                    forks: delta,
                };
                match self.role {
                    NodeRole::Fork => self.forward_up(envelope_of(&up)).await,
                    NodeRole::Root => self.dispatch_peer(up, Flow::Up).await,
                }
            }
            FrameKind::GetBlocks | FrameKind::GetData => match self.role {
                NodeRole::Root => match decode_event(&envelope.payload) {
                    Ok(event) => self.dispatch_peer(event, Flow::Up).await,
                    Err(e) => warn!(error = %e, "undecodable request from child"),
                },
                NodeRole::Fork => {
                    if self.is_my_fork(envelope.fork) && envelope.nonce == NONCE_LOCAL {
                        match decode_event(&envelope.payload) {
                            Ok(event) => self.dispatch_peer(event, Flow::Up).await,
                            Err(e) => warn!(error = %e, "undecodable request from child"),
                        }
                    } else {
                        self.forward_up(envelope).await;
                    }
                }
            },
            FrameKind::Inv | FrameKind::Tx | FrameKind::Block => match self.role {
                NodeRole::Root => match decode_event(&envelope.payload) {
                    Ok(event) => self.dispatch_peer(event, Flow::Up).await,
                    Err(e) => warn!(error = %e, "undecodable data event from child"),
                },
                NodeRole::Fork => self.forward_up(envelope).await,
            },
            _ => trace!(kind = ?envelope.kind, "peer lifecycle frame from child ignored"),
        }
    }

    // === parent tunnel (fork nodes) ===

    async fn on_parent_event(&mut self, event: TunnelEvent) {
        match event {
            TunnelEvent::Up {
                session,
                reconnect,
                tx,
            } => {
                debug!(%session, reconnect, "parent tunnel up");
                // Re-register RPC interest; the parent's topic table
                // forgot us if this is a fresh session.
                let id = self.next_sub_id;
                self.next_sub_id += 1;
                let sub = Envelope::new(
                    FrameKind::Sub,
                    id,
                    Hash256::ZERO,
                    encode_topic(RPC_CMD_TOPIC),
                );
                let _ = tx.send_async(sub).await;
                self.parent = Some(tx);
            }
            TunnelEvent::Down { session, reason } => {
                debug!(%session, %reason, "parent tunnel down");
                self.parent = None;
            }
            TunnelEvent::Frame { envelope, .. } => self.on_parent_frame(envelope).await,
        }
    }

    /// Parent -> child traffic: the "down" half of the routing table.
    async fn on_parent_frame(&mut self, envelope: Envelope) {
        match envelope.kind {
            FrameKind::Active => match decode_event(&envelope.payload) {
                Ok(event) => {
                    self.cache.insert(envelope.nonce, envelope.clone());
                    self.dispatch_peer(event, Flow::Down).await;
                    self.push_children(envelope).await;
                }
                Err(e) => warn!(error = %e, "undecodable active from parent"),
            },
            FrameKind::Deactive => match decode_event(&envelope.payload) {
                Ok(event) => {
                    self.cache.remove(envelope.nonce);
                    self.ledger.forget_nonce(envelope.nonce);
                    self.dispatch_peer(event, Flow::Down).await;
                    self.push_children(envelope).await;
                }
                Err(e) => warn!(error = %e, "undecodable deactive from parent"),
            },
            FrameKind::Subscribe
            | FrameKind::Unsubscribe
            | FrameKind::GetBlocks
            | FrameKind::GetData => {
                if self.is_my_fork(envelope.fork) {
                    match decode_event(&envelope.payload) {
                        Ok(event) => self.dispatch_peer(event, Flow::Down).await,
                        Err(e) => warn!(error = %e, "undecodable envelope from parent"),
                    }
                } else {
                    self.push_children(envelope).await;
                }
            }
            FrameKind::Inv => {
                if self.is_my_fork(envelope.fork) {
                    match decode_event(&envelope.payload) {
                        Ok(event) => self.dispatch_peer(event, Flow::Down).await,
                        Err(e) => warn!(error = %e, "undecodable inv from parent"),
                    }
                }
                self.push_children(envelope).await;
            }
            FrameKind::Tx | FrameKind::Block => {
                self.on_parent_data(envelope).await;
            }
            FrameKind::RpcRequest => self.on_rpc_request(envelope).await,
            FrameKind::Ready | FrameKind::NoSub => {
                trace!(kind = ?envelope.kind, id = envelope.nonce, "topic ack from parent");
            }
            other => trace!(kind = ?other, "unexpected frame from parent dropped"),
        }
    }

    /// Solicited-data gate for inbound blocks and transactions.
    async fn on_parent_data(&mut self, envelope: Envelope) {
        if self.is_my_fork(envelope.fork) {
            match decode_event(&envelope.payload) {
                Ok(event) => {
                    let (nonce, fork, hash) = match &event {
                        PeerEvent::Tx { nonce, fork, tx } => (*nonce, *fork, tx.hash),
                        PeerEvent::Block { nonce, fork, block } => (*nonce, *fork, block.hash),
                        _ => {
                            warn!("data frame decoded to a non-data event");
                            return;
                        }
                    };
                    if nonce == NONCE_LOCAL || self.ledger.consume(fork, nonce, hash) {
                        self.dispatch_peer(event, Flow::Down).await;
                    } else {
                        // Unsolicited: silently withheld from the peer
                        // net, but still forwarded below.
                        trace!(fork = %fork, nonce, hash = %hash, "unsolicited data withheld");
                    }
                }
                Err(e) => warn!(error = %e, "undecodable data frame from parent"),
            }
        }
        self.push_children(envelope).await;
    }

    // === chain pushes ===

    async fn on_chain_update(&mut self, update: ChainUpdate) {
        let (topic, fork, raw) = match update {
            ChainUpdate::Block { fork, raw, .. } => (ALL_BLOCK_TOPIC, fork, raw),
            ChainUpdate::Tx { fork, raw, .. } => (ALL_TX_TOPIC, fork, raw),
        };
        let subscribers = self.topics.subscribers(topic);
        if subscribers.is_empty() {
            return;
        }
        let payload = encode_added(&AddedRecord {
            topic: topic.to_string(),
            fork,
            object: raw,
        });
        for (id, session) in subscribers {
            let envelope = Envelope::new(FrameKind::Added, id, fork, payload.clone());
            self.send_to_child(session, envelope).await;
        }
    }

    // === rpc fan-out ===

    async fn on_rpc_call(&mut self, call: RpcCall) {
        let RpcCall {
            request,
            completion,
        } = call;

        // A block the chain already places needs no fan-out.
        if let RpcRequest::GetBlockLocation { block, .. } = &request {
            if let Some((fork, height)) = self.chain.block_location(*block) {
                let _ = completion.send(RpcResult::BlockLocation {
                    fork: Some(fork),
                    height,
                });
                return;
            }
        }

        self.pending.insert(&request);
        let sessions = self.topics.sessions(RPC_CMD_TOPIC);

        if sessions.is_empty() {
            self.pending.take(request.nonce());
            let result = self.local_contribution(&request);
            let stop = matches!(request, RpcRequest::Stop { .. });
            let _ = completion.send(result);
            if stop {
                self.chain.shutdown();
            }
            return;
        }

        if self.active.is_some() {
            debug!("replacing in-flight rpc; previous continuation cancelled");
        }
        self.active = Some(ActiveRpc {
            request: request.clone(),
            outstanding: sessions.len(),
            completion: Some(completion),
        });

        let envelope = request_envelope(&request);
        for session in sessions {
            self.send_to_child(session, envelope.clone()).await;
        }
    }

    /// A request pushed down by our parent: contribute, or relay to our
    /// own children first.
    async fn on_rpc_request(&mut self, envelope: Envelope) {
        let request = match decode_request(&envelope.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "undecodable rpc request from parent");
                return;
            }
        };

        self.pending.insert(&request);
        let sessions = self.topics.sessions(RPC_CMD_TOPIC);

        if sessions.is_empty() {
            self.pending.take(request.nonce());
            let result = self.local_contribution(&request);
            let stop = matches!(request, RpcRequest::Stop { .. });
            let response = RpcResponse { request, result };
            self.forward_up(response_envelope(&response)).await;
            if stop {
                self.chain.shutdown();
            }
            return;
        }

        self.active = Some(ActiveRpc {
            request: request.clone(),
            outstanding: sessions.len(),
            completion: None,
        });
        let forward = request_envelope(&request);
        for session in sessions {
            self.send_to_child(session, forward.clone()).await;
        }
    }

    /// A partial result coming back from a child.
    async fn on_rpc_response(&mut self, envelope: Envelope) {
        let response = match decode_response(&envelope.payload) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "undecodable rpc response from child");
                return;
            }
        };
        let nonce = response.request.nonce();

        match self.active.as_mut() {
            Some(active) if active.request.nonce() == nonce => {
                active.outstanding = active.outstanding.saturating_sub(1);
            }
            _ => {
                debug!(nonce, "rpc reply with no pending fan-out discarded");
                return;
            }
        }

        if !self.pending.merge(nonce, response.result) {
            debug!(nonce, "pending slot missing, partial dropped");
        }

        if self.active.as_ref().is_some_and(|a| a.outstanding == 0) {
            self.finalize_rpc().await;
        }
    }

    /// A session we were waiting on vanished; treat it as an empty reply.
    async fn rpc_session_lost(&mut self) {
        let drained = match self.active.as_mut() {
            Some(active) => {
                active.outstanding = active.outstanding.saturating_sub(1);
                active.outstanding == 0
            }
            None => false,
        };
        if drained {
            self.finalize_rpc().await;
        }
    }

    /// All awaited replies are in (or their sessions are gone): merge our
    /// own contribution and deliver exactly once.
    async fn finalize_rpc(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let nonce = active.request.nonce();
        let mut result = self
            .pending
            .take(nonce)
            .unwrap_or_else(|| zero_result(&active.request));
        merge_results(&mut result, self.local_contribution(&active.request));

        let stop = matches!(active.request, RpcRequest::Stop { .. });
        match active.completion {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => {
                let response = RpcResponse {
                    request: active.request,
                    result,
                };
                self.forward_up(response_envelope(&response)).await;
            }
        }
        if stop {
            self.chain.shutdown();
        }
    }

    fn local_contribution(&self, request: &RpcRequest) -> RpcResult {
        match request {
            RpcRequest::Stop { .. } => RpcResult::Stop,
            RpcRequest::GetForkCount { .. } => RpcResult::ForkCount {
                count: self.chain.fork_count(),
            },
            RpcRequest::ListFork { all, .. } => RpcResult::ListFork {
                forks: self.chain.list_fork(*all),
            },
            RpcRequest::GetBlockLocation { block, .. } => match self.chain.block_location(*block) {
                Some((fork, height)) => RpcResult::BlockLocation {
                    fork: Some(fork),
                    height,
                },
                None => RpcResult::BlockLocation {
                    fork: None,
                    height: 0,
                },
            },
        }
    }
}

/// Serialize an event into its tunnel envelope.
fn envelope_of(event: &PeerEvent) -> Envelope {
    forkweave_tunnel::wire::envelope_for_event(event)
}
