//! Shared test harness: a stub chain service and an in-process
//! dispatcher wired to raw channels, so scenarios can inject tunnel
//! events and observe both directions without sockets.

#![allow(dead_code)] // each test binary uses a subset of the helpers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Sender};
use hashbrown::HashMap;

use forkweave::chain::{ChainService, SharedChain};
use forkweave::dispatcher::{ChainUpdate, Dispatcher, DispatcherChannels, NodeRole, RpcCall};
use forkweave::{Envelope, ForkId, ForkProfile, Hash256, RoutedEvent, SessionId, TunnelEvent};

pub const RECV: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(200);

pub fn fork(byte: u8) -> ForkId {
    Hash256::from_bytes([byte; 32])
}

pub fn h256(byte: u8) -> Hash256 {
    Hash256::from_bytes([byte; 32])
}

pub fn profile(byte: u8) -> ForkProfile {
    ForkProfile {
        fork: fork(byte),
        name: format!("fork-{byte}"),
        symbol: "FWV".into(),
        isolated: false,
    }
}

/// Canned chain layer.
#[derive(Default)]
pub struct StubChain {
    pub count: u64,
    pub forks: Vec<ForkProfile>,
    pub locations: HashMap<Hash256, (ForkId, u32)>,
    pub shutdowns: AtomicUsize,
}

impl ChainService for StubChain {
    fn fork_count(&self) -> u64 {
        self.count
    }

    fn list_fork(&self, _all: bool) -> Vec<ForkProfile> {
        self.forks.clone()
    }

    fn block_location(&self, block: Hash256) -> Option<(ForkId, u32)> {
        self.locations.get(&block).copied()
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub local_tx: Sender<RoutedEvent>,
    pub child_tx: Sender<TunnelEvent>,
    pub parent_tx: Sender<TunnelEvent>,
    pub update_tx: Sender<ChainUpdate>,
    pub rpc_tx: Sender<RpcCall>,
    pub peer_rx: Receiver<RoutedEvent>,
    pub chain: Arc<StubChain>,
}

/// Run a dispatcher on its own thread; the harness keeps every input
/// channel open so the loop stays alive for the whole test.
pub fn spawn(role: NodeRole, my_forks: &[ForkId], chain: StubChain) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let (local_tx, local_rx) = flume::unbounded();
    let (child_tx, child_rx) = flume::unbounded();
    let (parent_tx, parent_rx) = flume::unbounded();
    let (update_tx, update_rx) = flume::unbounded();
    let (rpc_tx, rpc_rx) = flume::unbounded();
    let (peer_tx, peer_rx) = flume::unbounded();

    let chain = Arc::new(chain);
    let shared: SharedChain = chain.clone();
    let dispatcher = Dispatcher::new(
        role,
        my_forks.iter().copied().collect(),
        shared,
        64,
        DispatcherChannels {
            local_rx,
            child_rx,
            parent_rx,
            update_rx,
            rpc_rx,
            peer_tx,
        },
    );
    std::thread::spawn(move || futures::executor::block_on(dispatcher.run()));

    Harness {
        local_tx,
        child_tx,
        parent_tx,
        update_tx,
        rpc_tx,
        peer_rx,
        chain,
    }
}

/// Attach a child session; returns the envelopes the dispatcher sends to
/// it (replay included).
pub fn attach_child(harness: &Harness, session: u64) -> Receiver<Envelope> {
    let (tx, rx) = flume::unbounded();
    harness
        .child_tx
        .send(TunnelEvent::Up {
            session: SessionId(session),
            reconnect: false,
            tx,
        })
        .unwrap();
    rx
}

/// Attach the parent tunnel (fork-node harnesses); returns the envelopes
/// the dispatcher forwards upstream.
pub fn attach_parent(harness: &Harness) -> Receiver<Envelope> {
    let (tx, rx) = flume::unbounded();
    harness
        .parent_tx
        .send(TunnelEvent::Up {
            session: SessionId(0xff),
            reconnect: false,
            tx,
        })
        .unwrap();
    rx
}

pub fn child_frame(harness: &Harness, session: u64, envelope: Envelope) {
    harness
        .child_tx
        .send(TunnelEvent::Frame {
            session: SessionId(session),
            envelope,
        })
        .unwrap();
}

pub fn parent_frame(harness: &Harness, envelope: Envelope) {
    harness
        .parent_tx
        .send(TunnelEvent::Frame {
            session: SessionId(0xff),
            envelope,
        })
        .unwrap();
}

pub fn recv<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(RECV).expect("expected a message")
}

pub fn expect_quiet<T: std::fmt::Debug>(rx: &Receiver<T>) {
    if let Ok(msg) = rx.recv_timeout(QUIET) {
        panic!("expected silence, got {msg:?}");
    }
}
