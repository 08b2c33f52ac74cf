//! Tunnel endpoints.
//!
//! One tunnel instance per adjacent node. The parent side runs a
//! [`TunnelListener`] that accepts children; the child side runs a
//! [`TunnelConnector`] that dials its parent and reconnects with backoff,
//! presenting its previous session id for resumption.
//!
//! Every established connection is driven by a single actor task that
//! owns the stream: it drains the outbound queue, performs timed reads,
//! and runs the keepalive state machine between frames. Lifecycle and
//! traffic surface on one event channel:
//!
//! - `Up { session, reconnect, tx }`: connection established; `tx` is
//!   the bounded outbound queue (`send_async` suspends past the
//!   high-water mark, which is the only backpressure point).
//! - `Frame { session, envelope }`: one inbound record.
//! - `Down { session, reason }`: connection gone.
//!
//! Dropping the `tx` handed out in `Up` closes the connection after the
//! queue drains.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use compio::net::{TcpListener, TcpStream};
use compio::time::timeout;
use flume::{Receiver, Sender};
use tracing::{debug, trace, warn};

use forkweave_core::envelope::{Envelope, FrameKind, SessionId};
use forkweave_core::options::TunnelOptions;
use forkweave_core::reconnect::ReconnectState;

use crate::codec::{encode_frame, FrameDecoder, Result, TunnelError};
use crate::handshake::{perform_client_handshake, perform_server_handshake};
use crate::keepalive::{Keepalive, KeepaliveAction};
use crate::session::SessionRegistry;

/// Granularity of the actor loop: how long one read may block before the
/// outbound queue is drained again.
const READ_TICK: Duration = Duration::from_millis(20);

const READ_CHUNK: usize = 8192;

/// Lifecycle and traffic events from a tunnel endpoint.
#[derive(Debug)]
pub enum TunnelEvent {
    Up {
        session: SessionId,
        reconnect: bool,
        tx: Sender<Envelope>,
    },
    Frame {
        session: SessionId,
        envelope: Envelope,
    },
    Down {
        session: SessionId,
        reason: String,
    },
}

async fn write_envelope<S>(stream: &mut S, envelope: &Envelope) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let frame = encode_frame(envelope);
    let BufResult(res, _) = stream.write_all(frame.to_vec()).await;
    res?;
    Ok(())
}

/// Drive one established connection until it dies.
///
/// Single task, split-pump style: drain writes, then block in a timed
/// read. The tick bounds outbound latency while a read is pending; the
/// keepalive window is tracked against wall time, not ticks.
async fn run_connection(
    mut stream: TcpStream,
    session: SessionId,
    options: TunnelOptions,
    frame_rx: Receiver<Envelope>,
    event_tx: Sender<TunnelEvent>,
) {
    let mut decoder = FrameDecoder::new(options.max_frame_size);
    let mut acc = BytesMut::with_capacity(READ_CHUNK);
    let mut keepalive = Keepalive::new();
    let mut last_activity = Instant::now();

    let reason = loop {
        // === WRITE PUMP ===
        let mut sender_gone = false;
        let mut write_err = None;
        loop {
            match frame_rx.try_recv() {
                Ok(envelope) => {
                    if let Err(e) = write_envelope(&mut stream, &envelope).await {
                        write_err = Some(e.to_string());
                        break;
                    }
                }
                Err(flume::TryRecvError::Empty) => break,
                Err(flume::TryRecvError::Disconnected) => {
                    sender_gone = true;
                    break;
                }
            }
        }
        if let Some(e) = write_err {
            break e;
        }
        if sender_gone {
            break "closed".to_string();
        }

        // === READ PUMP (timed) ===
        let buf = Vec::with_capacity(READ_CHUNK);
        match timeout(READ_TICK, read_some(&mut stream, buf)).await {
            Err(_elapsed) => {
                // No bytes this tick; check the idle window.
                if last_activity.elapsed() >= options.idle_window {
                    last_activity = Instant::now();
                    match keepalive.on_idle() {
                        KeepaliveAction::SendPing => {
                            trace!(session = %session, "idle window elapsed, pinging");
                            let ping = Envelope::control(FrameKind::Ping, 0);
                            if write_envelope(&mut stream, &ping).await.is_err() {
                                break "write failed".to_string();
                            }
                        }
                        KeepaliveAction::Close => {
                            break format!(
                                "session timeout after {:?}",
                                options.idle_window
                            );
                        }
                    }
                }
            }
            Ok(BufResult(Ok(0), _)) => break "peer closed".to_string(),
            Ok(BufResult(Ok(n), buf)) => {
                trace!(session = %session, bytes = n, "tunnel read");
                acc.extend_from_slice(&buf);
                keepalive.on_frame();
                last_activity = Instant::now();

                loop {
                    match decoder.decode(&mut acc) {
                        Ok(Some(envelope)) => match envelope.kind {
                            FrameKind::Ping => {
                                let pong = Envelope::control(FrameKind::Pong, 0);
                                if write_envelope(&mut stream, &pong).await.is_err() {
                                    break;
                                }
                            }
                            FrameKind::Pong => {}
                            _ => {
                                if event_tx
                                    .send_async(TunnelEvent::Frame { session, envelope })
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }
                        },
                        Ok(None) => break,
                        Err(e) => {
                            warn!(session = %session, error = %e, "malformed frame, dropping tunnel");
                            let _ = event_tx
                                .send_async(TunnelEvent::Down {
                                    session,
                                    reason: e.to_string(),
                                })
                                .await;
                            return;
                        }
                    }
                }
            }
            Ok(BufResult(Err(e), _)) => break e.to_string(),
        }
    };

    debug!(session = %session, %reason, "tunnel connection down");
    let _ = event_tx
        .send_async(TunnelEvent::Down { session, reason })
        .await;
}

/// One read into a fresh chunk; the filled buffer comes back with the
/// byte count.
async fn read_some<S>(stream: &mut S, buf: Vec<u8>) -> BufResult<usize, Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    use compio::io::AsyncReadExt;
    stream.read(buf).await
}

/// Parent-side endpoint: accepts child connections.
pub struct TunnelListener {
    listener: TcpListener,
    options: TunnelOptions,
    registry: SessionRegistry,
    event_tx: Sender<TunnelEvent>,
    tasks: Vec<compio::runtime::Task<()>>,
}

impl TunnelListener {
    /// Bind and get ready to accept children.
    pub async fn bind(
        addr: &str,
        options: TunnelOptions,
        event_tx: Sender<TunnelEvent>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        debug!(addr, "tunnel listener bound");
        Ok(Self {
            listener,
            options,
            registry: SessionRegistry::new(),
            event_tx,
            tasks: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Each admitted child gets its own connection actor and
    /// an `Up` event carrying the outbound queue.
    pub async fn run(mut self) {
        loop {
            let (mut stream, addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            debug!(%addr, "child connecting");

            let outcome = match perform_server_handshake(
                &mut stream,
                &mut self.registry,
                self.options.handshake_timeout,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(%addr, error = %e, "handshake rejected");
                    continue;
                }
            };

            let (frame_tx, frame_rx) = flume::bounded(self.options.send_hwm);
            if self
                .event_tx
                .send_async(TunnelEvent::Up {
                    session: outcome.session,
                    reconnect: outcome.reconnect,
                    tx: frame_tx,
                })
                .await
                .is_err()
            {
                return; // endpoint owner is gone
            }

            let task = compio::runtime::spawn(run_connection(
                stream,
                outcome.session,
                self.options.clone(),
                frame_rx,
                self.event_tx.clone(),
            ));
            self.tasks.push(task);
        }
    }
}

/// Child-side endpoint: dials the parent and keeps the tunnel alive.
pub struct TunnelConnector {
    addr: String,
    options: TunnelOptions,
    event_tx: Sender<TunnelEvent>,
}

impl TunnelConnector {
    #[must_use]
    pub fn new(addr: impl Into<String>, options: TunnelOptions, event_tx: Sender<TunnelEvent>) -> Self {
        Self {
            addr: addr.into(),
            options,
            event_tx,
        }
    }

    /// Connect loop with exponential backoff and session resumption.
    ///
    /// Returns only on a version rejection (retrying cannot help) or when
    /// the event channel owner went away.
    pub async fn run(self) {
        let mut session = SessionId::NONE;
        let mut backoff = ReconnectState::new(&self.options);

        loop {
            let mut stream = match TcpStream::connect(self.addr.as_str()).await {
                Ok(stream) => stream,
                Err(e) => {
                    let delay = backoff.next_delay();
                    trace!(addr = %self.addr, error = %e, ?delay, "connect failed, backing off");
                    compio::time::sleep(delay).await;
                    continue;
                }
            };

            let outcome = match perform_client_handshake(
                &mut stream,
                session,
                self.options.handshake_timeout,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(TunnelError::Version(v)) => {
                    warn!(version = v, "parent rejected our protocol version");
                    let _ = self
                        .event_tx
                        .send_async(TunnelEvent::Down {
                            session,
                            reason: "version mismatch".into(),
                        })
                        .await;
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    debug!(error = %e, ?delay, "handshake failed, backing off");
                    compio::time::sleep(delay).await;
                    continue;
                }
            };

            session = outcome.session;
            backoff.reset();

            let (frame_tx, frame_rx) = flume::bounded(self.options.send_hwm);
            if self
                .event_tx
                .send_async(TunnelEvent::Up {
                    session,
                    reconnect: outcome.reconnect,
                    tx: frame_tx,
                })
                .await
                .is_err()
            {
                return;
            }

            // The connection actor runs inline; when it returns the
            // connection is gone and we dial again.
            run_connection(
                stream,
                session,
                self.options.clone(),
                frame_rx,
                self.event_tx.clone(),
            )
            .await;

            compio::time::sleep(backoff.next_delay()).await;
        }
    }
}
