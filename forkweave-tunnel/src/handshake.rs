//! Synchronous session handshake that completes before the pumps start.
//!
//! The child opens with `Connect { version, session }`; the parent
//! answers `Connected { session, reconnect }` or
//! `Failed { reason: "001", versions }` when the offered version is not
//! supported. Running the exchange to completion on the bare stream
//! before any actor is spawned keeps application frames strictly after
//! the session is established.
//!
//! Handshake frames reuse the normal frame header: the session id rides
//! in the nonce field, version data in the payload.

use bytes::{Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use compio::time::timeout;
use std::time::Duration;
use tracing::debug;

use forkweave_core::envelope::{Envelope, FrameKind, SessionId};
use forkweave_core::hash::Hash256;

use crate::codec::{encode_frame, Result, TunnelError, FRAME_HEADER_LEN};
use crate::session::SessionRegistry;
use crate::wire::{put_string, put_uvarint, Reader};

/// The only protocol version this node speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Reason string sent on a version mismatch.
pub const REASON_BAD_VERSION: &str = "001";

/// Handshake frames stay small; anything bigger is hostile.
const MAX_HANDSHAKE_FRAME: usize = 1024;

/// Result of a successful handshake, either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub session: SessionId,
    pub reconnect: bool,
}

fn connect_frame(session: SessionId) -> Bytes {
    let mut payload = BytesMut::with_capacity(4);
    payload.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    encode_frame(&Envelope::new(
        FrameKind::Connect,
        session.0,
        Hash256::ZERO,
        payload.freeze(),
    ))
}

fn connected_frame(outcome: HandshakeOutcome) -> Bytes {
    let mut payload = BytesMut::with_capacity(1);
    payload.extend_from_slice(&[u8::from(outcome.reconnect)]);
    encode_frame(&Envelope::new(
        FrameKind::Connected,
        outcome.session.0,
        Hash256::ZERO,
        payload.freeze(),
    ))
}

fn failed_frame(session: SessionId) -> Bytes {
    let mut payload = BytesMut::with_capacity(16);
    put_string(&mut payload, REASON_BAD_VERSION);
    put_uvarint(&mut payload, 1);
    payload.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    encode_frame(&Envelope::new(
        FrameKind::Failed,
        session.0,
        Hash256::ZERO,
        payload.freeze(),
    ))
}

async fn write_frame(stream: &mut TcpStream, frame: Bytes) -> Result<()> {
    let BufResult(res, _) = stream.write_all(frame.to_vec()).await;
    res?;
    Ok(())
}

/// Read exactly one frame off the bare stream.
///
/// Uses the length prefix to size the second read; no decoder state is
/// needed because nothing else is in flight during the handshake.
async fn read_frame(stream: &mut TcpStream) -> Result<Envelope> {
    let len_buf = [0u8; 4];
    let BufResult(res, len_buf) = stream.read_exact(len_buf).await;
    res?;

    let total = u32::from_be_bytes(len_buf) as usize;
    if total < FRAME_HEADER_LEN {
        return Err(TunnelError::LengthTooShort);
    }
    if total > MAX_HANDSHAKE_FRAME {
        return Err(TunnelError::SizeTooLarge {
            size: total,
            max: MAX_HANDSHAKE_FRAME,
        });
    }

    let body = vec![0u8; total - 4];
    let BufResult(res, body) = stream.read_exact(body).await;
    res?;

    let mut r = Reader::new(&body);
    let code = r.u16()?;
    let kind = FrameKind::from_code(code).ok_or(TunnelError::UnknownKind(code))?;
    let nonce = r.u64()?;
    let fork = r.hash()?;
    let payload = Bytes::copy_from_slice(&body[42..]);

    Ok(Envelope::new(kind, nonce, fork, payload))
}

/// Parent side: answer one `Connect`, admitting or rejecting the session.
pub async fn perform_server_handshake(
    stream: &mut TcpStream,
    registry: &mut SessionRegistry,
    handshake_timeout: Duration,
) -> Result<HandshakeOutcome> {
    let frame = timeout(handshake_timeout, read_frame(stream))
        .await
        .map_err(|_| TunnelError::HandshakeTimeout)??;

    if frame.kind != FrameKind::Connect {
        return Err(TunnelError::Protocol);
    }

    let mut r = Reader::new(&frame.payload);
    let version = r.u32()?;
    r.finish()?;
    let offered = SessionId(frame.nonce);

    if version != PROTOCOL_VERSION {
        debug!(version, "rejecting tunnel handshake");
        write_frame(stream, failed_frame(offered)).await?;
        return Err(TunnelError::Version(version));
    }

    let outcome = registry.admit(offered);
    write_frame(stream, connected_frame(outcome)).await?;
    debug!(session = %outcome.session, reconnect = outcome.reconnect, "tunnel session up");
    Ok(outcome)
}

/// Child side: offer our previous session (if any) and wait for the
/// verdict.
pub async fn perform_client_handshake(
    stream: &mut TcpStream,
    session: SessionId,
    handshake_timeout: Duration,
) -> Result<HandshakeOutcome> {
    write_frame(stream, connect_frame(session)).await?;

    let frame = timeout(handshake_timeout, read_frame(stream))
        .await
        .map_err(|_| TunnelError::HandshakeTimeout)??;

    match frame.kind {
        FrameKind::Connected => {
            let mut r = Reader::new(&frame.payload);
            let reconnect = r.u8()? != 0;
            r.finish()?;
            Ok(HandshakeOutcome {
                session: SessionId(frame.nonce),
                reconnect,
            })
        }
        FrameKind::Failed => {
            let mut r = Reader::new(&frame.payload);
            let reason = r.string()?;
            debug!(%reason, "tunnel handshake rejected");
            Err(TunnelError::Version(PROTOCOL_VERSION))
        }
        _ => Err(TunnelError::Protocol),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameDecoder;

    #[test]
    fn connect_frame_layout() {
        let frame = connect_frame(SessionId(0xabcd));
        let mut decoder = FrameDecoder::new(MAX_HANDSHAKE_FRAME);
        let mut buf = BytesMut::from(&frame[..]);
        let env = decoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(env.kind, FrameKind::Connect);
        assert_eq!(env.nonce, 0xabcd);
        assert_eq!(&env.payload[..], PROTOCOL_VERSION.to_le_bytes());
    }

    #[test]
    fn failed_frame_names_supported_versions() {
        let frame = failed_frame(SessionId::NONE);
        let mut decoder = FrameDecoder::new(MAX_HANDSHAKE_FRAME);
        let mut buf = BytesMut::from(&frame[..]);
        let env = decoder.decode(&mut buf).unwrap().unwrap();

        let mut r = Reader::new(&env.payload);
        assert_eq!(r.string().unwrap(), REASON_BAD_VERSION);
        assert_eq!(r.uvarint().unwrap(), 1);
        assert_eq!(r.u32().unwrap(), PROTOCOL_VERSION);
        r.finish().unwrap();
    }

    #[test]
    fn connected_frame_round_trip() {
        let outcome = HandshakeOutcome {
            session: SessionId(7),
            reconnect: true,
        };
        let frame = connected_frame(outcome);
        let mut decoder = FrameDecoder::new(MAX_HANDSHAKE_FRAME);
        let mut buf = BytesMut::from(&frame[..]);
        let env = decoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(env.kind, FrameKind::Connected);
        assert_eq!(env.nonce, 7);
        assert_eq!(env.payload[0], 1);
    }
}
