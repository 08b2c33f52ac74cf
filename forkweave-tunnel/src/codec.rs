//! Tunnel frame codec.
//!
//! Frame layout on the wire:
//!
//! ```text
//! [0..4]    u32 total length, big-endian, counts the whole frame
//! [4..6]    u16 frame kind, little-endian
//! [6..14]   u64 nonce, little-endian
//! [14..46]  fork id, 32 raw bytes (all-zero = not applicable)
//! [46..]    payload (length - 46 bytes)
//! ```
//!
//! The decoder is stateful only through the caller's accumulation buffer:
//! it leaves partial frames in place and returns `None` until the whole
//! frame is available. A declared length shorter than the header or past
//! the configured cap is a protocol violation; recovery is dropping the
//! connection.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use thiserror::Error;

use forkweave_core::envelope::{Envelope, FrameKind};
use forkweave_core::error::FabricError;
use forkweave_core::hash::Hash256;

/// Fixed bytes before the payload, including the length field itself.
pub const FRAME_HEADER_LEN: usize = 4 + 2 + 8 + 32;

/// Tunnel protocol errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Protocol violation: frame length below header size")]
    LengthTooShort,

    #[error("Protocol violation: frame size {size} exceeds cap {max}")]
    SizeTooLarge { size: usize, max: usize },

    #[error("Protocol violation: unknown frame kind {0}")]
    UnknownKind(u16),

    #[error("Truncated record")]
    Truncated,

    #[error("Protocol violation")]
    Protocol,

    #[error("Unsupported handshake version {0}")]
    Version(u32),

    #[error("Handshake timeout")]
    HandshakeTimeout,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<TunnelError> for FabricError {
    fn from(err: TunnelError) -> Self {
        match err {
            TunnelError::Version(v) => Self::VersionMismatch(v),
            TunnelError::Io(e) => Self::Io(e),
            other => Self::malformed(other.to_string()),
        }
    }
}

/// Result type alias for tunnel operations
pub type Result<T> = std::result::Result<T, TunnelError>;

/// Stateful frame decoder.
///
/// Feed reads into one `BytesMut` and call [`FrameDecoder::decode`] until
/// it returns `None`.
#[derive(Debug)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl FrameDecoder {
    #[must_use]
    pub const fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Decode a single frame from `src`.
    ///
    /// Returns:
    /// - `Ok(Some(envelope))` -> frame decoded and consumed
    /// - `Ok(None)` -> need more data
    /// - `Err` -> protocol violation; drop the connection
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        if src.len() < 4 {
            return Ok(None);
        }

        let total = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if total < FRAME_HEADER_LEN {
            return Err(TunnelError::LengthTooShort);
        }
        if total > self.max_frame_size {
            return Err(TunnelError::SizeTooLarge {
                size: total,
                max: self.max_frame_size,
            });
        }

        if src.len() < total {
            // Partial frame: leave it accumulating.
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(4);

        let kind_code = frame.get_u16_le();
        let kind = FrameKind::from_code(kind_code).ok_or(TunnelError::UnknownKind(kind_code))?;
        let nonce = frame.get_u64_le();

        let mut fork = [0u8; 32];
        frame.copy_to_slice(&mut fork);

        Ok(Some(Envelope::new(
            kind,
            nonce,
            Hash256::from_bytes(fork),
            frame.freeze(),
        )))
    }
}

/// Encode one envelope into a wire frame.
#[must_use]
pub fn encode_frame(envelope: &Envelope) -> Bytes {
    let total = FRAME_HEADER_LEN + envelope.payload.len();
    let mut out = BytesMut::with_capacity(total);

    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&envelope.kind.code().to_le_bytes());
    out.extend_from_slice(&envelope.nonce.to_le_bytes());
    out.extend_from_slice(envelope.fork.as_bytes());
    out.extend_from_slice(&envelope.payload);

    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkweave_core::event::NONCE_LOCAL;

    fn envelope() -> Envelope {
        Envelope::new(
            FrameKind::Inv,
            42,
            Hash256::from_bytes([7; 32]),
            Bytes::from_static(b"payload"),
        )
    }

    #[test]
    fn frame_round_trip() {
        let env = envelope();
        let wire = encode_frame(&env);

        let mut decoder = FrameDecoder::new(1024);
        let mut buf = BytesMut::from(&wire[..]);
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, env);
        assert!(buf.is_empty());
    }

    #[test]
    fn fragmented_input_waits() {
        let wire = encode_frame(&envelope());
        let mut decoder = FrameDecoder::new(1024);

        let mut partial = BytesMut::new();
        for (i, byte) in wire.iter().enumerate() {
            partial.extend_from_slice(&[*byte]);
            let out = decoder.decode(&mut partial).unwrap();
            if i + 1 < wire.len() {
                assert!(out.is_none());
            } else {
                assert_eq!(out.unwrap(), envelope());
            }
        }
    }

    #[test]
    fn two_frames_in_one_buffer() {
        let a = Envelope::control(FrameKind::Ping, NONCE_LOCAL);
        let b = envelope();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(&a));
        buf.extend_from_slice(&encode_frame(&b));

        let mut decoder = FrameDecoder::new(1024);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), a);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), b);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn short_length_is_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 42]);

        let mut decoder = FrameDecoder::new(1024);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(TunnelError::LengthTooShort)
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(2048u32).to_be_bytes());

        let mut decoder = FrameDecoder::new(1024);
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(TunnelError::SizeTooLarge { .. })
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut env = envelope();
        env.payload = Bytes::new();
        let mut wire = BytesMut::from(&encode_frame(&env)[..]);
        wire[4] = 0xff; // clobber the kind
        wire[5] = 0xff;

        let mut decoder = FrameDecoder::new(1024);
        assert!(matches!(
            decoder.decode(&mut wire),
            Err(TunnelError::UnknownKind(_))
        ));
    }
}
