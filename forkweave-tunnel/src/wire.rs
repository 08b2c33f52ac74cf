//! Record serialization.
//!
//! Payload-level codecs for the records that ride inside tunnel frames:
//! peer events, topic control records and the `Added` object push. All
//! integers are little-endian; variable-length fields carry a LEB128
//! varint length prefix; hashes are 32 raw bytes.
//!
//! A peer-event payload is self-contained (it repeats kind and nonce), so
//! a node can forward the enclosing envelope without decoding it and the
//! far end can still reconstruct the event from the payload alone.

use bytes::{Bytes, BytesMut};

use forkweave_core::envelope::{Envelope, FrameKind};
use forkweave_core::event::{
    BlockData, CloseReason, Inv, InvKind, Nonce, PeerEvent, TxData,
};
use forkweave_core::hash::{ForkId, Hash256};

use crate::codec::{Result, TunnelError};

// === varint helpers ===

pub fn put_uvarint(out: &mut BytesMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.extend_from_slice(&[byte]);
        if value == 0 {
            break;
        }
    }
}

/// Bounded byte reader over a record payload.
///
/// Every accessor checks remaining length and fails with `Truncated`
/// instead of panicking, so malformed payloads surface as codec errors.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(TunnelError::Truncated);
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn uvarint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift >= 64 {
                return Err(TunnelError::Protocol);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn hash(&mut self) -> Result<Hash256> {
        let b = self.take(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(b);
        Ok(Hash256::from_bytes(out))
    }

    /// A varint length prefix followed by that many raw bytes.
    pub fn bytes(&mut self) -> Result<Bytes> {
        let len = self.uvarint()? as usize;
        if len > self.buf.len() {
            return Err(TunnelError::Truncated);
        }
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    pub fn string(&mut self) -> Result<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| TunnelError::Protocol)
    }

    /// The payload must be fully consumed; trailing garbage is an error.
    pub fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(TunnelError::Protocol)
        }
    }
}

pub fn put_bytes(out: &mut BytesMut, raw: &[u8]) {
    put_uvarint(out, raw.len() as u64);
    out.extend_from_slice(raw);
}

pub fn put_string(out: &mut BytesMut, s: &str) {
    put_bytes(out, s.as_bytes());
}

fn put_hashes(out: &mut BytesMut, hashes: &[Hash256]) {
    put_uvarint(out, hashes.len() as u64);
    for hash in hashes {
        out.extend_from_slice(hash.as_bytes());
    }
}

fn read_hashes(r: &mut Reader<'_>) -> Result<Vec<Hash256>> {
    let count = r.uvarint()? as usize;
    if count > r.remaining() / 32 {
        return Err(TunnelError::Truncated);
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(r.hash()?);
    }
    Ok(out)
}

fn put_inv(out: &mut BytesMut, inv: &[Inv]) {
    put_uvarint(out, inv.len() as u64);
    for item in inv {
        out.extend_from_slice(&item.kind.code().to_le_bytes());
        out.extend_from_slice(item.hash.as_bytes());
    }
}

fn read_inv(r: &mut Reader<'_>) -> Result<Vec<Inv>> {
    let count = r.uvarint()? as usize;
    if count > r.remaining() / 36 {
        return Err(TunnelError::Truncated);
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = InvKind::from_code(r.u32()?).ok_or(TunnelError::Protocol)?;
        out.push(Inv {
            kind,
            hash: r.hash()?,
        });
    }
    Ok(out)
}

// === peer events ===

/// Frame kind carrying a given peer event.
#[must_use]
pub const fn event_kind(event: &PeerEvent) -> FrameKind {
    match event {
        PeerEvent::Active { .. } => FrameKind::Active,
        PeerEvent::Deactive { .. } => FrameKind::Deactive,
        PeerEvent::Subscribe { .. } => FrameKind::Subscribe,
        PeerEvent::Unsubscribe { .. } => FrameKind::Unsubscribe,
        PeerEvent::GetBlocks { .. } => FrameKind::GetBlocks,
        PeerEvent::GetData { .. } => FrameKind::GetData,
        PeerEvent::Inv { .. } => FrameKind::Inv,
        PeerEvent::Tx { .. } => FrameKind::Tx,
        PeerEvent::Block { .. } => FrameKind::Block,
        PeerEvent::NetReward { .. } => FrameKind::Reward,
        PeerEvent::NetClose { .. } => FrameKind::Close,
    }
}

/// Serialize a peer event into a self-contained payload.
#[must_use]
pub fn encode_event(event: &PeerEvent) -> Bytes {
    let mut out = BytesMut::with_capacity(64);
    out.extend_from_slice(&event_kind(event).code().to_le_bytes());
    out.extend_from_slice(&event.nonce().to_le_bytes());

    match event {
        PeerEvent::Active { services, .. } | PeerEvent::Deactive { services, .. } => {
            out.extend_from_slice(&services.to_le_bytes());
        }
        PeerEvent::Subscribe { fork, forks, .. } | PeerEvent::Unsubscribe { fork, forks, .. } => {
            out.extend_from_slice(fork.as_bytes());
            put_hashes(&mut out, forks);
        }
        PeerEvent::GetBlocks { fork, locator, .. } => {
            out.extend_from_slice(fork.as_bytes());
            put_hashes(&mut out, locator);
        }
        PeerEvent::GetData { fork, inv, .. } | PeerEvent::Inv { fork, inv, .. } => {
            out.extend_from_slice(fork.as_bytes());
            put_inv(&mut out, inv);
        }
        PeerEvent::Tx { fork, tx, .. } => {
            out.extend_from_slice(fork.as_bytes());
            out.extend_from_slice(tx.hash.as_bytes());
            put_bytes(&mut out, &tx.payload);
        }
        PeerEvent::Block { fork, block, .. } => {
            out.extend_from_slice(fork.as_bytes());
            out.extend_from_slice(block.hash.as_bytes());
            put_bytes(&mut out, &block.payload);
        }
        PeerEvent::NetReward { kind, score, .. } => {
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(&score.to_le_bytes());
        }
        PeerEvent::NetClose { kind, reason, .. } => {
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(&reason.code().to_le_bytes());
        }
    }

    out.freeze()
}

/// Decode a self-contained peer-event payload.
pub fn decode_event(payload: &[u8]) -> Result<PeerEvent> {
    let mut r = Reader::new(payload);
    let code = r.u16()?;
    let kind = FrameKind::from_code(code).ok_or(TunnelError::UnknownKind(code))?;
    let nonce: Nonce = r.u64()?;

    let event = match kind {
        FrameKind::Active => PeerEvent::Active {
            nonce,
            services: r.u64()?,
        },
        FrameKind::Deactive => PeerEvent::Deactive {
            nonce,
            services: r.u64()?,
        },
        FrameKind::Subscribe => PeerEvent::Subscribe {
            nonce,
            fork: r.hash()?,
            forks: read_hashes(&mut r)?,
        },
        FrameKind::Unsubscribe => PeerEvent::Unsubscribe {
            nonce,
            fork: r.hash()?,
            forks: read_hashes(&mut r)?,
        },
        FrameKind::GetBlocks => PeerEvent::GetBlocks {
            nonce,
            fork: r.hash()?,
            locator: read_hashes(&mut r)?,
        },
        FrameKind::GetData => PeerEvent::GetData {
            nonce,
            fork: r.hash()?,
            inv: read_inv(&mut r)?,
        },
        FrameKind::Inv => PeerEvent::Inv {
            nonce,
            fork: r.hash()?,
            inv: read_inv(&mut r)?,
        },
        FrameKind::Tx => PeerEvent::Tx {
            nonce,
            fork: r.hash()?,
            tx: TxData {
                hash: r.hash()?,
                payload: r.bytes()?,
            },
        },
        FrameKind::Block => PeerEvent::Block {
            nonce,
            fork: r.hash()?,
            block: BlockData {
                hash: r.hash()?,
                payload: r.bytes()?,
            },
        },
        FrameKind::Reward => PeerEvent::NetReward {
            nonce,
            kind: r.u32()?,
            score: r.i32()?,
        },
        FrameKind::Close => PeerEvent::NetClose {
            nonce,
            kind: r.u32()?,
            reason: CloseReason::from_code(r.u32()?).ok_or(TunnelError::Protocol)?,
        },
        _ => return Err(TunnelError::UnknownKind(code)),
    };

    r.finish()?;
    Ok(event)
}

/// Wrap a peer event into its tunnel envelope.
#[must_use]
pub fn envelope_for_event(event: &PeerEvent) -> Envelope {
    Envelope::new(
        event_kind(event),
        event.nonce(),
        event.fork().unwrap_or(Hash256::ZERO),
        encode_event(event),
    )
}

// === topic control records ===

/// `Sub` payload: the topic name. The subscription id rides in the
/// envelope nonce field.
#[must_use]
pub fn encode_topic(topic: &str) -> Bytes {
    let mut out = BytesMut::with_capacity(topic.len() + 2);
    put_string(&mut out, topic);
    out.freeze()
}

pub fn decode_topic(payload: &[u8]) -> Result<String> {
    let mut r = Reader::new(payload);
    let topic = r.string()?;
    r.finish()?;
    Ok(topic)
}

/// `Added` record: an object published to one topic subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedRecord {
    pub topic: String,
    pub fork: ForkId,
    pub object: Bytes,
}

#[must_use]
pub fn encode_added(record: &AddedRecord) -> Bytes {
    let mut out = BytesMut::with_capacity(record.topic.len() + record.object.len() + 40);
    put_string(&mut out, &record.topic);
    out.extend_from_slice(record.fork.as_bytes());
    put_bytes(&mut out, &record.object);
    out.freeze()
}

pub fn decode_added(payload: &[u8]) -> Result<AddedRecord> {
    let mut r = Reader::new(payload);
    let record = AddedRecord {
        topic: r.string()?,
        fork: r.hash()?,
        object: r.bytes()?,
    };
    r.finish()?;
    Ok(record)
}
