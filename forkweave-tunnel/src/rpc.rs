//! RPC wire records.
//!
//! Administrative RPC commands fan out across the cluster inside
//! `RpcRequest` / `RpcResponse` frames. A response carries the original
//! request bytes next to the partial result, so any node on the return
//! path can re-associate the reply with its pending entry without extra
//! state.

use bytes::{Bytes, BytesMut};

use forkweave_core::envelope::{Envelope, FrameKind};
use forkweave_core::event::Nonce;
use forkweave_core::hash::{ForkId, Hash256};

use crate::codec::{Result, TunnelError};
use crate::wire::{put_bytes, put_string, put_uvarint, Reader};

/// One fork as reported by `LIST_FORK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkProfile {
    pub fork: ForkId,
    pub name: String,
    pub symbol: String,
    pub isolated: bool,
}

/// An administrative command, keyed by its rpc nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    Stop { nonce: Nonce },
    GetForkCount { nonce: Nonce },
    ListFork { nonce: Nonce, all: bool },
    GetBlockLocation { nonce: Nonce, block: Hash256 },
}

impl RpcRequest {
    #[must_use]
    pub const fn nonce(&self) -> Nonce {
        match self {
            Self::Stop { nonce }
            | Self::GetForkCount { nonce }
            | Self::ListFork { nonce, .. }
            | Self::GetBlockLocation { nonce, .. } => *nonce,
        }
    }

    const fn tag(&self) -> u16 {
        match self {
            Self::Stop { .. } => 1,
            Self::GetForkCount { .. } => 2,
            Self::ListFork { .. } => 3,
            Self::GetBlockLocation { .. } => 4,
        }
    }
}

/// A per-node contribution to an RPC result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcResult {
    Stop,
    ForkCount { count: u64 },
    ListFork { forks: Vec<ForkProfile> },
    BlockLocation { fork: Option<ForkId>, height: u32 },
}

impl RpcResult {
    const fn tag(&self) -> u16 {
        match self {
            Self::Stop => 1,
            Self::ForkCount { .. } => 2,
            Self::ListFork { .. } => 3,
            Self::BlockLocation { .. } => 4,
        }
    }
}

/// A reply travelling back towards the RPC origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub request: RpcRequest,
    pub result: RpcResult,
}

#[must_use]
pub fn encode_request(request: &RpcRequest) -> Bytes {
    let mut out = BytesMut::with_capacity(48);
    out.extend_from_slice(&request.tag().to_le_bytes());
    out.extend_from_slice(&request.nonce().to_le_bytes());
    match request {
        RpcRequest::Stop { .. } | RpcRequest::GetForkCount { .. } => {}
        RpcRequest::ListFork { all, .. } => out.extend_from_slice(&[u8::from(*all)]),
        RpcRequest::GetBlockLocation { block, .. } => out.extend_from_slice(block.as_bytes()),
    }
    out.freeze()
}

pub fn decode_request(payload: &[u8]) -> Result<RpcRequest> {
    let mut r = Reader::new(payload);
    let request = decode_request_from(&mut r)?;
    r.finish()?;
    Ok(request)
}

fn decode_request_from(r: &mut Reader<'_>) -> Result<RpcRequest> {
    let tag = r.u16()?;
    let nonce = r.u64()?;
    Ok(match tag {
        1 => RpcRequest::Stop { nonce },
        2 => RpcRequest::GetForkCount { nonce },
        3 => RpcRequest::ListFork {
            nonce,
            all: r.u8()? != 0,
        },
        4 => RpcRequest::GetBlockLocation {
            nonce,
            block: r.hash()?,
        },
        other => return Err(TunnelError::UnknownKind(other)),
    })
}

fn put_profile(out: &mut BytesMut, profile: &ForkProfile) {
    out.extend_from_slice(profile.fork.as_bytes());
    put_string(out, &profile.name);
    put_string(out, &profile.symbol);
    out.extend_from_slice(&[u8::from(profile.isolated)]);
}

fn read_profile(r: &mut Reader<'_>) -> Result<ForkProfile> {
    Ok(ForkProfile {
        fork: r.hash()?,
        name: r.string()?,
        symbol: r.string()?,
        isolated: r.u8()? != 0,
    })
}

#[must_use]
pub fn encode_result(result: &RpcResult) -> Bytes {
    let mut out = BytesMut::with_capacity(48);
    out.extend_from_slice(&result.tag().to_le_bytes());
    match result {
        RpcResult::Stop => {}
        RpcResult::ForkCount { count } => out.extend_from_slice(&count.to_le_bytes()),
        RpcResult::ListFork { forks } => {
            put_uvarint(&mut out, forks.len() as u64);
            for profile in forks {
                put_profile(&mut out, profile);
            }
        }
        RpcResult::BlockLocation { fork, height } => {
            out.extend_from_slice(fork.unwrap_or(Hash256::ZERO).as_bytes());
            out.extend_from_slice(&height.to_le_bytes());
        }
    }
    out.freeze()
}

pub fn decode_result(payload: &[u8]) -> Result<RpcResult> {
    let mut r = Reader::new(payload);
    let result = decode_result_from(&mut r)?;
    r.finish()?;
    Ok(result)
}

fn decode_result_from(r: &mut Reader<'_>) -> Result<RpcResult> {
    let tag = r.u16()?;
    Ok(match tag {
        1 => RpcResult::Stop,
        2 => RpcResult::ForkCount { count: r.u64()? },
        3 => {
            let count = r.uvarint()? as usize;
            if count > r.remaining() / 33 {
                return Err(TunnelError::Truncated);
            }
            let mut forks = Vec::with_capacity(count);
            for _ in 0..count {
                forks.push(read_profile(r)?);
            }
            RpcResult::ListFork { forks }
        }
        4 => {
            let fork = r.hash()?;
            RpcResult::BlockLocation {
                fork: if fork.is_zero() { None } else { Some(fork) },
                height: r.u32()?,
            }
        }
        other => return Err(TunnelError::UnknownKind(other)),
    })
}

/// Request envelope: the rpc nonce rides in the frame header so relays
/// can key their pending tables without decoding the payload.
#[must_use]
pub fn request_envelope(request: &RpcRequest) -> Envelope {
    Envelope::new(
        FrameKind::RpcRequest,
        request.nonce(),
        Hash256::ZERO,
        encode_request(request),
    )
}

#[must_use]
pub fn response_envelope(response: &RpcResponse) -> Envelope {
    let mut payload = BytesMut::with_capacity(96);
    put_bytes(&mut payload, &encode_request(&response.request));
    put_bytes(&mut payload, &encode_result(&response.result));
    Envelope::new(
        FrameKind::RpcResponse,
        response.request.nonce(),
        Hash256::ZERO,
        payload.freeze(),
    )
}

pub fn decode_response(payload: &[u8]) -> Result<RpcResponse> {
    let mut r = Reader::new(payload);
    let raw_request = r.bytes()?;
    let raw_result = r.bytes()?;
    r.finish()?;
    Ok(RpcResponse {
        request: decode_request(&raw_request)?,
        result: decode_result(&raw_result)?,
    })
}
