//! WAL record framing: `magic | seq(u64) | length(u32) | payload_type(u8) |
//! payload | crc(u32)`.
//!
//! The envelope is hand-framed; the inner payload is a `bincode`-encoded
//! `WalPayload`, a concrete, documented choice for the WAL record schema
//! (see DESIGN.md).

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use wax_core::format_constants::WAL_RECORD_MAGIC;
use wax_core::{CanonicalEncoding, FrameId, WaxError, WaxResult};

/// Tag identifying which `WalPayload` variant a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalPayloadKind {
    FrameWrite = 0,
    EmbeddingPut = 1,
    DeleteOrSupersede = 2,
    LexMutation = 3,
    VectorMutation = 4,
    CommitMarker = 5,
}

impl WalPayloadKind {
    fn from_tag(tag: u8) -> WaxResult<Self> {
        match tag {
            0 => Ok(WalPayloadKind::FrameWrite),
            1 => Ok(WalPayloadKind::EmbeddingPut),
            2 => Ok(WalPayloadKind::DeleteOrSupersede),
            3 => Ok(WalPayloadKind::LexMutation),
            4 => Ok(WalPayloadKind::VectorMutation),
            5 => Ok(WalPayloadKind::CommitMarker),
            other => Err(WaxError::wal_corruption(0, format!("unknown payload_type {other}"))),
        }
    }
}

/// The logical content of a WAL record, before framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalPayload {
    FrameWrite {
        frame_id: FrameId,
        payload_offset: u64,
        payload_length: u64,
        canonical_encoding: CanonicalEncoding,
    },
    EmbeddingPut {
        frame_id: FrameId,
        vector: Vec<f32>,
    },
    DeleteOrSupersede {
        frame_id: FrameId,
        superseded_by: Option<FrameId>,
    },
    LexMutation {
        frame_id: FrameId,
        text: String,
        remove: bool,
    },
    VectorMutation {
        frame_id: FrameId,
        remove: bool,
    },
    CommitMarker {
        generation: u64,
        toc_offset: u64,
        toc_len: u64,
        toc_hash: [u8; 32],
    },
}

impl WalPayload {
    fn kind(&self) -> WalPayloadKind {
        match self {
            WalPayload::FrameWrite { .. } => WalPayloadKind::FrameWrite,
            WalPayload::EmbeddingPut { .. } => WalPayloadKind::EmbeddingPut,
            WalPayload::DeleteOrSupersede { .. } => WalPayloadKind::DeleteOrSupersede,
            WalPayload::LexMutation { .. } => WalPayloadKind::LexMutation,
            WalPayload::VectorMutation { .. } => WalPayloadKind::VectorMutation,
            WalPayload::CommitMarker { .. } => WalPayloadKind::CommitMarker,
        }
    }
}

/// A framed WAL record ready to append to the ring.
#[derive(Debug, Clone)]
pub struct WalRecord {
    pub seq: u64,
    pub payload: WalPayload,
}

impl WalRecord {
    /// Encode the full framed record, including trailing CRC32 over
    /// everything that precedes it (magic through payload).
    pub fn encode(&self) -> WaxResult<Vec<u8>> {
        let payload_bytes = bincode::serialize(&self.payload)
            .map_err(|e| WaxError::encoding_error(format!("wal payload encode: {e}")))?;
        let length: u32 = payload_bytes
            .len()
            .try_into()
            .map_err(|_| WaxError::encoding_error("wal payload too large"))?;

        let mut out = Vec::with_capacity(17 + payload_bytes.len() + 4);
        out.extend_from_slice(&WAL_RECORD_MAGIC);
        let mut seq_buf = [0u8; 8];
        LittleEndian::write_u64(&mut seq_buf, self.seq);
        out.extend_from_slice(&seq_buf);
        let mut len_buf = [0u8; 4];
        LittleEndian::write_u32(&mut len_buf, length);
        out.extend_from_slice(&len_buf);
        out.push(self.payload.kind() as u8);
        out.extend_from_slice(&payload_bytes);

        let crc = crc32fast::hash(&out);
        let mut crc_buf = [0u8; 4];
        LittleEndian::write_u32(&mut crc_buf, crc);
        out.extend_from_slice(&crc_buf);
        Ok(out)
    }

    /// Decode one record from the start of `bytes`. Returns the record and
    /// the number of bytes consumed, or a `wal_corruption` error at `offset`
    /// (the caller's responsibility to map into an absolute file offset) if
    /// the header, CRC, or payload are inconsistent — including when `bytes`
    /// is simply too short (a torn trailing record).
    pub fn decode(bytes: &[u8], offset: u64) -> WaxResult<(Self, usize)> {
        if bytes.len() < 17 {
            return Err(WaxError::wal_corruption(offset, "record header truncated"));
        }
        if bytes[0..4] != WAL_RECORD_MAGIC {
            return Err(WaxError::wal_corruption(offset, "bad record magic"));
        }
        let seq = LittleEndian::read_u64(&bytes[4..12]);
        let length = LittleEndian::read_u32(&bytes[12..16]) as usize;
        let payload_type = bytes[16];
        let total = 17 + length + 4;
        if bytes.len() < total {
            return Err(WaxError::wal_corruption(offset, "record payload truncated"));
        }
        let payload_bytes = &bytes[17..17 + length];
        let stored_crc = LittleEndian::read_u32(&bytes[17 + length..total]);
        let computed_crc = crc32fast::hash(&bytes[0..17 + length]);
        if stored_crc != computed_crc {
            return Err(WaxError::wal_corruption(offset, "crc mismatch"));
        }

        let kind = WalPayloadKind::from_tag(payload_type)?;
        let payload: WalPayload = bincode::deserialize(payload_bytes)
            .map_err(|e| WaxError::wal_corruption(offset, format!("payload decode: {e}")))?;
        if payload.kind() != kind {
            return Err(WaxError::wal_corruption(
                offset,
                "payload_type tag does not match decoded payload",
            ));
        }

        Ok((WalRecord { seq, payload }, total))
    }
}
