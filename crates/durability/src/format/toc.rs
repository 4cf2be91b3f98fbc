//! Table of contents: frames, index manifests, and the segment catalog.

use crate::format::checksum::stamped_checksum;
use crate::format::codec::{Decoder, Encoder};
use wax_core::{CanonicalEncoding, FrameId, FrameMeta, FrameRole, FrameStatus, Limits, WaxError, WaxResult};

/// Similarity metric recorded in the vector manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    Cosine,
    Dot,
    L2,
}

impl SimilarityMetric {
    fn as_tag(self) -> u8 {
        match self {
            SimilarityMetric::Cosine => 0,
            SimilarityMetric::Dot => 1,
            SimilarityMetric::L2 => 2,
        }
    }

    fn from_tag(tag: u8) -> WaxResult<Self> {
        match tag {
            0 => Ok(SimilarityMetric::Cosine),
            1 => Ok(SimilarityMetric::Dot),
            2 => Ok(SimilarityMetric::L2),
            other => Err(WaxError::invalid_toc(format!(
                "unknown similarity metric tag {other}"
            ))),
        }
    }
}

/// Pointer to the lex index's serialized bytes, not the index itself.
#[derive(Debug, Clone)]
pub struct LexManifest {
    pub doc_count: u64,
    pub bytes_offset: u64,
    pub bytes_length: u64,
    pub checksum: [u8; 32],
    pub version: u32,
}

/// Pointer to the vector index's serialized bytes, not the index itself.
#[derive(Debug, Clone)]
pub struct VectorManifest {
    pub vector_count: u64,
    pub dimension: u32,
    pub bytes_offset: u64,
    pub bytes_length: u64,
    pub checksum: [u8; 32],
    pub similarity: SimilarityMetric,
}

/// Pointer to the optional time index's serialized bytes.
#[derive(Debug, Clone)]
pub struct TimeIndexManifest {
    pub offset: u64,
    pub length: u64,
    pub entry_count: u64,
    pub checksum: [u8; 32],
}

/// One entry in the sorted, non-overlapping segment catalog.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    pub kind: SegmentKind,
    pub bytes_offset: u64,
    pub bytes_length: u64,
    pub checksum: [u8; 32],
    pub compression: u8,
}

/// Segment kinds. `TimeIndex`/`Custom` slots stay parseable even when unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Lex,
    Vector,
    TimeIndex,
    Custom(u8),
}

impl SegmentKind {
    fn as_tag(self) -> u8 {
        match self {
            SegmentKind::Lex => 0,
            SegmentKind::Vector => 1,
            SegmentKind::TimeIndex => 2,
            SegmentKind::Custom(tag) => tag,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => SegmentKind::Lex,
            1 => SegmentKind::Vector,
            2 => SegmentKind::TimeIndex,
            other => SegmentKind::Custom(other),
        }
    }
}

/// Non-overlapping, `bytes_offset`-sorted check for the segment catalog.
fn validate_segment_catalog(segments: &[SegmentEntry]) -> WaxResult<()> {
    for window in segments.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        if a.bytes_offset > b.bytes_offset {
            return Err(WaxError::invalid_toc("segment catalog not sorted by offset"));
        }
        if a.bytes_offset + a.bytes_length > b.bytes_offset {
            return Err(WaxError::invalid_toc("segment catalog entries overlap"));
        }
    }
    Ok(())
}

/// The table of contents. `toc_version` is currently always 1.
#[derive(Debug, Clone)]
pub struct Toc {
    pub toc_version: u16,
    pub frames: Vec<FrameMeta>,
    pub lex_manifest: Option<LexManifest>,
    pub vector_manifest: Option<VectorManifest>,
    pub time_index_manifest: Option<TimeIndexManifest>,
    pub segments: Vec<SegmentEntry>,
    pub merkle_root: [u8; 32],
}

impl Toc {
    pub fn empty() -> Self {
        Toc {
            toc_version: 1,
            frames: Vec::new(),
            lex_manifest: None,
            vector_manifest: None,
            time_index_manifest: None,
            segments: Vec::new(),
            merkle_root: [0u8; 32],
        }
    }

    /// Dense, zero-based, ascending frame ids.
    pub fn validate_frame_ids_dense(&self) -> WaxResult<()> {
        for (expected, frame) in self.frames.iter().enumerate() {
            if frame.id != expected as FrameId {
                return Err(WaxError::invalid_toc(format!(
                    "frame id gap: expected {expected}, found {}",
                    frame.id
                )));
            }
        }
        Ok(())
    }

    /// Encode the TOC body plus a trailing stamped-zero checksum
    ///. Returns the full byte buffer; the
    /// caller is responsible for writing it at the chosen file offset.
    pub fn encode(&self) -> WaxResult<Vec<u8>> {
        validate_segment_catalog(&self.segments)?;
        self.validate_frame_ids_dense()?;

        let mut enc = Encoder::new();
        enc.put_u16(self.toc_version);
        enc.put_array(&self.frames, |enc, frame| encode_frame_meta(enc, frame))?;

        match &self.lex_manifest {
            None => enc.put_u8(0),
            Some(m) => {
                enc.put_u8(1);
                enc.put_u64(m.doc_count);
                enc.put_u64(m.bytes_offset);
                enc.put_u64(m.bytes_length);
                enc.put_bytes_fixed(&m.checksum);
                enc.put_u32(m.version);
            }
        }

        match &self.vector_manifest {
            None => enc.put_u8(0),
            Some(m) => {
                enc.put_u8(1);
                enc.put_u64(m.vector_count);
                enc.put_u32(m.dimension);
                enc.put_u64(m.bytes_offset);
                enc.put_u64(m.bytes_length);
                enc.put_bytes_fixed(&m.checksum);
                enc.put_u8(m.similarity.as_tag());
            }
        }

        match &self.time_index_manifest {
            None => enc.put_u8(0),
            Some(m) => {
                enc.put_u8(1);
                enc.put_u64(m.offset);
                enc.put_u64(m.length);
                enc.put_u64(m.entry_count);
                enc.put_bytes_fixed(&m.checksum);
            }
        }

        enc.put_array(&self.segments, |enc, seg| {
            enc.put_u8(seg.kind.as_tag());
            enc.put_u64(seg.bytes_offset);
            enc.put_u64(seg.bytes_length);
            enc.put_bytes_fixed(&seg.checksum);
            enc.put_u8(seg.compression);
            Ok(())
        })?;

        enc.put_bytes_fixed(&self.merkle_root);

        let body = enc.into_bytes();
        let checksum = stamped_checksum(&body);
        let mut out = body;
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    /// Decode a TOC and verify its trailing stamped-zero checksum against
    /// `expected_hash` (normally the footer's `toc_hash`).
    pub fn decode(bytes: &[u8], limits: &Limits, expected_hash: &[u8; 32]) -> WaxResult<Self> {
        if bytes.len() < 32 {
            return Err(WaxError::invalid_toc("toc shorter than trailing checksum"));
        }
        let (body, trailing) = bytes.split_at(bytes.len() - 32);
        let computed = stamped_checksum(body);
        if &computed != expected_hash || trailing != expected_hash {
            return Err(WaxError::checksum_mismatch("toc"));
        }

        let mut dec = Decoder::new(body, limits);
        let toc_version = dec.get_u16()?;
        if toc_version != 1 {
            return Err(WaxError::invalid_toc(format!(
                "unsupported toc_version {toc_version}"
            )));
        }
        let frames = dec.get_array(decode_frame_meta)?;

        let lex_manifest = match dec.get_u8()? {
            0 => None,
            1 => Some(LexManifest {
                doc_count: dec.get_u64()?,
                bytes_offset: dec.get_u64()?,
                bytes_length: dec.get_u64()?,
                checksum: {
                    let mut c = [0u8; 32];
                    c.copy_from_slice(dec.get_bytes_fixed(32)?);
                    c
                },
                version: dec.get_u32()?,
            }),
            tag => return Err(WaxError::invalid_toc(format!("bad lex manifest tag {tag}"))),
        };

        let vector_manifest = match dec.get_u8()? {
            0 => None,
            1 => Some(VectorManifest {
                vector_count: dec.get_u64()?,
                dimension: dec.get_u32()?,
                bytes_offset: dec.get_u64()?,
                bytes_length: dec.get_u64()?,
                checksum: {
                    let mut c = [0u8; 32];
                    c.copy_from_slice(dec.get_bytes_fixed(32)?);
                    c
                },
                similarity: SimilarityMetric::from_tag(dec.get_u8()?)?,
            }),
            tag => {
                return Err(WaxError::invalid_toc(format!(
                    "bad vector manifest tag {tag}"
                )))
            }
        };

        let time_index_manifest = match dec.get_u8()? {
            0 => None,
            1 => Some(TimeIndexManifest {
                offset: dec.get_u64()?,
                length: dec.get_u64()?,
                entry_count: dec.get_u64()?,
                checksum: {
                    let mut c = [0u8; 32];
                    c.copy_from_slice(dec.get_bytes_fixed(32)?);
                    c
                },
            }),
            tag => {
                return Err(WaxError::invalid_toc(format!(
                    "bad time index manifest tag {tag}"
                )))
            }
        };

        let segments = dec.get_array(|dec| {
            let kind = SegmentKind::from_tag(dec.get_u8()?);
            let bytes_offset = dec.get_u64()?;
            let bytes_length = dec.get_u64()?;
            let mut checksum = [0u8; 32];
            checksum.copy_from_slice(dec.get_bytes_fixed(32)?);
            let compression = dec.get_u8()?;
            Ok(SegmentEntry {
                kind,
                bytes_offset,
                bytes_length,
                checksum,
                compression,
            })
        })?;
        validate_segment_catalog(&segments)?;

        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(dec.get_bytes_fixed(32)?);

        dec.finish()?;

        let toc = Toc {
            toc_version,
            frames,
            lex_manifest,
            vector_manifest,
            time_index_manifest,
            segments,
            merkle_root,
        };
        toc.validate_frame_ids_dense()?;
        Ok(toc)
    }
}

fn encode_frame_meta(enc: &mut Encoder, frame: &FrameMeta) -> WaxResult<()> {
    enc.put_u64(frame.id);
    enc.put_i64(frame.timestamp_ms);
    enc.put_u8(frame.role.as_tag());
    enc.put_optional_u64(frame.parent_id);
    enc.put_optional_u32(frame.chunk_index);
    enc.put_optional_u32(frame.chunk_count);
    enc.put_u64(frame.payload_offset);
    enc.put_u64(frame.payload_length);
    enc.put_u8(frame.canonical_encoding.as_tag());
    enc.put_optional_u64(frame.canonical_length);
    enc.put_bytes_fixed(&frame.canonical_checksum);
    enc.put_optional_fixed32(frame.stored_checksum.as_ref());
    enc.put_u8(frame.status.as_tag());
    enc.put_optional_u64(frame.supersedes);
    enc.put_optional_u64(frame.superseded_by);
    enc.put_optional_string(frame.uri.as_deref())?;
    enc.put_optional_string(frame.title.as_deref())?;
    enc.put_optional_string(frame.search_text.as_deref())?;
    enc.put_array(&frame.metadata, |enc, (k, v)| {
        enc.put_string(k)?;
        enc.put_string(v)
    })?;
    enc.put_array(&frame.tags, |enc, (k, v)| {
        enc.put_string(k)?;
        enc.put_string(v)
    })?;
    enc.put_array(&frame.labels, |enc, l| enc.put_string(l))?;
    enc.put_optional_string(frame.content_date.as_deref())?;
    Ok(())
}

fn decode_frame_meta(dec: &mut Decoder) -> WaxResult<FrameMeta> {
    let id = dec.get_u64()?;
    let timestamp_ms = dec.get_i64()?;
    let role = FrameRole::from_tag(dec.get_u8()?)
        .ok_or_else(|| WaxError::invalid_toc("bad frame role tag"))?;
    let parent_id = dec.get_optional_u64()?;
    let chunk_index = dec.get_optional_u32()?;
    let chunk_count = dec.get_optional_u32()?;
    let payload_offset = dec.get_u64()?;
    let payload_length = dec.get_u64()?;
    let canonical_encoding = CanonicalEncoding::from_tag(dec.get_u8()?)
        .ok_or_else(|| WaxError::invalid_toc("bad canonical encoding tag"))?;
    let canonical_length = dec.get_optional_u64()?;
    let mut canonical_checksum = [0u8; 32];
    canonical_checksum.copy_from_slice(dec.get_bytes_fixed(32)?);
    let stored_checksum = dec.get_optional_fixed32()?;
    let status = FrameStatus::from_tag(dec.get_u8()?)
        .ok_or_else(|| WaxError::invalid_toc("bad frame status tag"))?;
    let supersedes = dec.get_optional_u64()?;
    let superseded_by = dec.get_optional_u64()?;
    let uri = dec.get_optional_string()?;
    let title = dec.get_optional_string()?;
    let search_text = dec.get_optional_string()?;
    let metadata = dec.get_array(|dec| Ok((dec.get_string()?, dec.get_string()?)))?;
    let tags = dec.get_array(|dec| Ok((dec.get_string()?, dec.get_string()?)))?;
    let labels = dec.get_array(|dec| dec.get_string())?;
    let content_date = dec.get_optional_string()?;

    let frame = FrameMeta {
        id,
        timestamp_ms,
        role,
        parent_id,
        chunk_index,
        chunk_count,
        payload_offset,
        payload_length,
        canonical_encoding,
        canonical_length,
        canonical_checksum,
        stored_checksum,
        status,
        supersedes,
        superseded_by,
        uri,
        title,
        search_text,
        metadata,
        tags,
        labels,
        content_date,
    };
    if !frame.encoding_invariant_holds() || !frame.checksum_invariant_holds() {
        return Err(WaxError::invalid_toc(format!(
            "frame {id} violates encoding/checksum invariants"
        )));
    }
    Ok(frame)
}
