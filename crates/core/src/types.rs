//! The Wax data model: frames, their metadata, and the small enums that
//! describe how a frame's content is stored and related to other frames.

use serde::{Deserialize, Serialize};

/// A frame identifier. Dense, zero-based, and monotonically increasing
/// within a single Wax file.
pub type FrameId = u64;

/// What role a frame plays in the document/chunk hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRole {
    Document,
    Chunk,
    Blob,
    System,
}

impl FrameRole {
    pub fn as_tag(self) -> u8 {
        match self {
            FrameRole::Document => 0,
            FrameRole::Chunk => 1,
            FrameRole::Blob => 2,
            FrameRole::System => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FrameRole::Document),
            1 => Some(FrameRole::Chunk),
            2 => Some(FrameRole::Blob),
            3 => Some(FrameRole::System),
            _ => None,
        }
    }
}

/// Lifecycle status of a frame's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    Active,
    Deleted,
}

impl FrameStatus {
    pub fn as_tag(self) -> u8 {
        match self {
            FrameStatus::Active => 0,
            FrameStatus::Deleted => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FrameStatus::Active),
            1 => Some(FrameStatus::Deleted),
            _ => None,
        }
    }
}

/// How a frame's canonical content is encoded on disk.
///
/// `Lzfse` is recognized as a catalog tag but this workspace
/// does not ship an LZFSE codec implementation; see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalEncoding {
    Plain,
    Lzfse,
    Lz4,
    Deflate,
}

impl CanonicalEncoding {
    pub fn as_tag(self) -> u8 {
        match self {
            CanonicalEncoding::Plain => 0,
            CanonicalEncoding::Lzfse => 1,
            CanonicalEncoding::Lz4 => 2,
            CanonicalEncoding::Deflate => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CanonicalEncoding::Plain),
            1 => Some(CanonicalEncoding::Lzfse),
            2 => Some(CanonicalEncoding::Lz4),
            3 => Some(CanonicalEncoding::Deflate),
            _ => None,
        }
    }

    pub fn is_plain(self) -> bool {
        matches!(self, CanonicalEncoding::Plain)
    }
}

/// Similarity metric a vector index is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMetric {
    Cosine,
    Dot,
    L2,
}

impl SimilarityMetric {
    pub fn as_tag(self) -> u8 {
        match self {
            SimilarityMetric::Cosine => 0,
            SimilarityMetric::Dot => 1,
            SimilarityMetric::L2 => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SimilarityMetric::Cosine),
            1 => Some(SimilarityMetric::Dot),
            2 => Some(SimilarityMetric::L2),
            _ => None,
        }
    }
}

/// Vector segment encoding tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorEncoding {
    /// Native CPU layout; segment carries a trailing frame-id table.
    Native,
    /// Dense, GPU-friendly contiguous layout.
    DenseGpu,
}

impl VectorEncoding {
    pub fn as_tag(self) -> u8 {
        match self {
            VectorEncoding::Native => 0,
            VectorEncoding::DenseGpu => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(VectorEncoding::Native),
            1 => Some(VectorEncoding::DenseGpu),
            _ => None,
        }
    }
}

/// A key/value tag pair attached to a frame.
pub type TagPair = (String, String);

/// Metadata describing one frame. Payload bytes themselves live in the
/// payload region; `FrameMeta` is what the TOC stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub id: FrameId,
    pub timestamp_ms: i64,
    pub role: FrameRole,
    pub parent_id: Option<FrameId>,
    pub chunk_index: Option<u32>,
    pub chunk_count: Option<u32>,
    pub payload_offset: u64,
    pub payload_length: u64,
    pub canonical_encoding: CanonicalEncoding,
    pub canonical_length: Option<u64>,
    pub canonical_checksum: [u8; 32],
    pub stored_checksum: Option<[u8; 32]>,
    pub status: FrameStatus,
    pub supersedes: Option<FrameId>,
    pub superseded_by: Option<FrameId>,
    pub uri: Option<String>,
    pub title: Option<String>,
    pub search_text: Option<String>,
    pub metadata: Vec<(String, String)>,
    pub tags: Vec<TagPair>,
    pub labels: Vec<String>,
    pub content_date: Option<String>,
}

impl FrameMeta {
    /// Invariant: plain encoding carries no `canonical_length`
    /// and the canonical bytes equal the on-disk bytes.
    pub fn encoding_invariant_holds(&self) -> bool {
        if self.canonical_encoding.is_plain() {
            self.canonical_length.is_none()
        } else {
            self.canonical_length.is_some()
        }
    }

    /// Invariant: an empty payload carries no stored checksum.
    pub fn checksum_invariant_holds(&self) -> bool {
        if self.payload_length == 0 {
            self.stored_checksum.is_none()
        } else {
            true
        }
    }

    /// Text used for search indexing: `search_text` if present, else `title`.
    pub fn index_text(&self) -> Option<&str> {
        self.search_text.as_deref().or(self.title.as_deref())
    }
}

/// Options accepted by `FrameStore::put`.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub role: Option<FrameRole>,
    pub parent_id: Option<FrameId>,
    pub chunk_index: Option<u32>,
    pub chunk_count: Option<u32>,
    pub canonical_encoding: Option<CanonicalEncoding>,
    pub uri: Option<String>,
    pub title: Option<String>,
    pub search_text: Option<String>,
    pub metadata: Vec<(String, String)>,
    pub tags: Vec<TagPair>,
    pub labels: Vec<String>,
    pub content_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tag_round_trip() {
        for role in [
            FrameRole::Document,
            FrameRole::Chunk,
            FrameRole::Blob,
            FrameRole::System,
        ] {
            assert_eq!(FrameRole::from_tag(role.as_tag()), Some(role));
        }
    }

    #[test]
    fn encoding_tag_round_trip() {
        for enc in [
            CanonicalEncoding::Plain,
            CanonicalEncoding::Lzfse,
            CanonicalEncoding::Lz4,
            CanonicalEncoding::Deflate,
        ] {
            assert_eq!(CanonicalEncoding::from_tag(enc.as_tag()), Some(enc));
        }
    }

    #[test]
    fn similarity_metric_tag_round_trip() {
        for metric in [SimilarityMetric::Cosine, SimilarityMetric::Dot, SimilarityMetric::L2] {
            assert_eq!(SimilarityMetric::from_tag(metric.as_tag()), Some(metric));
        }
    }

    #[test]
    fn vector_encoding_tag_round_trip() {
        for enc in [VectorEncoding::Native, VectorEncoding::DenseGpu] {
            assert_eq!(VectorEncoding::from_tag(enc.as_tag()), Some(enc));
        }
    }

    #[test]
    fn plain_encoding_invariant() {
        let mut meta = sample_meta();
        meta.canonical_encoding = CanonicalEncoding::Plain;
        meta.canonical_length = None;
        assert!(meta.encoding_invariant_holds());
        meta.canonical_length = Some(10);
        assert!(!meta.encoding_invariant_holds());
    }

    fn sample_meta() -> FrameMeta {
        FrameMeta {
            id: 0,
            timestamp_ms: 0,
            role: FrameRole::Document,
            parent_id: None,
            chunk_index: None,
            chunk_count: None,
            payload_offset: 0,
            payload_length: 0,
            canonical_encoding: CanonicalEncoding::Plain,
            canonical_length: None,
            canonical_checksum: [0u8; 32],
            stored_checksum: None,
            status: FrameStatus::Active,
            supersedes: None,
            superseded_by: None,
            uri: None,
            title: None,
            search_text: None,
            metadata: Vec::new(),
            tags: Vec::new(),
            labels: Vec::new(),
            content_date: None,
        }
    }
}
