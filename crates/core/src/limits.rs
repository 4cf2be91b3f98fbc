//! Size limits enforced by the binary codec, WAL, and frame store.
//!
//! After stabilization these defaults are frozen; callers that need different
//! bounds construct their own `Limits` and pass it through `WaxOptions`.

use thiserror::Error;

/// Configurable size and capacity limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum length of a length-prefixed string, in bytes.
    pub max_string_bytes: u64,
    /// Maximum length of a length-prefixed byte blob.
    pub max_blob_bytes: u64,
    /// Maximum element count for a length-prefixed array.
    pub max_array_count: u64,
    /// Maximum size of a serialized TOC.
    pub max_toc_bytes: u64,
    /// Maximum window scanned backwards from EOF while looking for a footer.
    pub max_footer_scan_bytes: u64,
    /// Maximum vector dimensionality accepted by the vector index.
    pub max_embedding_dimensions: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_string_bytes: 16 * 1024 * 1024,
            max_blob_bytes: 64 * 1024 * 1024,
            max_array_count: 1_000_000,
            max_toc_bytes: 256 * 1024 * 1024,
            max_footer_scan_bytes: 16 * 1024 * 1024,
            max_embedding_dimensions: 8192,
        }
    }
}

impl Limits {
    /// Small limits, useful for exercising boundary behavior in tests.
    pub fn with_small_limits() -> Self {
        Limits {
            max_string_bytes: 256,
            max_blob_bytes: 4096,
            max_array_count: 64,
            max_toc_bytes: 64 * 1024,
            max_footer_scan_bytes: 64 * 1024,
            max_embedding_dimensions: 16,
        }
    }

    /// Check a requested string length, returning `LimitError` on violation.
    pub fn check_string_bytes(&self, len: u64) -> Result<(), LimitError> {
        if len > self.max_string_bytes {
            Err(LimitError::StringTooLong {
                limit: self.max_string_bytes,
                requested: len,
            })
        } else {
            Ok(())
        }
    }

    /// Check a requested blob length, returning `LimitError` on violation.
    pub fn check_blob_bytes(&self, len: u64) -> Result<(), LimitError> {
        if len > self.max_blob_bytes {
            Err(LimitError::BlobTooLong {
                limit: self.max_blob_bytes,
                requested: len,
            })
        } else {
            Ok(())
        }
    }

    /// Check a requested array element count, returning `LimitError` on violation.
    pub fn check_array_count(&self, count: u64) -> Result<(), LimitError> {
        if count > self.max_array_count {
            Err(LimitError::ArrayTooLong {
                limit: self.max_array_count,
                requested: count,
            })
        } else {
            Ok(())
        }
    }
}

/// Fixed, non-configurable constants tied to the on-disk format itself.
pub mod format_constants {
    /// Size of a single header page.
    pub const HEADER_PAGE_SIZE: u64 = 4096;
    /// Combined size of the two header pages (A and B).
    pub const HEADER_REGION_SIZE: u64 = HEADER_PAGE_SIZE * 2;
    /// Fixed footer size: magic(4) | toc_len(8) | toc_hash(32) | generation(8) | wal_committed_seq(8).
    pub const FOOTER_SIZE: u64 = 60;
    /// Fixed size of a WAL record's frame header (excluding the variable payload).
    pub const WAL_RECORD_HEADER_SIZE: u64 = 4 + 8 + 4 + 1; // magic + seq + length + payload_type
    /// Trailing CRC32 size appended to every WAL record.
    pub const WAL_RECORD_CRC_SIZE: u64 = 4;
    /// `spec_major`/`spec_minor` of the format this crate implements.
    pub const SPEC_MAJOR: u8 = 1;
    pub const SPEC_MINOR: u8 = 0;
    /// Current on-disk format version.
    pub const FORMAT_VERSION: u16 = 1;
    /// Header page magic bytes.
    pub const HEADER_MAGIC: [u8; 4] = *b"WAXH";
    /// Footer magic bytes.
    pub const FOOTER_MAGIC: [u8; 4] = *b"WAXF";
    /// Vector segment magic.
    pub const VECTOR_SEGMENT_MAGIC: [u8; 4] = *b"MV2V";
    /// WAL record frame magic.
    pub const WAL_RECORD_MAGIC: [u8; 4] = *b"WLRC";
}

/// Errors produced when a value would violate a configured `Limits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("string of {requested} bytes exceeds limit of {limit} bytes")]
    StringTooLong { limit: u64, requested: u64 },
    #[error("blob of {requested} bytes exceeds limit of {limit} bytes")]
    BlobTooLong { limit: u64, requested: u64 },
    #[error("array of {requested} elements exceeds limit of {limit} elements")]
    ArrayTooLong { limit: u64, requested: u64 },
}
