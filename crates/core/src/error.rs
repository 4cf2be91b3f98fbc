//! The Wax error taxonomy.
//!
//! `WaxError` is the single error type surfaced across the workspace's
//! crates. Variants carry enough structure for callers to branch on kind
//! without string matching, and constructors keep call sites readable.

use thiserror::Error;

/// Result alias used throughout the Wax workspace.
pub type WaxResult<T> = Result<T, WaxError>;

/// The full error taxonomy.
#[derive(Debug, Error)]
pub enum WaxError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid footer: {reason}")]
    InvalidFooter { reason: String },

    #[error("invalid toc: {reason}")]
    InvalidToc { reason: String },

    #[error("checksum mismatch in {context}")]
    ChecksumMismatch { context: String },

    #[error("decoding error: {reason}")]
    DecodingError { reason: String },

    #[error("encoding error: {reason}")]
    EncodingError { reason: String },

    #[error("wal corruption at offset {offset}: {reason}")]
    WalCorruption { offset: u64, reason: String },

    #[error("lock unavailable: {reason}")]
    LockUnavailable { reason: String },

    #[error("capacity exceeded: limit {limit}, requested {requested}")]
    CapacityExceeded { limit: u64, requested: u64 },

    #[error("frame not found: {frame_id}")]
    FrameNotFound { frame_id: u64 },

    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: u32, got: u32 },

    #[error("vector index must be staged before committing embeddings")]
    VectorIndexNotStaged,

    #[error("unsupported encoding: {encoding}")]
    UnsupportedEncoding { encoding: String },

    #[error("io error: {0}")]
    Io(String),
}

impl WaxError {
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        WaxError::InvalidHeader {
            reason: reason.into(),
        }
    }

    pub fn invalid_footer(reason: impl Into<String>) -> Self {
        WaxError::InvalidFooter {
            reason: reason.into(),
        }
    }

    pub fn invalid_toc(reason: impl Into<String>) -> Self {
        WaxError::InvalidToc {
            reason: reason.into(),
        }
    }

    pub fn checksum_mismatch(context: impl Into<String>) -> Self {
        WaxError::ChecksumMismatch {
            context: context.into(),
        }
    }

    pub fn decoding_error(reason: impl Into<String>) -> Self {
        WaxError::DecodingError {
            reason: reason.into(),
        }
    }

    pub fn encoding_error(reason: impl Into<String>) -> Self {
        WaxError::EncodingError {
            reason: reason.into(),
        }
    }

    pub fn wal_corruption(offset: u64, reason: impl Into<String>) -> Self {
        WaxError::WalCorruption {
            offset,
            reason: reason.into(),
        }
    }

    pub fn lock_unavailable(reason: impl Into<String>) -> Self {
        WaxError::LockUnavailable {
            reason: reason.into(),
        }
    }

    pub fn capacity_exceeded(limit: u64, requested: u64) -> Self {
        WaxError::CapacityExceeded { limit, requested }
    }

    pub fn frame_not_found(frame_id: u64) -> Self {
        WaxError::FrameNotFound { frame_id }
    }

    pub fn io(message: impl Into<String>) -> Self {
        WaxError::Io(message.into())
    }

    pub fn dimension_mismatch(expected: u32, got: u32) -> Self {
        WaxError::DimensionMismatch { expected, got }
    }

    pub fn unsupported_encoding(encoding: impl Into<String>) -> Self {
        WaxError::UnsupportedEncoding {
            encoding: encoding.into(),
        }
    }

    /// True for checksum/structural-validation failures.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WaxError::InvalidHeader { .. }
                | WaxError::InvalidFooter { .. }
                | WaxError::InvalidToc { .. }
                | WaxError::ChecksumMismatch { .. }
                | WaxError::WalCorruption { .. }
        )
    }

    /// True if the caller can plausibly retry after taking corrective action
    /// (e.g. staging the vector index, waiting for the writer lease).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WaxError::VectorIndexNotStaged | WaxError::LockUnavailable { .. }
        )
    }

    pub fn is_capacity_error(&self) -> bool {
        matches!(self, WaxError::CapacityExceeded { .. })
    }
}

impl From<std::io::Error> for WaxError {
    fn from(err: std::io::Error) -> Self {
        WaxError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_classification() {
        assert!(WaxError::invalid_footer("bad magic").is_corruption());
        assert!(WaxError::checksum_mismatch("toc").is_corruption());
        assert!(!WaxError::frame_not_found(5).is_corruption());
    }

    #[test]
    fn recoverable_classification() {
        assert!(WaxError::VectorIndexNotStaged.is_recoverable());
        assert!(WaxError::lock_unavailable("timeout").is_recoverable());
        assert!(!WaxError::capacity_exceeded(10, 20).is_recoverable());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let wax_err: WaxError = io_err.into();
        assert!(matches!(wax_err, WaxError::Io(_)));
    }
}
