//! On-disk byte formats: binary codec, checksums, header pages, footer, and
//! the table of contents.
//!
//! Keeping serialization separate from operational logic (the WAL ring and
//! the footer scanner, in the sibling `wal`/`scanner` modules) makes format
//! evolution easier to reason about.

pub mod checksum;
pub mod codec;
pub mod footer;
pub mod header;
pub mod toc;

pub use checksum::{sha256, stamped_checksum, verify_stamped};
pub use codec::{Decoder, Encoder};
pub use footer::Footer;
pub use header::{select_header, HeaderPage, HeaderSlot};
pub use toc::{
    LexManifest, SegmentEntry, SegmentKind, SimilarityMetric, TimeIndexManifest, Toc,
    VectorManifest,
};
