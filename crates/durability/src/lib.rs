//! Durability layer for Wax: everything that touches the on-disk format.
//!
//! - `format`: binary codec, stamped-zero checksums, header pages, footer,
//!   table of contents.
//! - `wal`: WAL record framing and ring-buffer append/replay planning.
//! - `scanner`: the bounded reverse footer scan used on open.
//!
//! This crate does not perform file I/O itself (see `wax-storage`); it
//! operates on byte buffers and the small `ByteSource` trait so its format
//! logic can be exercised without a filesystem.

#![allow(missing_docs)]

pub mod format;
pub mod scanner;
pub mod wal;

pub use scanner::{find_latest_footer, ByteSource, ValidatedFooter};
pub use wal::{plan_append, AppendPlan, WalPayload, WalPayloadKind, WalRecord, WalReplay, WalReplayOutcome};
