//! Storage layer for Wax: the only crate that touches a real file
//! descriptor.
//!
//! - `io`: positional file I/O, advisory locking, fsync.
//! - `codec`: payload compression codecs keyed by `CanonicalEncoding`.
//! - `wal`: the on-disk WAL ring buffer, built on `wax-durability`'s pure
//!   append-planning and replay-scanning logic.
//! - `frames`: the payload region and frame metadata table.

#![allow(missing_docs)]

pub mod codec;
pub mod frames;
pub mod io;
pub mod wal;

pub use codec::{codec_for, DeflateCodec, Lz4Codec, LzfseCodec, PayloadCodec, PlainCodec};
pub use frames::FrameStore;
pub use io::FileHandle;
pub use wal::{WalFsyncPolicy, WalWriter};
