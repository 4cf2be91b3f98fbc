//! Footer: the fixed 60-byte record that pins a generation to a TOC.

use byteorder::{ByteOrder, LittleEndian};
use wax_core::format_constants::FOOTER_SIZE;
use wax_core::format_constants::FOOTER_MAGIC;
use wax_core::{WaxError, WaxResult};

/// `magic(4) | toc_len(8) | toc_hash(32) | generation(8) | wal_committed_seq(8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub toc_len: u64,
    pub toc_hash: [u8; 32],
    pub generation: u64,
    pub wal_committed_seq: u64,
}

impl Footer {
    pub fn encode(&self) -> [u8; FOOTER_SIZE as usize] {
        let mut out = [0u8; FOOTER_SIZE as usize];
        out[0..4].copy_from_slice(&FOOTER_MAGIC);
        LittleEndian::write_u64(&mut out[4..12], self.toc_len);
        out[12..44].copy_from_slice(&self.toc_hash);
        LittleEndian::write_u64(&mut out[44..52], self.generation);
        LittleEndian::write_u64(&mut out[52..60], self.wal_committed_seq);
        out
    }

    /// Decode without validating `toc_len` bounds against a live file; the
    /// footer scanner performs that cross-check once it knows the candidate
    /// offset.
    pub fn decode(bytes: &[u8]) -> WaxResult<Self> {
        if bytes.len() < FOOTER_SIZE as usize {
            return Err(WaxError::invalid_footer("buffer shorter than footer size"));
        }
        if bytes[0..4] != FOOTER_MAGIC {
            return Err(WaxError::invalid_footer("bad magic"));
        }
        let toc_len = LittleEndian::read_u64(&bytes[4..12]);
        let mut toc_hash = [0u8; 32];
        toc_hash.copy_from_slice(&bytes[12..44]);
        let generation = LittleEndian::read_u64(&bytes[44..52]);
        let wal_committed_seq = LittleEndian::read_u64(&bytes[52..60]);
        Ok(Footer {
            toc_len,
            toc_hash,
            generation,
            wal_committed_seq,
        })
    }
}
