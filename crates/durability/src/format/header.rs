//! Header page A/B: the atomicity substrate of commit.

use byteorder::{ByteOrder, LittleEndian};
use wax_core::format_constants::{
    FORMAT_VERSION, HEADER_MAGIC, HEADER_PAGE_SIZE, HEADER_REGION_SIZE, SPEC_MAJOR, SPEC_MINOR,
};
use wax_core::{WaxError, WaxResult};

use crate::format::checksum::{stamped_checksum, verify_stamped};

/// Everything preceding `header_checksum` is the "body" hashed by the
/// stamped-zero convention; the checksum itself starts at byte 104.
const CHECKSUM_OFFSET: usize = 104;

/// One header page's logical contents (either page A at offset 0 or page B
/// at offset 4096).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPage {
    pub format_version: u16,
    pub spec_major: u8,
    pub spec_minor: u8,
    pub header_page_generation: u64,
    pub file_generation: u64,
    pub footer_offset: u64,
    pub wal_offset: u64,
    pub wal_size: u64,
    pub wal_write_pos: u64,
    pub wal_checkpoint_pos: u64,
    pub wal_committed_seq: u64,
    pub toc_checksum: [u8; 32],
}

impl HeaderPage {
    /// Encode into a full 4096-byte page, zero-padded after the checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut page = vec![0u8; HEADER_PAGE_SIZE as usize];
        page[0..4].copy_from_slice(&HEADER_MAGIC);
        LittleEndian::write_u16(&mut page[4..6], self.format_version);
        page[6] = self.spec_major;
        page[7] = self.spec_minor;
        LittleEndian::write_u64(&mut page[8..16], self.header_page_generation);
        LittleEndian::write_u64(&mut page[16..24], self.file_generation);
        LittleEndian::write_u64(&mut page[24..32], self.footer_offset);
        LittleEndian::write_u64(&mut page[32..40], self.wal_offset);
        LittleEndian::write_u64(&mut page[40..48], self.wal_size);
        LittleEndian::write_u64(&mut page[48..56], self.wal_write_pos);
        LittleEndian::write_u64(&mut page[56..64], self.wal_checkpoint_pos);
        LittleEndian::write_u64(&mut page[64..72], self.wal_committed_seq);
        page[72..104].copy_from_slice(&self.toc_checksum);
        let checksum = stamped_checksum(&page[0..CHECKSUM_OFFSET]);
        page[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 32].copy_from_slice(&checksum);
        page
    }

    /// Decode a page's fixed-layout fields without validating cross-field
    /// consistency (see `validate`).
    pub fn decode(page: &[u8]) -> WaxResult<Self> {
        if page.len() < HEADER_PAGE_SIZE as usize {
            return Err(WaxError::invalid_header("page shorter than 4096 bytes"));
        }
        if page[0..4] != HEADER_MAGIC {
            return Err(WaxError::invalid_header("bad magic"));
        }
        let checksum_region = &page[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 32];
        let mut stored_checksum = [0u8; 32];
        stored_checksum.copy_from_slice(checksum_region);
        if !verify_stamped(&page[0..CHECKSUM_OFFSET], &stored_checksum) {
            return Err(WaxError::checksum_mismatch("header page"));
        }

        let header = HeaderPage {
            format_version: LittleEndian::read_u16(&page[4..6]),
            spec_major: page[6],
            spec_minor: page[7],
            header_page_generation: LittleEndian::read_u64(&page[8..16]),
            file_generation: LittleEndian::read_u64(&page[16..24]),
            footer_offset: LittleEndian::read_u64(&page[24..32]),
            wal_offset: LittleEndian::read_u64(&page[32..40]),
            wal_size: LittleEndian::read_u64(&page[40..48]),
            wal_write_pos: LittleEndian::read_u64(&page[48..56]),
            wal_checkpoint_pos: LittleEndian::read_u64(&page[56..64]),
            wal_committed_seq: LittleEndian::read_u64(&page[64..72]),
            toc_checksum: {
                let mut c = [0u8; 32];
                c.copy_from_slice(&page[72..104]);
                c
            },
        };
        header.validate()?;
        Ok(header)
    }

    /// Structural validity rules (beyond the checksum,
    /// already checked in `decode`).
    pub fn validate(&self) -> WaxResult<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(WaxError::invalid_header(format!(
                "unsupported format_version {}",
                self.format_version
            )));
        }
        if self.spec_major != SPEC_MAJOR || self.spec_minor != SPEC_MINOR {
            return Err(WaxError::invalid_header(
                "spec major/minor does not match format_version",
            ));
        }
        if self.wal_offset < HEADER_REGION_SIZE {
            return Err(WaxError::invalid_header("wal_offset before header region"));
        }
        if self.wal_write_pos > self.wal_size {
            return Err(WaxError::invalid_header("wal_write_pos beyond wal_size"));
        }
        if self.wal_checkpoint_pos > self.wal_size {
            return Err(WaxError::invalid_header(
                "wal_checkpoint_pos beyond wal_size",
            ));
        }
        if self.footer_offset < self.wal_offset + self.wal_size {
            return Err(WaxError::invalid_header(
                "footer_offset overlaps the wal region",
            ));
        }
        Ok(())
    }
}

/// Which of the two header pages (A at offset 0, B at offset 4096) is
/// currently selected, per the swap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSlot {
    A,
    B,
}

impl HeaderSlot {
    pub fn offset(self) -> u64 {
        match self {
            HeaderSlot::A => 0,
            HeaderSlot::B => HEADER_PAGE_SIZE,
        }
    }

    pub fn other(self) -> HeaderSlot {
        match self {
            HeaderSlot::A => HeaderSlot::B,
            HeaderSlot::B => HeaderSlot::A,
        }
    }
}

/// Select the winning header page from two raw 4096-byte page buffers.
/// Both valid: higher `header_page_generation` wins, ties favor A. Exactly
/// one valid: that one. Neither: error (caller may enter repair mode).
pub fn select_header(page_a: &[u8], page_b: &[u8]) -> WaxResult<(HeaderSlot, HeaderPage)> {
    let a = HeaderPage::decode(page_a);
    let b = HeaderPage::decode(page_b);
    match (a, b) {
        (Ok(a), Ok(b)) => {
            if b.header_page_generation > a.header_page_generation {
                Ok((HeaderSlot::B, b))
            } else {
                Ok((HeaderSlot::A, a))
            }
        }
        (Ok(a), Err(_)) => Ok((HeaderSlot::A, a)),
        (Err(_), Ok(b)) => Ok((HeaderSlot::B, b)),
        (Err(e), Err(_)) => Err(e),
    }
}
