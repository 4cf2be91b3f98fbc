//! Bounded reverse footer scan.
//!
//! The scanner is I/O-free aside from the small [`ByteSource`] abstraction
//! it requires; `wax-storage`'s file handle implements it over positional
//! reads.

use wax_core::format_constants::{FOOTER_MAGIC, FOOTER_SIZE};
use wax_core::{Limits, WaxError, WaxResult};

use crate::format::footer::Footer;
use crate::format::toc::Toc;

/// Minimal random-access byte source the scanner needs. Kept separate from
/// any concrete file type so this crate stays I/O-agnostic.
pub trait ByteSource {
    fn len(&self) -> WaxResult<u64>;
    fn read_at(&self, offset: u64, len: u64) -> WaxResult<Vec<u8>>;
}

/// A footer candidate that passed structural and checksum validation.
pub struct ValidatedFooter {
    pub offset: u64,
    pub footer: Footer,
    pub toc: Toc,
}

/// Perform the bounded reverse scan: search the
/// final `max_footer_scan_bytes` of the file for footer magic, validate each
/// candidate, and return the one with the highest `generation` (ties broken
/// by larger offset).
pub fn find_latest_footer<S: ByteSource>(source: &S, limits: &Limits) -> WaxResult<ValidatedFooter> {
    let file_len = source.len()?;
    if file_len < FOOTER_SIZE {
        return Err(WaxError::invalid_footer("file too small to contain a footer"));
    }

    let window_start = file_len.saturating_sub(limits.max_footer_scan_bytes);
    let window = source.read_at(window_start, file_len - window_start)?;

    let mut best: Option<ValidatedFooter> = None;

    for i in 0..window.len() {
        if i + 4 > window.len() {
            break;
        }
        if window[i..i + 4] != FOOTER_MAGIC {
            continue;
        }
        let candidate_offset = window_start + i as u64;
        if candidate_offset + FOOTER_SIZE > file_len {
            continue;
        }

        let footer_bytes = if i + FOOTER_SIZE as usize <= window.len() {
            window[i..i + FOOTER_SIZE as usize].to_vec()
        } else {
            match source.read_at(candidate_offset, FOOTER_SIZE) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            }
        };

        let footer = match Footer::decode(&footer_bytes) {
            Ok(f) => f,
            Err(_) => continue,
        };

        if footer.toc_len < 32 || footer.toc_len > limits.max_toc_bytes {
            continue;
        }
        if footer.toc_len > candidate_offset {
            continue;
        }
        let toc_offset = candidate_offset - footer.toc_len;
        let toc_bytes = match source.read_at(toc_offset, footer.toc_len) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        let toc = match Toc::decode(&toc_bytes, limits, &footer.toc_hash) {
            Ok(toc) => toc,
            Err(_) => continue,
        };

        let replace = match &best {
            None => true,
            Some(current) => {
                (footer.generation, candidate_offset)
                    > (current.footer.generation, current.offset)
            }
        };
        if replace {
            best = Some(ValidatedFooter {
                offset: candidate_offset,
                footer,
                toc,
            });
        }
    }

    best.ok_or_else(|| WaxError::invalid_footer("no valid footer found in scan window"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::checksum::stamped_checksum;
    use crate::format::toc::Toc;
    use std::cell::RefCell;

    struct VecSource {
        data: RefCell<Vec<u8>>,
    }

    impl ByteSource for VecSource {
        fn len(&self) -> WaxResult<u64> {
            Ok(self.data.borrow().len() as u64)
        }

        fn read_at(&self, offset: u64, len: u64) -> WaxResult<Vec<u8>> {
            let data = self.data.borrow();
            let start = offset as usize;
            let end = start + len as usize;
            if end > data.len() {
                return Err(WaxError::io("read past end"));
            }
            Ok(data[start..end].to_vec())
        }
    }

    fn build_file_with_one_commit() -> Vec<u8> {
        let mut file = vec![0u8; 8192]; // header region placeholder
        let toc = Toc::empty();
        let toc_bytes = toc.encode().unwrap();
        let toc_offset = file.len() as u64;
        file.extend_from_slice(&toc_bytes);

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&toc_bytes[toc_bytes.len() - 32..]);
        let _ = stamped_checksum(&toc_bytes[..toc_bytes.len() - 32]);

        let footer = Footer {
            toc_len: toc_bytes.len() as u64,
            toc_hash: hash,
            generation: 1,
            wal_committed_seq: 0,
        };
        let _ = toc_offset;
        file.extend_from_slice(&footer.encode());
        file
    }

    #[test]
    fn finds_single_valid_footer() {
        let file = build_file_with_one_commit();
        let source = VecSource {
            data: RefCell::new(file),
        };
        let limits = Limits::default();
        let result = find_latest_footer(&source, &limits).unwrap();
        assert_eq!(result.footer.generation, 1);
    }

    #[test]
    fn picks_highest_generation_among_two_footers() {
        let mut file = build_file_with_one_commit();
        // Append a second commit (same empty TOC, generation 2).
        let toc = Toc::empty();
        let toc_bytes = toc.encode().unwrap();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&toc_bytes[toc_bytes.len() - 32..]);
        file.extend_from_slice(&toc_bytes);
        let footer2 = Footer {
            toc_len: toc_bytes.len() as u64,
            toc_hash: hash,
            generation: 2,
            wal_committed_seq: 0,
        };
        file.extend_from_slice(&footer2.encode());

        let source = VecSource {
            data: RefCell::new(file),
        };
        let limits = Limits::default();
        let result = find_latest_footer(&source, &limits).unwrap();
        assert_eq!(result.footer.generation, 2);
    }

    #[test]
    fn corrupted_trailing_footer_falls_back_to_prior() {
        let mut file = build_file_with_one_commit();
        let prior_len = file.len();

        let toc = Toc::empty();
        let toc_bytes = toc.encode().unwrap();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&toc_bytes[toc_bytes.len() - 32..]);
        file.extend_from_slice(&toc_bytes);
        let footer2 = Footer {
            toc_len: toc_bytes.len() as u64,
            toc_hash: hash,
            generation: 2,
            wal_committed_seq: 0,
        };
        let mut footer2_bytes = footer2.encode();
        footer2_bytes[0] ^= 0xFF; // corrupt magic
        file.extend_from_slice(&footer2_bytes);

        let source = VecSource {
            data: RefCell::new(file),
        };
        let limits = Limits::default();
        let result = find_latest_footer(&source, &limits).unwrap();
        assert_eq!(result.footer.generation, 1);
        assert_eq!(result.offset as usize, prior_len - FOOTER_SIZE as usize);
    }
}
