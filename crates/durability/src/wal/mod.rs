//! WAL ring buffer planning and replay.
//!
//! This module is I/O-free: it computes *where* a record should land in the
//! ring and *which* previously-written bytes form a valid prefix on replay.
//! `wax-storage` executes the actual positional reads/writes against the
//! file, using [`plan_append`] to decide offsets and [`WalReplay::scan`] to
//! decide how much of the ring to trust.

pub mod record;

pub use record::{WalPayload, WalPayloadKind, WalRecord};

use wax_core::{WaxError, WaxResult};

/// Where an about-to-be-appended record should land in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendPlan {
    /// Record fits before the end of the ring without wrapping.
    Direct { offset: u64, new_write_pos: u64 },
    /// Record would run past the end; the tail is zero-padded and the
    /// record restarts at ring offset 0.
    Wrapped {
        pad_offset: u64,
        pad_len: u64,
        record_offset: u64,
        new_write_pos: u64,
    },
}

fn used_bytes(wal_size: u64, write_pos: u64, checkpoint_pos: u64) -> u64 {
    if write_pos >= checkpoint_pos {
        write_pos - checkpoint_pos
    } else {
        wal_size - checkpoint_pos + write_pos
    }
}

/// Decide where a `record_len`-byte record should be written into a ring of
/// `wal_size` bytes, currently at `write_pos` with the oldest unreclaimed
/// byte at `checkpoint_pos`. Fails with `capacity_exceeded` if the ring has
/// no room, the caller must commit (advancing the
/// checkpoint) before retrying.
pub fn plan_append(
    wal_size: u64,
    write_pos: u64,
    checkpoint_pos: u64,
    record_len: u64,
) -> WaxResult<AppendPlan> {
    if record_len > wal_size {
        return Err(WaxError::capacity_exceeded(wal_size, record_len));
    }
    let used = used_bytes(wal_size, write_pos, checkpoint_pos);
    let free = wal_size - used;
    let space_to_end = wal_size - write_pos;

    if record_len <= space_to_end {
        if record_len > free {
            return Err(WaxError::capacity_exceeded(free, record_len));
        }
        let new_write_pos = if write_pos + record_len == wal_size {
            0
        } else {
            write_pos + record_len
        };
        return Ok(AppendPlan::Direct {
            offset: write_pos,
            new_write_pos,
        });
    }

    // Needs to wrap: padding the tail counts against free space too.
    let pad_len = space_to_end;
    if pad_len + record_len > free {
        return Err(WaxError::capacity_exceeded(free, pad_len + record_len));
    }
    Ok(AppendPlan::Wrapped {
        pad_offset: write_pos,
        pad_len,
        record_offset: 0,
        new_write_pos: record_len,
    })
}

/// Outcome of scanning a contiguous byte run (already unwrapped by the
/// caller) for valid WAL records starting at the checkpoint.
#[derive(Debug, Default)]
pub struct WalReplayOutcome {
    /// Records with `seq <= wal_committed_seq`: already part of the
    /// committed TOC, kept only for diagnostics/verification.
    pub committed: Vec<WalRecord>,
    /// Records with `seq > wal_committed_seq`: pending mutations that were
    /// never part of a successful commit. Per the WAL's ownership model,
    /// recovery reconstructs committed state only, so these are reported
    /// but not replayed into any in-memory pending state.
    pub uncommitted: Vec<WalRecord>,
    /// How many bytes of the input formed the valid, well-framed prefix.
    /// Bytes beyond this point are torn/corrupt and should be discarded
    /// (truncating `wal_write_pos` back to `valid_len` in repair mode).
    pub valid_len: usize,
}

/// Scan `bytes` (the WAL region from `wal_checkpoint_pos` onward, already
/// flattened across any ring wrap by the caller) for a run of well-framed
/// records, stopping at the first corrupt or torn record.
pub struct WalReplay;

impl WalReplay {
    pub fn scan(bytes: &[u8], wal_committed_seq: u64, base_offset: u64) -> WalReplayOutcome {
        let mut outcome = WalReplayOutcome::default();
        let mut pos = 0usize;
        let mut last_seq: Option<u64> = None;

        while pos < bytes.len() {
            match WalRecord::decode(&bytes[pos..], base_offset + pos as u64) {
                Ok((record, consumed)) => {
                    if let Some(prev) = last_seq {
                        if record.seq <= prev {
                            // Non-monotonic sequence numbers indicate the
                            // tail is torn rather than a clean append run.
                            break;
                        }
                    }
                    last_seq = Some(record.seq);
                    pos += consumed;
                    outcome.valid_len = pos;
                    if record.seq <= wal_committed_seq {
                        outcome.committed.push(record);
                    } else {
                        outcome.uncommitted.push(record);
                    }
                }
                Err(_) => break,
            }
        }
        outcome
    }
}
