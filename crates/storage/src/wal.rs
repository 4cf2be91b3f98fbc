//! The WAL ring buffer as it actually lives on disk: `wax-durability::wal`
//! decides *where* a record goes and *how much* of a byte run replays;
//! this module performs the positional reads/writes around that planning.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wax_core::WaxResult;
use wax_durability::{plan_append, AppendPlan, WalPayload, WalRecord, WalReplay, WalReplayOutcome};

use crate::io::FileHandle;

/// When the WAL is fsynced. `OnCommit` (the default) only flushes at commit
/// time; `PerRecord` flushes after every appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalFsyncPolicy {
    OnCommit,
    PerRecord,
}

impl Default for WalFsyncPolicy {
    fn default() -> Self {
        WalFsyncPolicy::OnCommit
    }
}

/// Live state of the on-disk WAL ring, mirroring the fields tracked in the
/// header page (`wal_write_pos`, `wal_checkpoint_pos`, `wal_committed_seq`).
pub struct WalWriter {
    file: Arc<FileHandle>,
    wal_offset: u64,
    wal_size: u64,
    write_pos: u64,
    checkpoint_pos: u64,
    committed_seq: u64,
    next_seq: u64,
    fsync_policy: WalFsyncPolicy,
}

impl WalWriter {
    pub fn new(
        file: Arc<FileHandle>,
        wal_offset: u64,
        wal_size: u64,
        write_pos: u64,
        checkpoint_pos: u64,
        committed_seq: u64,
        fsync_policy: WalFsyncPolicy,
    ) -> Self {
        WalWriter {
            file,
            wal_offset,
            wal_size,
            write_pos,
            checkpoint_pos,
            committed_seq,
            next_seq: committed_seq + 1,
            fsync_policy,
        }
    }

    pub fn write_pos(&self) -> u64 {
        self.write_pos
    }

    pub fn checkpoint_pos(&self) -> u64 {
        self.checkpoint_pos
    }

    pub fn wal_size(&self) -> u64 {
        self.wal_size
    }

    /// How many unreclaimed bytes sit between `checkpoint_pos` and
    /// `write_pos` (unwrapping the ring as needed) — the region `replay`
    /// scans.
    pub fn unreclaimed_len(&self) -> u64 {
        if self.write_pos >= self.checkpoint_pos {
            self.write_pos - self.checkpoint_pos
        } else {
            self.wal_size - self.checkpoint_pos + self.write_pos
        }
    }

    /// Truncate `write_pos` back to the valid prefix found by `replay`,
    /// discarding a torn trailing record.
    pub fn repair_to_valid(&mut self, valid_len: u64) {
        self.write_pos = (self.checkpoint_pos + valid_len) % self.wal_size;
    }

    pub fn committed_seq(&self) -> u64 {
        self.committed_seq
    }

    /// Append one WAL payload, returning its assigned sequence number.
    /// Fails with `capacity_exceeded` if the ring has no room; the caller
    /// must commit (which advances the checkpoint) before retrying.
    pub fn append(&mut self, payload: WalPayload) -> WaxResult<u64> {
        let seq = self.next_seq;
        let record = WalRecord { seq, payload };
        let bytes = record.encode()?;

        match plan_append(self.wal_size, self.write_pos, self.checkpoint_pos, bytes.len() as u64)? {
            AppendPlan::Direct { offset, new_write_pos } => {
                self.file.write_at(self.wal_offset + offset, &bytes)?;
                self.write_pos = new_write_pos;
            }
            AppendPlan::Wrapped {
                pad_offset,
                pad_len,
                record_offset,
                new_write_pos,
            } => {
                let padding = vec![0u8; pad_len as usize];
                self.file.write_at(self.wal_offset + pad_offset, &padding)?;
                self.file.write_at(self.wal_offset + record_offset, &bytes)?;
                self.write_pos = new_write_pos;
            }
        }

        if self.fsync_policy == WalFsyncPolicy::PerRecord {
            self.file.fsync()?;
        }
        self.next_seq += 1;
        Ok(seq)
    }

    /// Fsync the WAL; always performed at commit regardless of policy.
    pub fn flush(&self) -> WaxResult<()> {
        self.file.fsync()
    }

    /// Advance the checkpoint to the current write position and mark all
    /// records up to `seq` as committed.
    pub fn checkpoint(&mut self, committed_seq: u64) {
        self.checkpoint_pos = self.write_pos;
        self.committed_seq = committed_seq;
    }

    /// Scan the unreclaimed region (`checkpoint_pos..write_pos`, unwrapping
    /// the ring as needed) for the valid prefix of well-framed records.
    pub fn replay(&self) -> WaxResult<WalReplayOutcome> {
        let bytes = if self.write_pos >= self.checkpoint_pos {
            self.file
                .read_exactly(self.wal_offset + self.checkpoint_pos, self.write_pos - self.checkpoint_pos)?
        } else {
            let mut tail = self.file.read_exactly(
                self.wal_offset + self.checkpoint_pos,
                self.wal_size - self.checkpoint_pos,
            )?;
            let head = self.file.read_exactly(self.wal_offset, self.write_pos)?;
            tail.extend_from_slice(&head);
            tail
        };
        Ok(WalReplay::scan(&bytes, self.committed_seq, self.wal_offset + self.checkpoint_pos))
    }
}
