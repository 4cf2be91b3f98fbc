//! The frame store: append-only payload writes plus frame metadata staging.
//!
//! Committing (merging pending metadata into a new TOC, writing the new
//! footer/header) is the commit coordinator's job, in `wax-engine`; this
//! module owns the payload region and the in-memory `FrameMeta` table that
//! the coordinator reads at commit time.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use wax_core::{
    CanonicalEncoding, FrameId, FrameMeta, FrameRole, FrameStatus, PutOptions, WaxError, WaxResult,
};
use wax_durability::format::sha256;
use wax_durability::WalPayload;

use crate::codec::codec_for;
use crate::io::FileHandle;
use crate::wal::WalWriter;

/// Owns the payload region append cursor and the current (committed +
/// pending) frame metadata table.
pub struct FrameStore {
    file: Arc<FileHandle>,
    wal: Arc<Mutex<WalWriter>>,
    payload_end: u64,
    frames: Vec<FrameMeta>,
    committed_len: usize,
}

impl FrameStore {
    /// Open a frame store over an already-positioned payload region.
    /// `committed_frames` is the TOC's frame table as of the last commit;
    /// `payload_end` is the first free byte past the end of the payload
    /// region.
    pub fn open(
        file: Arc<FileHandle>,
        wal: Arc<Mutex<WalWriter>>,
        payload_end: u64,
        committed_frames: Vec<FrameMeta>,
    ) -> Self {
        let committed_len = committed_frames.len();
        FrameStore {
            file,
            wal,
            payload_end,
            frames: committed_frames,
            committed_len,
        }
    }

    /// The current end of the payload region (grows as frames are put).
    pub fn payload_end(&self) -> u64 {
        self.payload_end
    }

    /// Reposition the append cursor. Called by the commit coordinator after
    /// writing this generation's index segments, TOC, and footer, so the
    /// next `put` appends after them rather than overwriting the just-
    /// committed generation.
    pub fn set_payload_end(&mut self, offset: u64) {
        self.payload_end = offset;
    }

    /// The full frame table, dense by id, including uncommitted frames.
    pub fn frames(&self) -> &[FrameMeta] {
        &self.frames
    }

    /// Frames appended since the last commit.
    pub fn pending_frames(&self) -> &[FrameMeta] {
        &self.frames[self.committed_len..]
    }

    /// Called by the commit coordinator once the new TOC has been written
    /// and fsynced; clears the pending/committed distinction.
    pub fn mark_committed(&mut self) {
        self.committed_len = self.frames.len();
    }

    fn meta(&self, frame_id: FrameId) -> WaxResult<&FrameMeta> {
        self.frames
            .get(frame_id as usize)
            .ok_or_else(|| WaxError::frame_not_found(frame_id))
    }

    /// `put`: allocate a dense `frame_id`, encode and persist
    /// the payload, stage its metadata, and emit a WAL record.
    pub fn put(&mut self, content: &[u8], options: PutOptions) -> WaxResult<FrameId> {
        let frame_id = self.frames.len() as FrameId;
        let encoding = options.canonical_encoding.unwrap_or(CanonicalEncoding::Plain);
        let on_disk_bytes = codec_for(encoding).encode(content)?;
        let canonical_checksum = sha256(content);

        let (canonical_length, stored_checksum) = if encoding.is_plain() {
            (None, None)
        } else {
            (Some(content.len() as u64), Some(sha256(&on_disk_bytes)))
        };

        let payload_offset = self.payload_end;
        let payload_length = on_disk_bytes.len() as u64;
        if payload_length > 0 {
            self.file.write_at(payload_offset, &on_disk_bytes)?;
        }
        self.payload_end += payload_length;

        let meta = FrameMeta {
            id: frame_id,
            timestamp_ms: now_millis(),
            role: options.role.unwrap_or(FrameRole::Document),
            parent_id: options.parent_id,
            chunk_index: options.chunk_index,
            chunk_count: options.chunk_count,
            payload_offset,
            payload_length,
            canonical_encoding: encoding,
            canonical_length,
            canonical_checksum,
            stored_checksum,
            status: FrameStatus::Active,
            supersedes: None,
            superseded_by: None,
            uri: options.uri,
            title: options.title,
            search_text: options.search_text,
            metadata: options.metadata,
            tags: options.tags,
            labels: options.labels,
            content_date: options.content_date,
        };
        self.frames.push(meta);

        self.wal.lock().unwrap().append(WalPayload::FrameWrite {
            frame_id,
            payload_offset,
            payload_length,
            canonical_encoding: encoding,
        })?;

        Ok(frame_id)
    }

    /// `put_batch`: N `put` calls with contiguous ids.
    pub fn put_batch(
        &mut self,
        contents: &[Vec<u8>],
        options_list: Vec<PutOptions>,
    ) -> WaxResult<Vec<FrameId>> {
        let mut ids = Vec::with_capacity(contents.len());
        for (content, options) in contents.iter().zip(options_list.into_iter()) {
            ids.push(self.put(content, options)?);
        }
        Ok(ids)
    }

    /// `delete(frame_id)`: marks the frame's pending status as deleted.
    pub fn delete(&mut self, frame_id: FrameId) -> WaxResult<()> {
        self.meta(frame_id)?;
        self.frames[frame_id as usize].status = FrameStatus::Deleted;
        self.wal.lock().unwrap().append(WalPayload::DeleteOrSupersede {
            frame_id,
            superseded_by: None,
        })?;
        Ok(())
    }

    /// `supersede(old, new)`: links the two frames bidirectionally.
    pub fn supersede(&mut self, old: FrameId, new: FrameId) -> WaxResult<()> {
        self.meta(old)?;
        self.meta(new)?;
        self.frames[old as usize].superseded_by = Some(new);
        self.frames[new as usize].supersedes = Some(old);
        self.wal.lock().unwrap().append(WalPayload::DeleteOrSupersede {
            frame_id: old,
            superseded_by: Some(new),
        })?;
        Ok(())
    }

    /// Read and fully decode a frame's canonical content, verifying its
    /// checksum(s) along the way.
    pub fn frame_content(&self, frame_id: FrameId) -> WaxResult<Vec<u8>> {
        let meta = self.meta(frame_id)?;
        let on_disk = if meta.payload_length == 0 {
            Vec::new()
        } else {
            self.file.read_exactly(meta.payload_offset, meta.payload_length)?
        };
        if let Some(expected) = meta.stored_checksum {
            if sha256(&on_disk) != expected {
                return Err(WaxError::checksum_mismatch(format!(
                    "frame {frame_id} stored bytes"
                )));
            }
        }
        let canonical = codec_for(meta.canonical_encoding).decode(&on_disk)?;
        if sha256(&canonical) != meta.canonical_checksum {
            return Err(WaxError::checksum_mismatch(format!(
                "frame {frame_id} canonical bytes"
            )));
        }
        Ok(canonical)
    }

    /// Read at most `max_bytes` of canonical content, for snippet display
    ///. Compression-aware: the on-disk bytes are still
    /// fully decoded (neither `lz4_flex` nor `flate2`'s block/stream
    /// formats support partial decode), then truncated.
    pub fn frame_preview(&self, frame_id: FrameId, max_bytes: usize) -> WaxResult<Vec<u8>> {
        let mut canonical = self.frame_content(frame_id)?;
        canonical.truncate(max_bytes);
        Ok(canonical)
    }

    /// `verify(deep=true)`: re-hash every active frame's on-disk and
    /// canonical bytes. Returns the ids of frames that fail verification
    /// rather than failing fast, so callers can report every problem found.
    pub fn verify_deep(&self) -> WaxResult<Vec<FrameId>> {
        let mut failures = Vec::new();
        for meta in &self.frames {
            if meta.status != FrameStatus::Active || meta.payload_length == 0 {
                continue;
            }
            match self.frame_content(meta.id) {
                Ok(_) => {}
                Err(_) => failures.push(meta.id),
            }
        }
        Ok(failures)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
