//! The commit coordinator: owns the payload region, the two indexes, and
//! the header/WAL/TOC/footer dance that makes a write durable.
//!
//! Follows the "WAL is the durability point, everything after it is
//! replayable" shape, and logs via `tracing::error!` on a failure that
//! happens after the durability point but before in-memory state catches
//! up. Wax has no MVCC and exactly one writer, so there is no per-branch
//! lock map and no conflict validation step — `WriterLease` (`lease.rs`)
//! already serializes
//! callers before a `CommitCoordinator` method ever runs.
//!
//! A `CommitCoordinator` is always the writer for the file it holds open, so
//! `create`/`open` both take the exclusive advisory file lock up front; it is released when the underlying `FileHandle` drops.

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use tracing::{error, warn};
use wax_core::format_constants::{FOOTER_SIZE, HEADER_REGION_SIZE};
use wax_core::{FrameId, Limits, PutOptions, SimilarityMetric, WaxError, WaxResult};
use wax_durability::format::{
    select_header, Footer, HeaderPage, HeaderSlot, LexManifest, SegmentEntry, SegmentKind, Toc,
    VectorManifest,
};
use wax_durability::format::sha256;
use wax_durability::{ByteSource, WalPayload};
use wax_search::{BruteForceIndex, LexIndex, VectorIndexBackend};
use wax_storage::{FileHandle, FrameStore, WalFsyncPolicy, WalWriter};

/// Default WAL ring size for newly created files. Not pinned by a fixed constant;
/// chosen generously enough that ordinary ingestion batches commit before
/// wrapping. Record in `DESIGN.md` as an Open Question resolution.
pub const DEFAULT_WAL_SIZE: u64 = 4 * 1024 * 1024;

fn toc_similarity_tag(metric: SimilarityMetric) -> wax_durability::format::SimilarityMetric {
    match metric {
        SimilarityMetric::Cosine => wax_durability::format::SimilarityMetric::Cosine,
        SimilarityMetric::Dot => wax_durability::format::SimilarityMetric::Dot,
        SimilarityMetric::L2 => wax_durability::format::SimilarityMetric::L2,
    }
}

/// Owns every piece of mutable state behind the writer lease: the frame
/// store, the two indexes, and the header/WAL bookkeeping needed to commit.
pub struct CommitCoordinator {
    file: Arc<FileHandle>,
    wal: Arc<StdMutex<WalWriter>>,
    frame_store: FrameStore,
    lex: LexIndex,
    vector: Option<Box<dyn VectorIndexBackend>>,
    header_slot: HeaderSlot,
    generation: u64,
    wal_offset: u64,
    wal_size: u64,
    limits: Limits,
}

impl CommitCoordinator {
    /// Create a brand-new Wax file at `path` and commit an empty generation
    /// 1 immediately, so the file is openable the instant `create` returns.
    ///
    /// Bootstraps through the ordinary `commit` path rather than a special
    /// case: a fresh file has no real header page in either slot, so
    /// starting `header_slot` at `B` makes the first commit's "write to
    /// `other()`" land on slot `A`, exactly like every later commit.
    pub fn create(path: impl AsRef<Path>) -> WaxResult<Self> {
        let path = path.as_ref();
        let file = Arc::new(FileHandle::create_new(path)?);
        file.lock_exclusive()?;
        file.set_len(HEADER_REGION_SIZE + DEFAULT_WAL_SIZE)?;

        let wal_writer = WalWriter::new(
            file.clone(),
            HEADER_REGION_SIZE,
            DEFAULT_WAL_SIZE,
            0,
            0,
            0,
            WalFsyncPolicy::default(),
        );
        let wal = Arc::new(StdMutex::new(wal_writer));
        let payload_start = HEADER_REGION_SIZE + DEFAULT_WAL_SIZE;
        let frame_store = FrameStore::open(file.clone(), wal.clone(), payload_start, Vec::new());

        let mut coordinator = CommitCoordinator {
            file,
            wal,
            frame_store,
            lex: LexIndex::new(),
            vector: None,
            header_slot: HeaderSlot::B,
            generation: 0,
            wal_offset: HEADER_REGION_SIZE,
            wal_size: DEFAULT_WAL_SIZE,
            limits: Limits::default(),
        };
        coordinator.commit()?;
        Ok(coordinator)
    }

    /// Open an existing Wax file. `repair` tolerates a torn trailing WAL
    /// record by truncating to the last well-framed one.
    pub fn open(path: impl AsRef<Path>, repair: bool) -> WaxResult<Self> {
        let path = path.as_ref();
        let file = Arc::new(FileHandle::open_existing(path)?);
        file.lock_exclusive()?;
        let limits = Limits::default();

        let validated = wax_durability::find_latest_footer(file.as_ref(), &limits)?;

        let page_a = file.read_at(0, wax_core::format_constants::HEADER_PAGE_SIZE)?;
        let page_b = file.read_at(
            wax_core::format_constants::HEADER_PAGE_SIZE,
            wax_core::format_constants::HEADER_PAGE_SIZE,
        )?;
        let (header_slot, header) = select_header(&page_a, &page_b)?;

        if header.footer_offset != validated.offset {
            warn!(
                header_footer_offset = header.footer_offset,
                scanned_footer_offset = validated.offset,
                "header page's footer_offset disagrees with the reverse-scanned footer; trusting the scan"
            );
        }

        let mut wal_writer = WalWriter::new(
            file.clone(),
            header.wal_offset,
            header.wal_size,
            header.wal_write_pos,
            header.wal_checkpoint_pos,
            header.wal_committed_seq,
            WalFsyncPolicy::default(),
        );

        let outcome = wal_writer.replay()?;
        if outcome.valid_len < wal_writer.unreclaimed_len() as usize {
            if repair {
                wal_writer.repair_to_valid(outcome.valid_len as u64);
            } else {
                return Err(WaxError::wal_corruption(
                    header.wal_offset + header.wal_checkpoint_pos,
                    "torn trailing WAL record; open with repair=true to discard it",
                ));
            }
        }

        let lex = match &validated.toc.lex_manifest {
            Some(manifest) => {
                let bytes = file.read_exactly(manifest.bytes_offset, manifest.bytes_length)?;
                if sha256(&bytes) != manifest.checksum {
                    return Err(WaxError::checksum_mismatch("lex segment"));
                }
                LexIndex::restore(&bytes)?
            }
            None => LexIndex::new(),
        };

        let vector: Option<Box<dyn VectorIndexBackend>> = match &validated.toc.vector_manifest {
            Some(manifest) => {
                let bytes = file.read_exactly(manifest.bytes_offset, manifest.bytes_length)?;
                if sha256(&bytes) != manifest.checksum {
                    return Err(WaxError::checksum_mismatch("vector segment"));
                }
                Some(Box::new(BruteForceIndex::deserialize(&bytes)?))
            }
            None => None,
        };

        let payload_end = validated.offset + FOOTER_SIZE;
        let wal = Arc::new(StdMutex::new(wal_writer));
        let frame_store = FrameStore::open(file.clone(), wal.clone(), payload_end, validated.toc.frames.clone());

        Ok(CommitCoordinator {
            file,
            wal,
            frame_store,
            lex,
            vector,
            header_slot,
            generation: header.file_generation,
            wal_offset: header.wal_offset,
            wal_size: header.wal_size,
            limits,
        })
    }

    pub fn frame_store(&self) -> &FrameStore {
        &self.frame_store
    }

    pub fn frame_store_mut(&mut self) -> &mut FrameStore {
        &mut self.frame_store
    }

    pub fn lex(&self) -> &LexIndex {
        &self.lex
    }

    pub fn vector(&self) -> Option<&dyn VectorIndexBackend> {
        self.vector.as_deref()
    }

    /// The generation of the last successful commit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Install a vector index backend, typically right after `create` once
    /// the embedding provider's dimensionality is known.
    pub fn configure_vector_index(&mut self, index: Box<dyn VectorIndexBackend>) {
        self.vector = Some(index);
    }

    /// Stage an embedding for `frame_id`: add it to the vector index if one
    /// is configured, and durably record the intent in the WAL regardless
    ///. If no vector index is configured yet, the
    /// WAL record survives so a later `commit` can still fail loudly with
    /// `VectorIndexNotStaged` rather than silently dropping the embedding.
    pub fn stage_embedding(&mut self, frame_id: FrameId, vector: Vec<f32>) -> WaxResult<()> {
        if let Some(index) = self.vector.as_mut() {
            index.add(frame_id, vector.clone())?;
        }
        self.wal
            .lock()
            .unwrap()
            .append(WalPayload::EmbeddingPut { frame_id, vector })?;
        Ok(())
    }

    /// Re-index a frame's `search_text` into the lex index and record the
    /// mutation in the WAL.
    pub fn stage_lex_text(&mut self, frame_id: FrameId, text: &str) -> WaxResult<()> {
        self.lex.index(frame_id, text);
        self.wal.lock().unwrap().append(WalPayload::LexMutation {
            frame_id,
            text: text.to_string(),
            remove: false,
        })?;
        Ok(())
    }

    /// `put` a frame, mirroring its `search_text` into the lex index when
    /// present. The convenience most callers (`wax-engine::engine`) want;
    /// `frame_store_mut().put` is still available for bypassing indexing.
    pub fn put_frame(&mut self, content: &[u8], options: PutOptions) -> WaxResult<FrameId> {
        let search_text = options.search_text.clone();
        let frame_id = self.frame_store.put(content, options)?;
        if let Some(text) = search_text {
            self.stage_lex_text(frame_id, &text)?;
        }
        Ok(frame_id)
    }

    /// Check whether any WAL record pending since the last commit carries an
    /// `EmbeddingPut` that was never staged into a configured vector index
    ///. Staging in this engine is implicit — `stage_embedding`
    /// adds straight to the in-memory index — so this check only ever fires
    /// when embeddings were staged (or attempted) with no vector index
    /// configured at all.
    fn check_vector_staged(&self) -> WaxResult<()> {
        if self.vector.is_some() {
            return Ok(());
        }
        let outcome = self.wal.lock().unwrap().replay()?;
        let has_embeddings = outcome
            .uncommitted
            .iter()
            .any(|record| matches!(record.payload, WalPayload::EmbeddingPut { .. }));
        if has_embeddings {
            Err(WaxError::VectorIndexNotStaged)
        } else {
            Ok(())
        }
    }

    /// Run the full seven-step commit sequence. On any
    /// failure before step 6 (the header swap), no generation advances: the
    /// prior generation remains selected and recoverable.
    pub fn commit(&mut self) -> WaxResult<()> {
        self.check_vector_staged()?;

        // Step 1: WAL records for pending frames/mutations are already
        // appended by `put`/`stage_*`; fsync them durable now.
        self.wal.lock().unwrap().flush()?;

        // Step 2: stage indexes to fresh segments starting at the current
        // payload-region cursor (already past every frame byte written
        // since the last commit).
        let mut cursor = self.frame_store.payload_end();
        let mut segments = Vec::new();

        let lex_bytes = self.lex.stage_for_commit()?;
        let lex_offset = cursor;
        self.file.write_at(lex_offset, &lex_bytes)?;
        cursor += lex_bytes.len() as u64;
        let lex_checksum = sha256(&lex_bytes);
        let lex_manifest = LexManifest {
            doc_count: self.lex.total_docs() as u64,
            bytes_offset: lex_offset,
            bytes_length: lex_bytes.len() as u64,
            checksum: lex_checksum,
            version: 1,
        };
        segments.push(SegmentEntry {
            kind: SegmentKind::Lex,
            bytes_offset: lex_offset,
            bytes_length: lex_bytes.len() as u64,
            checksum: lex_checksum,
            compression: 0,
        });

        let vector_manifest = match &self.vector {
            Some(index) => {
                let bytes = index.serialize_segment()?;
                let offset = cursor;
                self.file.write_at(offset, &bytes)?;
                cursor += bytes.len() as u64;
                let checksum = sha256(&bytes);
                segments.push(SegmentEntry {
                    kind: SegmentKind::Vector,
                    bytes_offset: offset,
                    bytes_length: bytes.len() as u64,
                    checksum,
                    compression: 0,
                });
                Some(VectorManifest {
                    vector_count: index.len() as u64,
                    dimension: index.dimension(),
                    bytes_offset: offset,
                    bytes_length: bytes.len() as u64,
                    checksum,
                    similarity: toc_similarity_tag(index.metric()),
                })
            }
            None => None,
        };

        // Step 3: build the new TOC over the full (committed + pending)
        // frame table.
        let toc = Toc {
            toc_version: 1,
            frames: self.frame_store.frames().to_vec(),
            lex_manifest: Some(lex_manifest),
            vector_manifest,
            time_index_manifest: None,
            segments,
            merkle_root: [0u8; 32],
        };

        // Step 4: encode (trailing stamped-zero checksum included) and
        // write at `cursor`, then fsync.
        let toc_bytes = toc.encode()?;
        let toc_offset = cursor;
        let mut toc_hash = [0u8; 32];
        toc_hash.copy_from_slice(&toc_bytes[toc_bytes.len() - 32..]);
        self.file.write_at(toc_offset, &toc_bytes)?;
        self.file.fsync()?;

        // Step 5: write the new footer just past the TOC, then fsync.
        let new_generation = self.generation + 1;
        let committed_seq = self.wal.lock().unwrap().committed_seq();
        let new_committed_seq = self
            .wal
            .lock()
            .unwrap()
            .replay()?
            .uncommitted
            .last()
            .map(|r| r.seq)
            .unwrap_or(committed_seq);
        let footer = Footer {
            toc_len: toc_bytes.len() as u64,
            toc_hash,
            generation: new_generation,
            wal_committed_seq: new_committed_seq,
        };
        let footer_offset = toc_offset + toc_bytes.len() as u64;
        self.file.write_at(footer_offset, &footer.encode())?;
        self.file.fsync()?;

        // Step 6: write the header page to the non-selected slot.
        let next_slot = self.header_slot.other();
        let header_page = HeaderPage {
            format_version: wax_core::format_constants::FORMAT_VERSION,
            spec_major: wax_core::format_constants::SPEC_MAJOR,
            spec_minor: wax_core::format_constants::SPEC_MINOR,
            header_page_generation: new_generation,
            file_generation: new_generation,
            footer_offset,
            wal_offset: self.wal_offset,
            wal_size: self.wal_size,
            wal_write_pos: self.wal.lock().unwrap().write_pos(),
            wal_checkpoint_pos: self.wal.lock().unwrap().write_pos(),
            wal_committed_seq: new_committed_seq,
            toc_checksum: toc_hash,
        };
        self.file.write_at(next_slot.offset(), &header_page.encode())?;
        self.file.fsync()?;

        // Step 7: advance in-memory state. A failure past this point would
        // have no generation to roll back to, so it is logged loudly rather
        // than surfaced as a commit failure the caller could retry.
        self.header_slot = next_slot;
        self.generation = new_generation;
        self.frame_store.mark_committed();
        let new_payload_end = footer_offset + FOOTER_SIZE;
        self.frame_store.set_payload_end(new_payload_end);
        {
            let mut wal = self.wal.lock().unwrap();
            wal.checkpoint(new_committed_seq);
        }

        Ok(())
    }

    /// Close: no-op beyond dropping, since `FileHandle::drop` releases the
    /// advisory lock. Exists so `wax-engine::engine::WaxEngine::close` has
    /// an explicit, documented call site.
    pub fn close(self) {
        if let Err(e) = self.wal.lock().unwrap().flush() {
            error!(error = %e, "failed to flush WAL on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wax_core::PutOptions;

    #[test]
    fn create_produces_an_openable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        {
            let _coordinator = CommitCoordinator::create(&path).unwrap();
        }
        let reopened = CommitCoordinator::open(&path, false).unwrap();
        assert_eq!(reopened.frame_store().frames().len(), 0);
    }

    #[test]
    fn put_and_commit_round_trips_frame_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        {
            let mut coordinator = CommitCoordinator::create(&path).unwrap();
            let id = coordinator.put_frame(b"hello wax", PutOptions::default()).unwrap();
            coordinator.commit().unwrap();
            assert_eq!(coordinator.frame_store().frame_content(id).unwrap(), b"hello wax");
        }

        let reopened = CommitCoordinator::open(&path, false).unwrap();
        assert_eq!(reopened.frame_store().frames().len(), 1);
        assert_eq!(reopened.frame_store().frame_content(0).unwrap(), b"hello wax");
    }

    #[test]
    fn lex_index_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        {
            let mut coordinator = CommitCoordinator::create(&path).unwrap();
            let options = PutOptions {
                search_text: Some("hello durable wax".to_string()),
                ..Default::default()
            };
            coordinator.put_frame(b"hello durable wax", options).unwrap();
            coordinator.commit().unwrap();
        }

        let reopened = CommitCoordinator::open(&path, false).unwrap();
        let hits = reopened.lex().search("durable", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);
    }

    #[test]
    fn embedding_without_vector_index_fails_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut coordinator = CommitCoordinator::create(&path).unwrap();
        let id = coordinator.put_frame(b"content", PutOptions::default()).unwrap();
        coordinator.stage_embedding(id, vec![1.0, 0.0]).unwrap();
        let err = coordinator.commit().unwrap_err();
        assert!(matches!(err, WaxError::VectorIndexNotStaged));
    }

    #[test]
    fn embedding_with_configured_vector_index_commits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut coordinator = CommitCoordinator::create(&path).unwrap();
        coordinator.configure_vector_index(Box::new(BruteForceIndex::new(2, SimilarityMetric::Cosine)));
        let id = coordinator.put_frame(b"content", PutOptions::default()).unwrap();
        coordinator.stage_embedding(id, vec![1.0, 0.0]).unwrap();
        coordinator.commit().unwrap();

        let reopened = CommitCoordinator::open(&path, false).unwrap();
        assert!(reopened.vector().is_some());
        assert_eq!(reopened.vector().unwrap().len(), 1);
    }

    #[test]
    fn second_commit_does_not_clobber_first_generation_footer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut coordinator = CommitCoordinator::create(&path).unwrap();
        coordinator.put_frame(b"one", PutOptions::default()).unwrap();
        coordinator.commit().unwrap();
        coordinator.put_frame(b"two", PutOptions::default()).unwrap();
        coordinator.commit().unwrap();

        let reopened = CommitCoordinator::open(&path, false).unwrap();
        assert_eq!(reopened.frame_store().frames().len(), 2);
        assert_eq!(reopened.frame_store().frame_content(0).unwrap(), b"one");
        assert_eq!(reopened.frame_store().frame_content(1).unwrap(), b"two");
    }
}
