//! End-to-end scenarios: create/open round-trips, corruption detection, and
//! hybrid recall determinism, exercised through both the public `wax`
//! facade and (where a scenario needs to corrupt specific bytes) the
//! lower-level `wax_engine::CommitCoordinator`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use wax::{
    BatchEmbeddingProvider, CanonicalEncoding, EmbedPolicy, EmbeddingIdentity, EmbeddingProvider, PutOptions,
    WaxConfig, WaxEngine, WaxResult,
};
use wax_core::format_constants::FOOTER_SIZE;
use wax_engine::CommitCoordinator;

fn flip_bit(path: &std::path::Path, offset: u64) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte).unwrap();
    byte[0] ^= 0xFF;
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&byte).unwrap();
}

// S1: empty create/open round-trip.
#[test]
fn s1_empty_create_open_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let coordinator = CommitCoordinator::create(&path).unwrap();
    let generation_after_create = coordinator.generation();
    coordinator.close();

    let reopened = CommitCoordinator::open(&path, false).unwrap();
    assert_eq!(reopened.frame_store().frames().len(), 0);
    assert!(reopened.frame_store().verify_deep().unwrap().is_empty());
    assert_eq!(reopened.generation(), generation_after_create);
}

// S2: single put and commit survives a close/reopen.
#[test]
fn s2_single_put_and_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let mut coordinator = CommitCoordinator::create(&path).unwrap();
    let generation_before = coordinator.generation();
    coordinator
        .put_frame(b"swift parity payload fixture", PutOptions::default())
        .unwrap();
    coordinator.commit().unwrap();
    coordinator.close();

    let reopened = CommitCoordinator::open(&path, false).unwrap();
    assert!(reopened.frame_store().verify_deep().unwrap().is_empty());
    assert_eq!(reopened.frame_store().frames().len(), 1);
    assert_eq!(reopened.generation(), generation_before + 1);
    assert_eq!(
        reopened.frame_store().frame_content(0).unwrap(),
        b"swift parity payload fixture"
    );
}

// S3: a compressed payload round-trips through its canonical encoding.
#[test]
fn s3_compressed_payload_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let content = "a".repeat(512 * 32);
    let mut coordinator = CommitCoordinator::create(&path).unwrap();
    let options = PutOptions {
        canonical_encoding: Some(CanonicalEncoding::Lz4),
        ..Default::default()
    };
    coordinator.put_frame(content.as_bytes(), options).unwrap();
    coordinator.commit().unwrap();

    let meta = &coordinator.frame_store().frames()[0];
    assert_eq!(meta.canonical_encoding, CanonicalEncoding::Lz4);
    assert!(meta.canonical_length.unwrap() > 0);
    assert!(meta.stored_checksum.is_some());
    assert_eq!(coordinator.frame_store().frame_content(0).unwrap(), content.as_bytes());
}

// S4: flipping a bit in a payload byte is caught by a deep verify.
#[test]
fn s4_payload_corruption_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let payload_offset;
    {
        let mut coordinator = CommitCoordinator::create(&path).unwrap();
        coordinator
            .put_frame(b"swift parity payload fixture", PutOptions::default())
            .unwrap();
        coordinator.commit().unwrap();
        payload_offset = coordinator.frame_store().frames()[0].payload_offset;
        coordinator.close();
    }

    flip_bit(&path, payload_offset);

    let reopened = CommitCoordinator::open(&path, false).unwrap();
    let failures = reopened.frame_store().verify_deep().unwrap();
    assert_eq!(failures, vec![0]);
}

// S5: corrupting the trailing footer's magic falls back to the prior
// generation's footer via the reverse scan.
#[test]
fn s5_footer_corruption_falls_back_to_prior_generation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let second_footer_offset;
    {
        let mut coordinator = CommitCoordinator::create(&path).unwrap();
        coordinator.put_frame(b"one", PutOptions::default()).unwrap();
        coordinator.commit().unwrap();
        coordinator.put_frame(b"two", PutOptions::default()).unwrap();
        coordinator.commit().unwrap();
        second_footer_offset = coordinator.frame_store().payload_end() - FOOTER_SIZE;
        coordinator.close();
    }

    flip_bit(&path, second_footer_offset);

    let reopened = CommitCoordinator::open(&path, false).unwrap();
    assert_eq!(reopened.frame_store().frames().len(), 1);
    assert_eq!(reopened.frame_store().frame_content(0).unwrap(), b"one");
}

// S5 (first half): a single, solely-corrupted footer fails to open at all.
#[test]
fn s5_sole_footer_corruption_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let footer_offset;
    {
        let coordinator = CommitCoordinator::create(&path).unwrap();
        footer_offset = coordinator.frame_store().payload_end() - FOOTER_SIZE;
        coordinator.close();
    }

    flip_bit(&path, footer_offset);

    assert!(CommitCoordinator::open(&path, false).is_err());
}

struct StubEmbedder;

impl EmbeddingProvider for StubEmbedder {
    fn dimensions(&self) -> u32 {
        2
    }

    fn normalize(&self) -> bool {
        true
    }

    fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity {
            provider: "stub".to_string(),
            model: "unit-norm-stub".to_string(),
            dimensions: 2,
            normalized: true,
        }
    }

    fn embed(&self, text: &str) -> WaxResult<Vec<f32>> {
        Ok(fixture_vector(text))
    }
}

impl BatchEmbeddingProvider for StubEmbedder {
    fn embed_batch(&self, texts: &[String]) -> WaxResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| fixture_vector(t)).collect())
    }
}

/// The three fixture chunks map to fixed unit-norm vectors:
/// `fox`-bearing text gets `[1, 0]`, everything else gets `[0, 1]`.
fn fixture_vector(text: &str) -> Vec<f32> {
    if text.contains("fox") {
        vec![1.0, 0.0]
    } else {
        vec![0.0, 1.0]
    }
}

// S6: hybrid recall is deterministic across repeated calls.
#[test]
fn s6_hybrid_recall_determinism() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.wax");

    let embedder: Box<dyn BatchEmbeddingProvider> = Box::new(StubEmbedder);
    let mut engine = WaxEngine::create(&path, WaxConfig::default(), Some(embedder)).unwrap();

    for chunk in ["the quick brown fox", "jumps over the lazy dog", "foxes are quick"] {
        engine.remember(chunk, Vec::new()).unwrap();
    }
    engine.flush().unwrap();

    let first = engine.recall("fox", None, EmbedPolicy::IfAvailable).unwrap();
    let second = engine.recall("fox", None, EmbedPolicy::IfAvailable).unwrap();

    assert_eq!(first, second);
    assert!(!first.items.is_empty());
    assert_eq!(first.items[0].kind, wax::RagItemKind::Expanded);
    assert!(first.total_tokens <= engine_default_max_context_tokens());
}

fn engine_default_max_context_tokens() -> usize {
    WaxConfig::default().orchestrator.rag.max_context_tokens
}
