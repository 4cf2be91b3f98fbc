//! BM25-ranked full-text index over frame `search_text`.
//!
//! DashMap-backed posting lists, tracked document lengths for correct
//! removal, and a BM25 scoring formula. The index stores only `frame_id`s
//! and term statistics, never frame content — snippets are assembled by
//! the caller, which has the frame store at hand, not by the index.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use wax_core::{FrameId, WaxError, WaxResult};

use crate::tokenizer::tokenize;

/// BM25 term-frequency saturation parameter (resolves an Open
/// Question #1.
pub const BM25_K1: f32 = 1.2;
/// BM25 length-normalization parameter (resolves an Open
/// Question #1.
pub const BM25_B: f32 = 0.75;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PostingEntry {
    frame_id: FrameId,
    tf: u32,
}

/// A BM25 full-text index. Mutations are staged in memory; `stage_for_commit`
/// serializes the whole index to a byte blob the commit coordinator writes
/// into a segment, and `restore` deserializes it back
/// on open.
pub struct LexIndex {
    postings: DashMap<String, Vec<PostingEntry>>,
    doc_lengths: DashMap<FrameId, u32>,
    total_doc_len: std::sync::atomic::AtomicU64,
}

impl Default for LexIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LexIndex {
    pub fn new() -> Self {
        LexIndex {
            postings: DashMap::new(),
            doc_lengths: DashMap::new(),
            total_doc_len: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Number of frames currently indexed.
    pub fn total_docs(&self) -> usize {
        self.doc_lengths.len()
    }

    fn avg_doc_len(&self) -> f32 {
        let total = self.total_docs();
        if total == 0 {
            return 0.0;
        }
        self.total_doc_len.load(std::sync::atomic::Ordering::Acquire) as f32 / total as f32
    }

    fn doc_freq(&self, term: &str) -> usize {
        self.postings.get(term).map(|r| r.len()).unwrap_or(0)
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.total_docs() as f32;
        let df = self.doc_freq(term) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Index one frame's text. Re-indexing a frame replaces its prior entry.
    pub fn index(&self, frame_id: FrameId, text: &str) {
        if self.doc_lengths.contains_key(&frame_id) {
            self.remove(frame_id);
        }

        let tokens = tokenize(text);
        let doc_len = tokens.len() as u32;

        let mut tf_map: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in tf_map {
            self.postings
                .entry(term)
                .or_default()
                .push(PostingEntry { frame_id, tf });
        }

        self.doc_lengths.insert(frame_id, doc_len);
        self.total_doc_len
            .fetch_add(doc_len as u64, std::sync::atomic::Ordering::Release);
    }

    /// Index a batch of frames, amortizing nothing special over `index` in
    /// memory.
    pub fn index_batch(&self, entries: &[(FrameId, &str)]) {
        for (frame_id, text) in entries {
            self.index(*frame_id, text);
        }
    }

    /// Remove a frame from the index.
    pub fn remove(&self, frame_id: FrameId) {
        let Some((_, doc_len)) = self.doc_lengths.remove(&frame_id) else {
            return;
        };
        for mut entry in self.postings.iter_mut() {
            entry.retain(|p| p.frame_id != frame_id);
        }
        self.total_doc_len
            .fetch_sub(doc_len as u64, std::sync::atomic::Ordering::Release);
    }

    /// BM25-ranked search. Snippets are always `None`; attaching one
    /// requires frame content, which lives outside this index.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(FrameId, f32, Option<String>)> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || self.total_docs() == 0 {
            return Vec::new();
        }

        let avg_len = self.avg_doc_len().max(1.0);
        let mut scores: HashMap<FrameId, f32> = HashMap::new();

        for term in &query_terms {
            let idf = self.idf(term);
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            for entry in postings.iter() {
                let doc_len = self
                    .doc_lengths
                    .get(&entry.frame_id)
                    .map(|r| *r)
                    .unwrap_or(0) as f32;
                let tf = entry.tf as f32;
                let tf_component = (tf * (BM25_K1 + 1.0))
                    / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len));
                *scores.entry(entry.frame_id).or_insert(0.0) += idf * tf_component;
            }
        }

        let mut ranked: Vec<(FrameId, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
            .into_iter()
            .map(|(frame_id, score)| (frame_id, score, None))
            .collect()
    }

    /// Serialize the whole index to a byte blob for commit.
    pub fn stage_for_commit(&self) -> WaxResult<Vec<u8>> {
        let snapshot = LexIndexSnapshot {
            postings: self
                .postings
                .iter()
                .map(|r| {
                    (
                        r.key().clone(),
                        r.value().iter().map(|p| (p.frame_id, p.tf)).collect(),
                    )
                })
                .collect(),
            doc_lengths: self
                .doc_lengths
                .iter()
                .map(|r| (*r.key(), *r.value()))
                .collect(),
        };
        bincode::serialize(&snapshot)
            .map_err(|e| WaxError::encoding_error(format!("lex index: {e}")))
    }

    /// Rebuild an index from a previously staged blob.
    pub fn restore(bytes: &[u8]) -> WaxResult<Self> {
        let snapshot: LexIndexSnapshot = bincode::deserialize(bytes)
            .map_err(|e| WaxError::decoding_error(format!("lex index: {e}")))?;

        let index = LexIndex::new();
        let mut total_len = 0u64;
        for (frame_id, doc_len) in snapshot.doc_lengths {
            index.doc_lengths.insert(frame_id, doc_len);
            total_len += doc_len as u64;
        }
        for (term, entries) in snapshot.postings {
            index.postings.insert(
                term,
                entries
                    .into_iter()
                    .map(|(frame_id, tf)| PostingEntry { frame_id, tf })
                    .collect(),
            );
        }
        index
            .total_doc_len
            .store(total_len, std::sync::atomic::Ordering::Release);
        Ok(index)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LexIndexSnapshot {
    postings: Vec<(String, Vec<(FrameId, u32)>)>,
    doc_lengths: Vec<(FrameId, u32)>,
}
