//! The RAG context builder: turns a ranked unified-search
//! result into a token-budgeted `RagContext`, deterministically for a fixed
//! `(query, committed state, config)`.
//!
//! Grounded on `wax-search::hybrid::unified_search` for the ranking step;
//! this module owns only the expansion/surrogate/snippet assembly and the
//! token-budget bookkeeping, which lives here rather than in `wax-search`
//! because it needs frame content (`wax-storage::FrameStore`), a layer
//! `wax-search` does not depend on.

use wax_core::{RagContext, RagItem, RagItemKind, SearchHit, SearchRequest, WaxResult};
use wax_search::{unified_search, LexIndex, VectorIndexBackend};
use wax_storage::FrameStore;

use crate::config::{FastRAGConfig, RagMode};
use crate::tokens::{count_tokens, truncate_to_tokens};

const SUMMARY_METADATA_KEY: &str = "summary";

/// Build a `RagContext` for `query`.
pub fn build_rag_context(
    frame_store: &FrameStore,
    lex: &LexIndex,
    vector: Option<&dyn VectorIndexBackend>,
    query: &str,
    embedding: Option<Vec<f32>>,
    config: &FastRAGConfig,
) -> WaxResult<RagContext> {
    let request = SearchRequest {
        query: query.to_string(),
        embedding,
        mode: config.search_mode,
        top_k: config.search_top_k,
        rrf_k: config.rrf_k,
        preview_max_bytes: config.preview_max_bytes,
    };

    let mut hits = unified_search(lex, vector, &request)?;
    attach_previews(frame_store, &mut hits, config.preview_max_bytes);

    let mut items = Vec::new();
    let mut total_tokens = 0usize;
    let mut remaining_hits = hits.into_iter();

    // Step 2: expansion, first claim on the budget.
    if let Some(hit) = remaining_hits.next() {
        let content = frame_store.frame_preview(hit.frame_id, config.expansion_max_bytes).unwrap_or_default();
        let text = String::from_utf8_lossy(&content).into_owned();
        emit(
            &mut items,
            &mut total_tokens,
            config.max_context_tokens,
            RagItemKind::Expanded,
            hit,
            text,
            config.expansion_max_tokens,
        );
    }

    let mut rest: Vec<SearchHit> = remaining_hits.collect();

    // Step 3: surrogates, denseCached mode only.
    if config.mode == RagMode::DenseCached && total_tokens < config.max_context_tokens {
        let take = config.max_surrogates.min(rest.len());
        for hit in rest.drain(..take) {
            if total_tokens >= config.max_context_tokens {
                break;
            }
            let text = surrogate_text(frame_store, &hit);
            emit(
                &mut items,
                &mut total_tokens,
                config.max_context_tokens,
                RagItemKind::Surrogate,
                hit,
                text,
                config.surrogate_max_tokens,
            );
        }
    }

    // Step 4: snippets from whatever is left.
    for hit in rest.into_iter().take(config.max_snippets) {
        if total_tokens >= config.max_context_tokens {
            break;
        }
        let text = hit.preview_text.clone();
        emit(
            &mut items,
            &mut total_tokens,
            config.max_context_tokens,
            RagItemKind::Snippet,
            hit,
            text,
            config.snippet_max_tokens,
        );
    }

    Ok(RagContext {
        query: query.to_string(),
        items,
        total_tokens,
    })
}

fn attach_previews(frame_store: &FrameStore, hits: &mut [SearchHit], preview_max_bytes: usize) {
    for hit in hits.iter_mut() {
        if let Ok(bytes) = frame_store.frame_preview(hit.frame_id, preview_max_bytes) {
            hit.preview_text = String::from_utf8_lossy(&bytes).into_owned();
        }
    }
}

/// A pre-computed summary (`metadata["summary"]`) if the frame carries one,
/// else its bounded preview.
fn surrogate_text(frame_store: &FrameStore, hit: &SearchHit) -> String {
    let summary = frame_store
        .frames()
        .get(hit.frame_id as usize)
        .and_then(|meta| meta.metadata.iter().find(|(k, _)| k == SUMMARY_METADATA_KEY))
        .map(|(_, v)| v.clone());
    summary.unwrap_or_else(|| hit.preview_text.clone())
}

/// Clamp `text` to whatever budget remains (the item's own cap, further
/// clamped by `max_context_tokens - total_tokens`), and push the resulting
/// item iff any budget remains.
fn emit(
    items: &mut Vec<RagItem>,
    total_tokens: &mut usize,
    max_context_tokens: usize,
    kind: RagItemKind,
    hit: SearchHit,
    text: String,
    item_cap_tokens: usize,
) {
    let remaining = max_context_tokens.saturating_sub(*total_tokens);
    if remaining == 0 {
        return;
    }
    let budget = item_cap_tokens.min(remaining);
    let truncated = truncate_to_tokens(&text, budget);
    let tokens = count_tokens(&truncated);
    *total_tokens += tokens;
    items.push(RagItem {
        kind,
        frame_id: hit.frame_id,
        score: hit.score,
        sources: hit.sources,
        text: truncated,
        tokens,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use wax_core::{format_constants::HEADER_REGION_SIZE, PutOptions, SearchMode};
    use wax_storage::{FileHandle, WalFsyncPolicy, WalWriter};

    fn fresh_store(dir: &std::path::Path) -> FrameStore {
        let path = dir.join("wax.db");
        let file = Arc::new(FileHandle::create_new(&path).unwrap());
        file.set_len(HEADER_REGION_SIZE + 65536 + 1_000_000).unwrap();
        let wal = Arc::new(Mutex::new(WalWriter::new(
            file.clone(),
            HEADER_REGION_SIZE,
            65536,
            0,
            0,
            0,
            WalFsyncPolicy::default(),
        )));
        FrameStore::open(file, wal, HEADER_REGION_SIZE + 65536, Vec::new())
    }

    fn base_config() -> FastRAGConfig {
        FastRAGConfig {
            mode: RagMode::Fast,
            max_context_tokens: 4096,
            expansion_max_tokens: 1024,
            expansion_max_bytes: 16 * 1024,
            snippet_max_tokens: 128,
            max_snippets: 5,
            max_surrogates: 3,
            surrogate_max_tokens: 256,
            search_top_k: 20,
            search_mode: SearchMode::TextOnly,
            rrf_k: 60,
            preview_max_bytes: 256,
        }
    }

    #[test]
    fn empty_index_returns_empty_context() {
        let dir = tempdir().unwrap();
        let store = fresh_store(dir.path());
        let lex = LexIndex::new();
        let config = base_config();
        let context = build_rag_context(&store, &lex, None, "anything", None, &config).unwrap();
        assert!(context.items.is_empty());
        assert_eq!(context.total_tokens, 0);
    }

    #[test]
    fn top_hit_becomes_an_expanded_item() {
        let dir = tempdir().unwrap();
        let mut store = fresh_store(dir.path());
        let lex = LexIndex::new();
        let id = store.put(b"hello durable wax engine", PutOptions::default()).unwrap();
        lex.index(id, "hello durable wax engine");

        let config = base_config();
        let context = build_rag_context(&store, &lex, None, "durable", None, &config).unwrap();
        assert_eq!(context.items.len(), 1);
        assert_eq!(context.items[0].kind, RagItemKind::Expanded);
        assert_eq!(context.items[0].frame_id, id);
    }

    #[test]
    fn fast_mode_never_emits_surrogates() {
        let dir = tempdir().unwrap();
        let mut store = fresh_store(dir.path());
        let lex = LexIndex::new();
        for i in 0..3u64 {
            let id = store.put(format!("shared term {i}").as_bytes(), PutOptions::default()).unwrap();
            lex.index(id, "shared term");
        }

        let config = base_config();
        let context = build_rag_context(&store, &lex, None, "shared", None, &config).unwrap();
        assert!(!context.items.iter().any(|i| i.kind == RagItemKind::Surrogate));
    }

    #[test]
    fn dense_cached_mode_emits_surrogates_after_expansion() {
        let dir = tempdir().unwrap();
        let mut store = fresh_store(dir.path());
        let lex = LexIndex::new();
        for i in 0..3u64 {
            let id = store.put(format!("shared term {i}").as_bytes(), PutOptions::default()).unwrap();
            lex.index(id, "shared term");
        }

        let mut config = base_config();
        config.mode = RagMode::DenseCached;
        let context = build_rag_context(&store, &lex, None, "shared", None, &config).unwrap();
        assert!(context.items.iter().any(|i| i.kind == RagItemKind::Surrogate));
    }

    #[test]
    fn tight_token_budget_stops_early() {
        let dir = tempdir().unwrap();
        let mut store = fresh_store(dir.path());
        let lex = LexIndex::new();
        for i in 0..5u64 {
            let id = store.put(format!("shared term {i}").as_bytes(), PutOptions::default()).unwrap();
            lex.index(id, "shared term");
        }

        let mut config = base_config();
        config.max_context_tokens = 1;
        let context = build_rag_context(&store, &lex, None, "shared", None, &config).unwrap();
        assert!(context.total_tokens <= 1);
        assert!(context.items.len() <= 1);
    }

    #[test]
    fn surrogate_prefers_precomputed_summary_over_preview() {
        let dir = tempdir().unwrap();
        let mut store = fresh_store(dir.path());
        let lex = LexIndex::new();
        let id0 = store.put(b"top hit content", PutOptions::default()).unwrap();
        lex.index(id0, "shared term");
        let options = PutOptions {
            metadata: vec![("summary".to_string(), "a terse summary".to_string())],
            ..Default::default()
        };
        let id1 = store.put(b"second hit content", options).unwrap();
        lex.index(id1, "shared term");

        let mut config = base_config();
        config.mode = RagMode::DenseCached;
        let context = build_rag_context(&store, &lex, None, "shared term", None, &config).unwrap();
        let surrogate = context.items.iter().find(|i| i.kind == RagItemKind::Surrogate).unwrap();
        assert_eq!(surrogate.text, "a terse summary");
    }
}
