//! # Wax
//!
//! An embedded, on-device memory engine for AI/RAG applications: a single
//! file holding frames (documents and their chunks), a lexical index, and
//! an optional vector index, with a token-budgeted RAG context builder on
//! top.
//!
//! # Quick Start
//!
//! ```no_run
//! use wax::{EmbedPolicy, WaxConfig, WaxEngine};
//!
//! fn main() -> wax::WaxResult<()> {
//!     let mut engine = WaxEngine::create("./memory.wax", WaxConfig::default(), None)?;
//!
//!     engine.remember(
//!         "Wax stores frames in a single file with a lexical and vector index.",
//!         vec![("source".to_string(), "docs".to_string())],
//!     )?;
//!     engine.flush()?;
//!
//!     let context = engine.recall("lexical index", None, EmbedPolicy::Never)?;
//!     for item in &context.items {
//!         println!("{:?}: {}", item.kind, item.text);
//!     }
//!
//!     engine.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `wax-core` | Shared types, error taxonomy, limits, search types |
//! | `wax-durability` | On-disk format: header/footer/TOC, WAL records |
//! | `wax-storage` | File handle, frame store, WAL writer |
//! | `wax-search` | Lexical (BM25) and vector (brute-force/backend) indexes, hybrid fusion |
//! | `wax-engine` | Commit coordinator, writer lease, chunking, RAG context builder, `WaxEngine` |
//!
//! Only this crate's re-exports are considered the stable public surface;
//! the internal crates may change shape between releases.

pub use wax_core::{
    CanonicalEncoding, FrameId, FrameMeta, FrameRole, FrameStatus, LimitError, Limits, PutOptions,
    RagContext, RagItem, RagItemKind, SearchHit, SearchMode, SearchRequest, SearchSource,
    SimilarityMetric, VectorEncoding, WaxError, WaxResult,
};
pub use wax_engine::{
    chunk_text, embed_one, BatchEmbeddingProvider, Chunk, ChunkingStrategy, EmbedPolicy,
    EmbeddingIdentity, EmbeddingProvider, FastRAGConfig, OrchestratorConfig, RagMode, WaxConfig,
    WaxEngine, WaxOptions, WaxStats,
};
pub use wax_search::VectorIndexBackend;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn quick_start_round_trips_through_recall() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.wax");

        let mut engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        engine
            .remember(
                "Wax stores frames in a single file with a lexical and vector index.",
                vec![("source".to_string(), "docs".to_string())],
            )
            .unwrap();
        engine.flush().unwrap();

        let context = engine.recall("lexical index", None, EmbedPolicy::Never).unwrap();
        assert!(!context.items.is_empty());

        engine.close().unwrap();
    }
}
