//! Orchestration layer for Wax.
//!
//! This crate wires the lower layers (`wax-storage`'s frame store and WAL,
//! `wax-search`'s lex and vector indexes, `wax-durability`'s on-disk format)
//! into the single handle applications hold: [`engine::WaxEngine`].
//!
//! - [`commit`]: the commit coordinator — owns the payload region, the two
//!   indexes, and the header/WAL/TOC/footer commit sequence.
//! - [`lease`]: the single in-process writer lease.
//! - [`config`]: `wax.toml`-backed configuration.
//! - [`tokens`]: the process-wide `cl100k_base` tokenizer.
//! - [`chunking`]: token-budgeted text chunking for `remember`.
//! - [`embedding`]: the injected embedding provider contract.
//! - [`rag`]: the RAG context builder.
//! - [`engine`]: `WaxEngine` itself.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunking;
pub mod commit;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod lease;
pub mod rag;
pub mod tokens;

pub use chunking::{chunk_text, Chunk};
pub use commit::{CommitCoordinator, DEFAULT_WAL_SIZE};
pub use config::{ChunkingStrategy, FastRAGConfig, OrchestratorConfig, RagMode, WaxConfig, WaxOptions};
pub use embedding::{apply_normalization, embed_one, BatchEmbeddingProvider, EmbeddingIdentity, EmbeddingProvider};
pub use engine::{EmbedPolicy, WaxEngine, WaxStats};
pub use lease::{LeasePolicy, WriterLease, WriterLeaseGuard};
pub use rag::build_rag_context;
