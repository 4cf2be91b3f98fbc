//! Retrieval layer for Wax: the BM25 lex index, the dense vector index, and
//! the fusion/orchestration that combines them.
//!
//! - `tokenizer`: shared text tokenization for indexing and query terms.
//! - `lex`: BM25-ranked full-text index over frame `search_text`.
//! - `vector`: dense brute-force vector index and the `MV2V` wire format.
//! - `fuser`: Reciprocal Rank Fusion across the lex and vector lanes.
//! - `hybrid`: runs a `SearchRequest` against whichever lane(s) it names.

#![allow(missing_docs)]

pub mod fuser;
pub mod hybrid;
pub mod lex;
pub mod tokenizer;
pub mod vector;

pub use fuser::RRFFuser;
pub use hybrid::unified_search;
pub use lex::LexIndex;
pub use tokenizer::{tokenize, tokenize_unique};
pub use vector::{score_pair, BruteForceIndex, VectorIndexBackend};
