//! Core types shared across the Wax workspace: the error taxonomy, size
//! limits and format constants, the frame data model, and the search/RAG
//! request-response types.
//!
//! Downstream crates (`wax-durability`, `wax-storage`, `wax-search`,
//! `wax-engine`) depend on this crate but not on each other in a cycle.

#![warn(missing_docs)]

pub mod error;
pub mod limits;
pub mod search_types;
pub mod types;

pub use error::{WaxError, WaxResult};
pub use limits::{format_constants, LimitError, Limits};
pub use search_types::{
    sort_hits_by_score_then_id, RagContext, RagItem, RagItemKind, SearchHit, SearchMode,
    SearchRequest, SearchSource,
};
pub use types::{
    CanonicalEncoding, FrameId, FrameMeta, FrameRole, FrameStatus, PutOptions, SimilarityMetric,
    TagPair, VectorEncoding,
};
