//! Shared search/RAG request and response types.

use crate::types::FrameId;
use serde::{Deserialize, Serialize};

/// Which retrieval lane(s) a search request should run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SearchMode {
    TextOnly,
    VectorOnly,
    /// Hybrid fusion; `alpha` weights the text lane, `1 - alpha` the vector lane.
    Hybrid { alpha: f32 },
}

impl SearchMode {
    /// Clamp `alpha` into `[0, 1]`.
    pub fn hybrid(alpha: f32) -> Self {
        SearchMode::Hybrid {
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}

/// A single-query retrieval request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub embedding: Option<Vec<f32>>,
    pub mode: SearchMode,
    pub top_k: usize,
    pub rrf_k: u32,
    pub preview_max_bytes: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            query: String::new(),
            embedding: None,
            mode: SearchMode::TextOnly,
            top_k: 10,
            rrf_k: 60,
            preview_max_bytes: 256,
        }
    }
}

/// Which lane(s) contributed to a fused search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchSource {
    Text,
    Vector,
    Timeline,
    StructuredMemory,
}

/// One ranked result from unified search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub frame_id: FrameId,
    pub score: f32,
    pub sources: Vec<SearchSource>,
    pub preview_text: String,
}

/// Sort hits by the tie-break rule used throughout the spec: higher score
/// first, ties broken by smaller `frame_id` first. NaN scores sort as 0.
pub fn sort_hits_by_score_then_id(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        let score_a = if a.score.is_nan() { 0.0 } else { a.score };
        let score_b = if b.score.is_nan() { 0.0 } else { b.score };
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.frame_id.cmp(&b.frame_id))
    });
}

/// What kind of content a RAG context item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RagItemKind {
    Expanded,
    Surrogate,
    Snippet,
}

/// One item of assembled RAG context.
#[derive(Debug, Clone, PartialEq)]
pub struct RagItem {
    pub kind: RagItemKind,
    pub frame_id: FrameId,
    pub score: f32,
    pub sources: Vec<SearchSource>,
    pub text: String,
    pub tokens: usize,
}

/// The deterministic, token-budgeted retrieval result returned by `recall`.
#[derive(Debug, Clone, PartialEq)]
pub struct RagContext {
    pub query: String,
    pub items: Vec<RagItem>,
    pub total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_alpha_is_clamped() {
        assert_eq!(SearchMode::hybrid(1.5), SearchMode::Hybrid { alpha: 1.0 });
        assert_eq!(SearchMode::hybrid(-1.0), SearchMode::Hybrid { alpha: 0.0 });
    }

    #[test]
    fn tie_break_by_frame_id() {
        let mut hits = vec![
            SearchHit {
                frame_id: 5,
                score: 1.0,
                sources: vec![],
                preview_text: String::new(),
            },
            SearchHit {
                frame_id: 2,
                score: 1.0,
                sources: vec![],
                preview_text: String::new(),
            },
        ];
        sort_hits_by_score_then_id(&mut hits);
        assert_eq!(hits[0].frame_id, 2);
        assert_eq!(hits[1].frame_id, 5);
    }

    #[test]
    fn nan_score_sorts_as_zero() {
        let mut hits = vec![
            SearchHit {
                frame_id: 1,
                score: f32::NAN,
                sources: vec![],
                preview_text: String::new(),
            },
            SearchHit {
                frame_id: 2,
                score: 0.5,
                sources: vec![],
                preview_text: String::new(),
            },
        ];
        sort_hits_by_score_then_id(&mut hits);
        assert_eq!(hits[0].frame_id, 2);
    }
}
