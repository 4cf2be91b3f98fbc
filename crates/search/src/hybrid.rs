//! Unified search orchestration across the lex and vector lanes.
//!
//! A stateless orchestrator that runs each lane at the request's `top_k`,
//! then fuses. Wax has exactly two lanes, so this module is a free function
//! rather than a struct holding lane facades. `preview_text` is left empty
//! here — attaching it
//! requires frame content, which lives in `wax-storage`, a layer this
//! crate does not depend on; the caller (`wax-engine`) fills it in.

use wax_core::{SearchHit, SearchMode, SearchRequest, WaxResult};

use crate::fuser::RRFFuser;
use crate::lex::LexIndex;
use crate::vector::VectorIndexBackend;

/// Run a `SearchRequest` against the lex index and, if present, a vector
/// index. Returns hits sorted by `(score desc, frame_id asc)`, with `preview_text` left empty for the caller to fill in.
pub fn unified_search(
    lex: &LexIndex,
    vector: Option<&dyn VectorIndexBackend>,
    request: &SearchRequest,
) -> WaxResult<Vec<SearchHit>> {
    match request.mode {
        SearchMode::TextOnly => {
            let hits = lex.search(&request.query, request.top_k);
            Ok(hits
                .into_iter()
                .map(|(frame_id, score, _)| SearchHit {
                    frame_id,
                    score,
                    sources: vec![wax_core::SearchSource::Text],
                    preview_text: String::new(),
                })
                .collect())
        }
        SearchMode::VectorOnly => {
            let Some(vector) = vector else {
                return Ok(Vec::new());
            };
            let Some(embedding) = &request.embedding else {
                return Ok(Vec::new());
            };
            let hits = vector.search(embedding, request.top_k)?;
            Ok(hits
                .into_iter()
                .map(|(frame_id, score)| SearchHit {
                    frame_id,
                    score,
                    sources: vec![wax_core::SearchSource::Vector],
                    preview_text: String::new(),
                })
                .collect())
        }
        SearchMode::Hybrid { alpha } => {
            let text_hits: Vec<(u64, f32)> = lex
                .search(&request.query, request.top_k)
                .into_iter()
                .map(|(frame_id, score, _)| (frame_id, score))
                .collect();

            let vector_hits: Vec<(u64, f32)> = match (vector, &request.embedding) {
                (Some(vector), Some(embedding)) => vector.search(embedding, request.top_k)?,
                _ => Vec::new(),
            };

            let fuser = RRFFuser::new(request.rrf_k);
            let fused = fuser.fuse(&text_hits, &vector_hits, alpha);
            Ok(fused
                .into_iter()
                .take(request.top_k)
                .map(|(frame_id, score, sources)| SearchHit {
                    frame_id,
                    score,
                    sources,
                    preview_text: String::new(),
                })
                .collect())
        }
    }
}
