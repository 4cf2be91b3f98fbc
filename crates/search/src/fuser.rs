//! Reciprocal Rank Fusion for combining the lex and vector lanes.
//!
//! Takes ranked lane results and produces one ranked list via RRF, with
//! the tie-break fixed to `(score desc, frame_id asc)`.

use std::collections::HashMap;

use wax_core::{FrameId, SearchSource};

/// Reciprocal Rank Fusion: `rrf_k` defaults to 60.
#[derive(Debug, Clone, Copy)]
pub struct RRFFuser {
    rrf_k: u32,
}

impl Default for RRFFuser {
    fn default() -> Self {
        RRFFuser { rrf_k: 60 }
    }
}

impl RRFFuser {
    pub fn new(rrf_k: u32) -> Self {
        RRFFuser { rrf_k }
    }

    /// Fuse the text and vector lanes. Each lane is independently ranked
    /// (NaN scores sort as 0, ties broken by ascending `frame_id`) before
    /// contributing `weight / (rrf_k + rank)` to its member frames.
    /// `alpha` weights the text lane; `1 - alpha` weights the vector lane.
    pub fn fuse(
        &self,
        text_hits: &[(FrameId, f32)],
        vector_hits: &[(FrameId, f32)],
        alpha: f32,
    ) -> Vec<(FrameId, f32, Vec<SearchSource>)> {
        let alpha = alpha.clamp(0.0, 1.0);
        let mut contributions: HashMap<FrameId, (f32, Vec<SearchSource>)> = HashMap::new();

        for (frame_id, rank) in rank_lane(text_hits) {
            let contribution = alpha / (self.rrf_k as f32 + rank as f32);
            let entry = contributions.entry(frame_id).or_insert((0.0, Vec::new()));
            entry.0 += contribution;
            entry.1.push(SearchSource::Text);
        }

        for (frame_id, rank) in rank_lane(vector_hits) {
            let contribution = (1.0 - alpha) / (self.rrf_k as f32 + rank as f32);
            let entry = contributions.entry(frame_id).or_insert((0.0, Vec::new()));
            entry.0 += contribution;
            if !entry.1.contains(&SearchSource::Vector) {
                entry.1.push(SearchSource::Vector);
            }
        }

        let mut fused: Vec<(FrameId, f32, Vec<SearchSource>)> = contributions
            .into_iter()
            .map(|(frame_id, (score, sources))| (frame_id, score, sources))
            .collect();

        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        fused
    }
}

/// Rank a lane's hits (1-based), sorting by `(score desc, frame_id asc)`
/// with NaN treated as 0.
fn rank_lane(hits: &[(FrameId, f32)]) -> Vec<(FrameId, u32)> {
    let mut sorted: Vec<(FrameId, f32)> = hits
        .iter()
        .map(|(id, score)| (*id, if score.is_nan() { 0.0 } else { *score }))
        .collect();
    sorted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, (id, _))| (id, (i + 1) as u32))
        .collect()
}
