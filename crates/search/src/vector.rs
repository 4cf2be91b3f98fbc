//! Dense brute-force vector index.
//!
//! The `VectorIndexBackend` trait is the pluggable seam, with
//! `BTreeMap`-backed contiguous storage for deterministic iteration order
//! and `(score desc, frame_id asc)` tie-breaking in `search`. Score
//! formulas: `score = -distance` for `L2`/`Dot`, `score = 1 -
//! cosine_distance` for `Cosine`.

use std::collections::BTreeMap;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use wax_core::format_constants::VECTOR_SEGMENT_MAGIC;
use wax_core::{FrameId, SimilarityMetric, VectorEncoding, WaxError, WaxResult};

/// Current on-disk version of the `MV2V` vector segment format.
pub const VECTOR_SEGMENT_VERSION: u16 = 1;

/// Swappable vector index backend. Only `BruteForceIndex` ships in this workspace; an ANN/graph
/// engine is an explicit extension point, not a Non-goal.
pub trait VectorIndexBackend: Send + Sync {
    fn dimension(&self) -> u32;
    fn metric(&self) -> SimilarityMetric;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn add(&mut self, frame_id: FrameId, vector: Vec<f32>) -> WaxResult<()>;
    fn remove(&mut self, frame_id: FrameId) -> bool;
    fn search(&self, query: &[f32], top_k: usize) -> WaxResult<Vec<(FrameId, f32)>>;
    /// Serialize to this backend's on-disk segment format, for the commit
    /// coordinator to write into a fresh segment. Staging is
    /// free for `BruteForceIndex` — it always recomputes from current
    /// in-memory state — so there is no separate stage/commit split here.
    fn serialize_segment(&self) -> WaxResult<Vec<u8>>;
}

/// Score one pair of vectors under a similarity metric:
/// `score = -distance` for `L2`/`Dot`, `score = 1 - cosine_distance` for
/// `Cosine` (equivalently, cosine similarity itself).
pub fn score_pair(metric: SimilarityMetric, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(query, candidate),
        SimilarityMetric::Dot => dot_product(query, candidate),
        SimilarityMetric::L2 => -euclidean_distance(query, candidate),
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product(a, b) / (norm_a * norm_b)
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Dense brute-force engine: vectors are kept contiguous in `frame_id`
/// order, suitable for a future GPU-backed encoder targeting the same
/// `MV2V` format.
pub struct BruteForceIndex {
    dimension: u32,
    metric: SimilarityMetric,
    vectors: BTreeMap<FrameId, Vec<f32>>,
}

impl BruteForceIndex {
    pub fn new(dimension: u32, metric: SimilarityMetric) -> Self {
        BruteForceIndex {
            dimension,
            metric,
            vectors: BTreeMap::new(),
        }
    }

    /// Serialize to the `MV2V` format. Always uses the
    /// `DenseGpu` encoding tag since this engine keeps vectors contiguous
    /// (the reason the trailing frame-id table is required at all: a
    /// contiguous float payload carries no per-vector identity of its own).
    pub fn serialize(&self) -> WaxResult<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&VECTOR_SEGMENT_MAGIC);
        out.write_u16::<LittleEndian>(VECTOR_SEGMENT_VERSION)?;
        out.write_u8(VectorEncoding::DenseGpu.as_tag())?;
        out.write_u8(self.metric.as_tag())?;
        out.write_u32::<LittleEndian>(self.dimension)?;
        out.write_u64::<LittleEndian>(self.vectors.len() as u64)?;

        let payload_length = self.vectors.len() as u64 * self.dimension as u64 * 4;
        out.write_u64::<LittleEndian>(payload_length)?;
        out.extend_from_slice(&[0u8; 8]);

        for vector in self.vectors.values() {
            for component in vector {
                out.write_f32::<LittleEndian>(*component)?;
            }
        }

        out.write_u64::<LittleEndian>(self.vectors.len() as u64)?;
        for frame_id in self.vectors.keys() {
            out.write_u64::<LittleEndian>(*frame_id)?;
        }

        Ok(out)
    }

    /// Deserialize a previously-serialized `MV2V` blob.
    pub fn deserialize(bytes: &[u8]) -> WaxResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        std::io::Read::read_exact(&mut cursor, &mut magic)
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
        if magic != VECTOR_SEGMENT_MAGIC {
            return Err(WaxError::decoding_error("vector segment: bad magic"));
        }

        let version = cursor
            .read_u16::<LittleEndian>()
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
        if version != VECTOR_SEGMENT_VERSION {
            return Err(WaxError::decoding_error(format!(
                "vector segment: unsupported version {version}"
            )));
        }

        let encoding_tag = cursor
            .read_u8()
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
        let encoding = VectorEncoding::from_tag(encoding_tag)
            .ok_or_else(|| WaxError::decoding_error("vector segment: bad encoding tag"))?;

        let similarity_tag = cursor
            .read_u8()
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
        let metric = SimilarityMetric::from_tag(similarity_tag)
            .ok_or_else(|| WaxError::decoding_error("vector segment: bad similarity tag"))?;

        let dimension = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
        let vector_count = cursor
            .read_u64::<LittleEndian>()
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
        let _payload_length = cursor
            .read_u64::<LittleEndian>()
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;

        let mut reserved = [0u8; 8];
        std::io::Read::read_exact(&mut cursor, &mut reserved)
            .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;

        let mut payload = Vec::with_capacity(vector_count as usize);
        for _ in 0..vector_count {
            let mut vector = Vec::with_capacity(dimension as usize);
            for _ in 0..dimension {
                vector.push(
                    cursor
                        .read_f32::<LittleEndian>()
                        .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?,
                );
            }
            payload.push(vector);
        }

        let frame_ids = if encoding == VectorEncoding::DenseGpu {
            let table_len = cursor
                .read_u64::<LittleEndian>()
                .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?;
            let mut ids = Vec::with_capacity(table_len as usize);
            for _ in 0..table_len {
                ids.push(
                    cursor
                        .read_u64::<LittleEndian>()
                        .map_err(|e| WaxError::decoding_error(format!("vector segment: {e}")))?,
                );
            }
            ids
        } else {
            return Err(WaxError::decoding_error(
                "vector segment: non-dense encoding has no engine implementation",
            ));
        };

        if frame_ids.len() != payload.len() {
            return Err(WaxError::decoding_error(
                "vector segment: frame-id table length mismatch",
            ));
        }

        let mut index = BruteForceIndex::new(dimension, metric);
        for (frame_id, vector) in frame_ids.into_iter().zip(payload.into_iter()) {
            index.vectors.insert(frame_id, vector);
        }
        Ok(index)
    }
}

impl VectorIndexBackend for BruteForceIndex {
    fn dimension(&self) -> u32 {
        self.dimension
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn add(&mut self, frame_id: FrameId, vector: Vec<f32>) -> WaxResult<()> {
        if vector.len() as u32 != self.dimension {
            return Err(WaxError::dimension_mismatch(self.dimension, vector.len() as u32));
        }
        self.vectors.insert(frame_id, vector);
        Ok(())
    }

    fn remove(&mut self, frame_id: FrameId) -> bool {
        self.vectors.remove(&frame_id).is_some()
    }

    fn search(&self, query: &[f32], top_k: usize) -> WaxResult<Vec<(FrameId, f32)>> {
        if query.len() as u32 != self.dimension {
            return Err(WaxError::dimension_mismatch(self.dimension, query.len() as u32));
        }
        if top_k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<(FrameId, f32)> = self
            .vectors
            .iter()
            .map(|(frame_id, vector)| (*frame_id, score_pair(self.metric, query, vector)))
            .collect();

        results.sort_by(|(id_a, score_a), (id_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });
        results.truncate(top_k);
        Ok(results)
    }

    fn serialize_segment(&self) -> WaxResult<Vec<u8>> {
        self.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors_score_one() {
        let score = score_pair(SimilarityMetric::Cosine, &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_identical_vectors_score_zero() {
        let score = score_pair(SimilarityMetric::L2, &[1.0, 2.0], &[1.0, 2.0]);
        assert!((score - 0.0).abs() < 1e-6);
    }

    #[test]
    fn l2_distant_vectors_score_very_negative() {
        let score = score_pair(SimilarityMetric::L2, &[0.0, 0.0], &[100.0, 0.0]);
        assert!(score < -50.0);
    }

    #[test]
    fn dot_product_scores_directly() {
        let score = score_pair(SimilarityMetric::Dot, &[1.0, 0.0], &[2.0, 0.0]);
        assert!((score - 2.0).abs() < 1e-6);
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = BruteForceIndex::new(3, SimilarityMetric::Cosine);
        assert!(index.add(1, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let mut index = BruteForceIndex::new(3, SimilarityMetric::Cosine);
        index.add(1, vec![1.0, 0.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 10).is_err());
    }

    #[test]
    fn search_orders_by_score_desc_then_id_asc() {
        let mut index = BruteForceIndex::new(2, SimilarityMetric::L2);
        index.add(3, vec![5.0, 0.0]).unwrap();
        index.add(1, vec![0.0, 0.0]).unwrap();
        index.add(2, vec![0.0, 0.0]).unwrap();

        let hits = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 3);
    }

    #[test]
    fn remove_excludes_from_search() {
        let mut index = BruteForceIndex::new(2, SimilarityMetric::Cosine);
        index.add(1, vec![1.0, 0.0]).unwrap();
        index.add(2, vec![0.0, 1.0]).unwrap();
        assert!(index.remove(1));
        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 2);
    }

    #[test]
    fn serialize_then_deserialize_round_trips() {
        let mut index = BruteForceIndex::new(2, SimilarityMetric::Cosine);
        index.add(1, vec![1.0, 0.0]).unwrap();
        index.add(2, vec![0.0, 1.0]).unwrap();

        let bytes = index.serialize().unwrap();
        let restored = BruteForceIndex::deserialize(&bytes).unwrap();

        assert_eq!(restored.dimension(), 2);
        assert_eq!(restored.metric(), SimilarityMetric::Cosine);
        assert_eq!(restored.len(), 2);
        let hits = restored.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn deserialize_rejects_bad_magic() {
        let bytes = vec![0u8; 40];
        assert!(BruteForceIndex::deserialize(&bytes).is_err());
    }
}
