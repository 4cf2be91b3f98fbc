//! Injected embedding collaborators: Wax never ships a
//! model, only the contract an embedder must satisfy and the
//! normalization the engine applies on its behalf.

use wax_core::WaxResult;

/// Identifying metadata for an embedding provider, surfaced so callers can
/// tell which model produced the vectors stored in a vector index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingIdentity {
    pub provider: String,
    pub model: String,
    pub dimensions: u32,
    pub normalized: bool,
}

/// A single-text embedder. `remember`/`recall` call
/// `embed` one text at a time unless the provider also implements
/// `BatchEmbeddingProvider`.
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> u32;
    fn normalize(&self) -> bool;
    fn identity(&self) -> EmbeddingIdentity;
    fn embed(&self, text: &str) -> WaxResult<Vec<f32>>;
}

/// An embedder that can amortize per-call overhead across a batch.
/// `embed_batch`'s output length must equal its input length; the engine
/// treats a mismatch as a caller bug, not a recoverable error.
pub trait BatchEmbeddingProvider: EmbeddingProvider {
    fn embed_batch(&self, texts: &[String]) -> WaxResult<Vec<Vec<f32>>>;
}

/// L2-normalize `vector` in place iff `normalize` is set, per the provider's
/// own `normalize()` flag.
pub fn apply_normalization(vector: &mut [f32], normalize: bool) {
    if !normalize {
        return;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for component in vector.iter_mut() {
            *component /= norm;
        }
    }
}

/// Embed `text` through `provider`, applying normalization per its flag.
pub fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> WaxResult<Vec<f32>> {
    let mut vector = provider.embed(text)?;
    apply_normalization(&mut vector, provider.normalize());
    Ok(vector)
}
