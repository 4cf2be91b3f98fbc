//! `WaxEngine`: the orchestrator handle applications hold.
//!
//! Wires together the commit coordinator, the writer lease, chunking, the
//! injected embedder, and the RAG context builder: one struct owning a
//! coordinator plus configuration, exposing a small public surface
//! (`remember`/`recall`/`flush`/`close`).

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wax_core::{FrameId, FrameRole, PutOptions, RagContext, SimilarityMetric, WaxError, WaxResult};
use wax_search::BruteForceIndex;

use crate::chunking::chunk_text;
use crate::commit::CommitCoordinator;
use crate::config::WaxConfig;
use crate::embedding::{apply_normalization, embed_one, BatchEmbeddingProvider};
use crate::lease::{LeasePolicy, WriterLease};
use crate::rag::build_rag_context;

/// How `recall` should source a query embedding when the caller doesn't
/// supply one directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPolicy {
    /// Never embed the query; hybrid search runs as text-only in effect.
    Never,
    /// Embed the query if an embedder is configured; otherwise proceed
    /// without one.
    IfAvailable,
    /// Require an embedding. Fails if vector search is disabled or no
    /// embedder is configured.
    Always,
}

/// Coarse engine statistics, for `verify`/diagnostics call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaxStats {
    pub frame_count: usize,
    pub generation: u64,
}

/// Bounded FIFO cache of query text to its resolved embedding, sized by
/// `OrchestratorConfig::embedding_cache_capacity`. A capacity of zero makes
/// every `insert` a no-op.
struct QueryEmbeddingCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Vec<f32>>,
}

impl QueryEmbeddingCache {
    fn new(capacity: usize) -> Self {
        QueryEmbeddingCache {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, query: &str) -> Option<Vec<f32>> {
        self.entries.get(query).cloned()
    }

    fn insert(&mut self, query: &str, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(query) {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(query.to_string());
        }
        self.entries.insert(query.to_string(), vector);
    }
}

/// The orchestrator handle: one per open Wax file, owning the sole writer
/// path into it.
pub struct WaxEngine {
    coordinator: CommitCoordinator,
    lease: WriterLease,
    config: WaxConfig,
    embedder: Option<Box<dyn BatchEmbeddingProvider>>,
    query_embedding_cache: Mutex<QueryEmbeddingCache>,
}

impl WaxEngine {
    /// Create a brand-new Wax file and, if vector search is enabled and an
    /// embedder is supplied, configure a vector index sized to its
    /// dimensionality.
    pub fn create(
        path: impl AsRef<Path>,
        config: WaxConfig,
        embedder: Option<Box<dyn BatchEmbeddingProvider>>,
    ) -> WaxResult<Self> {
        if config.orchestrator.use_metal_vector_search {
            warn!("use_metal_vector_search is set but no Metal backend is compiled in; using brute-force vector search");
        }
        let mut coordinator = CommitCoordinator::create(path)?;
        if config.orchestrator.enable_vector_search {
            if let Some(provider) = &embedder {
                coordinator.configure_vector_index(Box::new(BruteForceIndex::new(
                    provider.dimensions(),
                    SimilarityMetric::Cosine,
                )));
            }
        }
        let cache = Mutex::new(QueryEmbeddingCache::new(config.orchestrator.embedding_cache_capacity));
        Ok(WaxEngine {
            coordinator,
            lease: WriterLease::new(),
            config,
            embedder,
            query_embedding_cache: cache,
        })
    }

    /// Open an existing Wax file. `repair` tolerates a torn trailing WAL
    /// record.
    pub fn open(
        path: impl AsRef<Path>,
        repair: bool,
        config: WaxConfig,
        embedder: Option<Box<dyn BatchEmbeddingProvider>>,
    ) -> WaxResult<Self> {
        if config.orchestrator.use_metal_vector_search {
            warn!("use_metal_vector_search is set but no Metal backend is compiled in; using brute-force vector search");
        }
        let coordinator = CommitCoordinator::open(path, repair)?;
        let cache = Mutex::new(QueryEmbeddingCache::new(config.orchestrator.embedding_cache_capacity));
        Ok(WaxEngine {
            coordinator,
            lease: WriterLease::new(),
            config,
            embedder,
            query_embedding_cache: cache,
        })
    }

    /// Chunk `content` per the configured `ChunkingStrategy`, append a
    /// `role=document` parent frame and `role=chunk` children, and index
    /// text and/or vectors as configured.
    pub fn remember(&mut self, content: &str, metadata: Vec<(String, String)>) -> WaxResult<FrameId> {
        let _guard = self.lease.acquire(LeasePolicy::Wait)?;

        let text_search = self.config.orchestrator.enable_text_search;
        let vector_search = self.config.orchestrator.enable_vector_search;

        let doc_options = PutOptions {
            role: Some(FrameRole::Document),
            search_text: text_search.then(|| content.to_string()),
            metadata,
            ..Default::default()
        };
        let doc_id = self.coordinator.put_frame(content.as_bytes(), doc_options)?;

        let chunks = chunk_text(content, self.config.orchestrator.chunking);
        let chunk_count = chunks.len() as u32;

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        let mut chunk_texts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let options = PutOptions {
                role: Some(FrameRole::Chunk),
                parent_id: Some(doc_id),
                chunk_index: Some(chunk.index),
                chunk_count: Some(chunk_count),
                search_text: text_search.then(|| chunk.text.clone()),
                ..Default::default()
            };
            let chunk_id = self.coordinator.put_frame(chunk.text.as_bytes(), options)?;
            chunk_ids.push(chunk_id);
            chunk_texts.push(chunk.text.clone());
        }

        if vector_search {
            if let Some(provider) = &self.embedder {
                let mut vectors = self.embed_in_batches(provider.as_ref(), &chunk_texts)?;
                if vectors.len() != chunk_texts.len() {
                    return Err(WaxError::decoding_error(format!(
                        "embed_batch returned {} vectors for {} inputs",
                        vectors.len(),
                        chunk_texts.len()
                    )));
                }
                for vector in vectors.iter_mut() {
                    apply_normalization(vector, provider.normalize());
                }
                for (chunk_id, vector) in chunk_ids.into_iter().zip(vectors.into_iter()) {
                    self.coordinator.stage_embedding(chunk_id, vector)?;
                }
            }
        }

        Ok(doc_id)
    }

    /// Embed `texts` in groups of `ingest_batch_size`, spread across up to
    /// `ingest_concurrency` worker threads. Batch order is preserved in the
    /// returned vector regardless of which worker finishes first.
    fn embed_in_batches(&self, provider: &dyn BatchEmbeddingProvider, texts: &[String]) -> WaxResult<Vec<Vec<f32>>> {
        let batch_size = self.config.orchestrator.ingest_batch_size.max(1);
        let batches: Vec<&[String]> = texts.chunks(batch_size).collect();
        if batches.is_empty() {
            return Ok(Vec::new());
        }

        let concurrency = self.config.orchestrator.ingest_concurrency.max(1).min(batches.len());
        if concurrency <= 1 {
            let mut vectors = Vec::with_capacity(texts.len());
            for batch in &batches {
                vectors.extend(provider.embed_batch(batch)?);
            }
            return Ok(vectors);
        }

        let mut ordered: Vec<Option<WaxResult<Vec<Vec<f32>>>>> = (0..batches.len()).map(|_| None).collect();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..concurrency)
                .map(|worker| {
                    let batches = &batches;
                    scope.spawn(move || {
                        let mut results = Vec::new();
                        let mut index = worker;
                        while index < batches.len() {
                            results.push((index, provider.embed_batch(batches[index])));
                            index += concurrency;
                        }
                        results
                    })
                })
                .collect();
            for handle in handles {
                for (index, result) in handle.join().expect("embedding worker thread panicked") {
                    ordered[index] = Some(result);
                }
            }
        });

        let mut vectors = Vec::with_capacity(texts.len());
        for slot in ordered {
            vectors.extend(slot.expect("every batch index assigned to a worker")?);
        }
        Ok(vectors)
    }

    /// Build a `RAGContext` for `query`.
    pub fn recall(
        &self,
        query: &str,
        query_embedding: Option<Vec<f32>>,
        policy: EmbedPolicy,
    ) -> WaxResult<RagContext> {
        let embedding = self.resolve_query_embedding(query, query_embedding, policy)?;
        build_rag_context(
            self.coordinator.frame_store(),
            self.coordinator.lex(),
            self.coordinator.vector(),
            query,
            embedding,
            &self.config.orchestrator.rag,
        )
    }

    fn resolve_query_embedding(
        &self,
        query: &str,
        query_embedding: Option<Vec<f32>>,
        policy: EmbedPolicy,
    ) -> WaxResult<Option<Vec<f32>>> {
        if let Some(embedding) = query_embedding {
            return Ok(Some(embedding));
        }
        match policy {
            EmbedPolicy::Never => Ok(None),
            EmbedPolicy::IfAvailable => match &self.embedder {
                Some(provider) => Ok(Some(self.embed_query_cached(provider.as_ref(), query)?)),
                None => Ok(None),
            },
            EmbedPolicy::Always => {
                if !self.config.orchestrator.enable_vector_search {
                    return Err(WaxError::io(
                        "recall policy 'always' requires vector search to be enabled",
                    ));
                }
                match &self.embedder {
                    Some(provider) => Ok(Some(self.embed_query_cached(provider.as_ref(), query)?)),
                    None => Err(WaxError::io(
                        "recall policy 'always' requires a configured embedding provider",
                    )),
                }
            }
        }
    }

    /// `embed_one`, reading and writing through the query-embedding cache
    /// first so repeated queries skip the embedder entirely.
    fn embed_query_cached(&self, provider: &dyn crate::embedding::EmbeddingProvider, query: &str) -> WaxResult<Vec<f32>> {
        if let Some(cached) = self.query_embedding_cache.lock().get(query) {
            return Ok(cached);
        }
        let vector = embed_one(provider, query)?;
        self.query_embedding_cache.lock().insert(query, vector.clone());
        Ok(vector)
    }

    /// Stage indexes and commit.
    pub fn flush(&mut self) -> WaxResult<()> {
        let _guard = self.lease.acquire(LeasePolicy::Wait)?;
        debug!(
            io_queue_label = %self.config.options.io_queue_label,
            io_qos = %self.config.options.io_qos,
            "committing wax file"
        );
        self.coordinator.commit()
    }

    /// Re-hash every active frame's stored bytes against its checksums. A
    /// shallow verify (`deep=false`) reports no failures: header, footer,
    /// and TOC checksums are already validated by `open`/`create`, so there
    /// is nothing further to check without touching payload bytes.
    pub fn verify(&self, deep: bool) -> WaxResult<Vec<FrameId>> {
        if deep {
            self.coordinator.frame_store().verify_deep()
        } else {
            Ok(Vec::new())
        }
    }

    pub fn stats(&self) -> WaxStats {
        WaxStats {
            frame_count: self.coordinator.frame_store().frames().len(),
            generation: self.coordinator.generation(),
        }
    }

    /// `flush` then release the file lock by dropping the coordinator.
    pub fn close(mut self) -> WaxResult<()> {
        self.flush()?;
        info!("closing wax engine");
        self.coordinator.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wax_core::WaxResult as Result;

    struct StubEmbedder {
        dimensions: u32,
    }

    impl crate::embedding::EmbeddingProvider for StubEmbedder {
        fn dimensions(&self) -> u32 {
            self.dimensions
        }

        fn normalize(&self) -> bool {
            true
        }

        fn identity(&self) -> crate::embedding::EmbeddingIdentity {
            crate::embedding::EmbeddingIdentity {
                provider: "stub".to_string(),
                model: "stub-model".to_string(),
                dimensions: self.dimensions,
                normalized: true,
            }
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    impl BatchEmbeddingProvider for StubEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts.iter().map(|t| self.embed(t)).collect()
        }
    }

    #[test]
    fn remember_appends_document_and_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        engine.remember("hello durable wax", Vec::new()).unwrap();
        engine.flush().unwrap();
        let stats = engine.stats();
        assert!(stats.frame_count >= 2);
    }

    #[test]
    fn recall_never_policy_runs_without_embedding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        engine.remember("hello durable wax", Vec::new()).unwrap();
        engine.flush().unwrap();

        let context = engine.recall("durable", None, EmbedPolicy::Never).unwrap();
        assert!(!context.items.is_empty());
    }

    #[test]
    fn recall_always_without_embedder_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        let err = engine.recall("hello", None, EmbedPolicy::Always).unwrap_err();
        assert!(matches!(err, WaxError::Io(_)));
    }

    #[test]
    fn remember_with_embedder_stages_vectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let embedder: Box<dyn BatchEmbeddingProvider> = Box::new(StubEmbedder { dimensions: 2 });
        let mut engine = WaxEngine::create(&path, WaxConfig::default(), Some(embedder)).unwrap();
        engine.remember("hello durable wax", Vec::new()).unwrap();
        engine.flush().unwrap();
    }

    #[test]
    fn close_flushes_and_releases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        engine.remember("hello wax", Vec::new()).unwrap();
        engine.close().unwrap();

        let reopened = WaxEngine::open(&path, false, WaxConfig::default(), None).unwrap();
        assert!(reopened.stats().frame_count >= 2);
    }

    struct CountingEmbedder {
        dimensions: u32,
        batch_calls: std::sync::atomic::AtomicUsize,
        embed_calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingEmbedder {
        fn new(dimensions: u32) -> Self {
            CountingEmbedder {
                dimensions,
                batch_calls: std::sync::atomic::AtomicUsize::new(0),
                embed_calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl crate::embedding::EmbeddingProvider for CountingEmbedder {
        fn dimensions(&self) -> u32 {
            self.dimensions
        }

        fn normalize(&self) -> bool {
            false
        }

        fn identity(&self) -> crate::embedding::EmbeddingIdentity {
            crate::embedding::EmbeddingIdentity {
                provider: "counting".to_string(),
                model: "counting-model".to_string(),
                dimensions: self.dimensions,
                normalized: false,
            }
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    impl BatchEmbeddingProvider for CountingEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            texts.iter().map(|t| self.embed(t)).collect()
        }
    }

    struct SharedCountingEmbedder(std::sync::Arc<CountingEmbedder>);

    impl crate::embedding::EmbeddingProvider for SharedCountingEmbedder {
        fn dimensions(&self) -> u32 {
            self.0.dimensions()
        }

        fn normalize(&self) -> bool {
            self.0.normalize()
        }

        fn identity(&self) -> crate::embedding::EmbeddingIdentity {
            self.0.identity()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.0.embed(text)
        }
    }

    impl BatchEmbeddingProvider for SharedCountingEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0.embed_batch(texts)
        }
    }

    #[test]
    fn remember_groups_embed_batch_calls_by_ingest_batch_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut config = WaxConfig::default();
        config.orchestrator.ingest_batch_size = 1;
        config.orchestrator.ingest_concurrency = 1;
        config.orchestrator.chunking.target_tokens = 1;
        config.orchestrator.chunking.overlap_tokens = 0;

        let shared = std::sync::Arc::new(CountingEmbedder::new(2));
        let embedder: Box<dyn BatchEmbeddingProvider> = Box::new(SharedCountingEmbedder(shared.clone()));
        let mut engine = WaxEngine::create(&path, config, Some(embedder)).unwrap();
        engine.remember("alpha beta gamma delta", Vec::new()).unwrap();
        engine.flush().unwrap();

        assert_eq!(shared.batch_calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[test]
    fn recall_reuses_cached_query_embedding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        engine.remember("hello durable wax", Vec::new()).unwrap();
        engine.flush().unwrap();

        let provider = CountingEmbedder::new(2);
        engine.query_embedding_cache = Mutex::new(QueryEmbeddingCache::new(8));

        engine.embed_query_cached(&provider, "durable").unwrap();
        engine.embed_query_cached(&provider, "durable").unwrap();
        assert_eq!(provider.embed_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_capacity_cache_never_caches() {
        let mut cache = QueryEmbeddingCache::new(0);
        cache.insert("q", vec![1.0]);
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn reopen_after_close_preserves_generation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wax.db");
        let mut engine = WaxEngine::create(&path, WaxConfig::default(), None).unwrap();
        engine.remember("hello wax", Vec::new()).unwrap();
        let gen_before = engine.stats().generation;
        engine.close().unwrap();

        let reopened = WaxEngine::open(&path, false, WaxConfig::default(), None).unwrap();
        assert_eq!(reopened.stats().generation, gen_before + 1);
    }
}
