//! Engine configuration, loaded from `wax.toml` next to the data file.
//!
//! A serde-derived struct with per-field defaults, a commented default TOML
//! blob, and `from_file`/`write_to_file`/`write_default_if_missing` helpers.
//! Configuration is split into several nested types rather than one flat
//! module mirrors that shape directly rather than flattening it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use wax_core::{SearchMode, WaxError, WaxResult};
use wax_storage::WalFsyncPolicy;

/// Config file name placed next to the data file.
pub const CONFIG_FILE_NAME: &str = "wax.toml";

/// Which `FastRAGConfig` mode `recall` builds context under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RagMode {
    Fast,
    DenseCached,
}

impl Default for RagMode {
    fn default() -> Self {
        RagMode::Fast
    }
}

/// Token-budgeted RAG context construction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FastRAGConfig {
    pub mode: RagMode,
    pub max_context_tokens: usize,
    pub expansion_max_tokens: usize,
    pub expansion_max_bytes: usize,
    pub snippet_max_tokens: usize,
    pub max_snippets: usize,
    pub max_surrogates: usize,
    pub surrogate_max_tokens: usize,
    pub search_top_k: usize,
    pub search_mode: SearchMode,
    pub rrf_k: u32,
    pub preview_max_bytes: usize,
}

impl Default for FastRAGConfig {
    fn default() -> Self {
        FastRAGConfig {
            mode: RagMode::Fast,
            max_context_tokens: 4096,
            expansion_max_tokens: 1024,
            expansion_max_bytes: 16 * 1024,
            snippet_max_tokens: 128,
            max_snippets: 5,
            max_surrogates: 3,
            surrogate_max_tokens: 256,
            search_top_k: 20,
            search_mode: SearchMode::Hybrid { alpha: 0.5 },
            rrf_k: 60,
            preview_max_bytes: 256,
        }
    }
}

/// Chunking target for `remember`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingStrategy {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        ChunkingStrategy {
            target_tokens: 512,
            overlap_tokens: 64,
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub enable_text_search: bool,
    pub enable_vector_search: bool,
    pub rag: FastRAGConfig,
    pub chunking: ChunkingStrategy,
    /// Worker threads `remember` spreads embedding batches across. Clamped to
    /// at least 1 at the call site rather than rejected at load time.
    pub ingest_concurrency: usize,
    /// Chunks per `embed_batch` call during `remember`. Clamped to at least 1
    /// at the call site.
    pub ingest_batch_size: usize,
    /// Entries kept in the in-process query-embedding cache `recall` reads
    /// and writes through. Zero disables the cache.
    pub embedding_cache_capacity: usize,
    /// Requests the Metal-accelerated vector search backend. No such backend
    /// ships yet, so `WaxEngine::create` logs and falls back to brute-force
    /// rather than erroring.
    pub use_metal_vector_search: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            enable_text_search: true,
            enable_vector_search: true,
            rag: FastRAGConfig::default(),
            chunking: ChunkingStrategy::default(),
            ingest_concurrency: 4,
            ingest_batch_size: 32,
            embedding_cache_capacity: 1024,
            use_metal_vector_search: false,
        }
    }
}

/// File/WAL-level options that don't belong to the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaxOptions {
    pub wal_fsync_policy: WalFsyncPolicy,
    /// Host I/O-scheduler queue label, attached to commit-time tracing
    /// events rather than passed to any OS scheduling call — Wax has no
    /// platform-specific I/O priority backend.
    pub io_queue_label: String,
    /// Host I/O-scheduler QoS class, attached to commit-time tracing events
    /// the same way as `io_queue_label`.
    pub io_qos: String,
}

impl Default for WaxOptions {
    fn default() -> Self {
        WaxOptions {
            wal_fsync_policy: WalFsyncPolicy::default(),
            io_queue_label: "wax".to_string(),
            io_qos: "userInitiated".to_string(),
        }
    }
}

/// The full on-disk config file: orchestrator behavior plus file options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WaxConfig {
    pub orchestrator: OrchestratorConfig,
    pub options: WaxOptions,
}

impl WaxConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Wax engine configuration
#
# [orchestrator]
# enable_text_search = true
# enable_vector_search = true
# ingest_concurrency = 4
# ingest_batch_size = 32
# embedding_cache_capacity = 1024
# use_metal_vector_search = false
#
# [orchestrator.rag]
# mode = "fast"              # or "denseCached"
# max_context_tokens = 4096
# search_top_k = 20
# rrf_k = 60
#
# [orchestrator.chunking]
# target_tokens = 512
# overlap_tokens = 64
#
# [options]
# wal_fsync_policy = "onCommit"   # or "perRecord"
# io_queue_label = "wax"
# io_qos = "userInitiated"
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> WaxResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WaxError::io(format!("reading config file '{}': {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| WaxError::decoding_error(format!("parsing config file '{}': {}", path.display(), e)))
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> WaxResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())
                .map_err(|e| WaxError::io(format!("writing default config file '{}': {}", path.display(), e)))?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> WaxResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| WaxError::encoding_error(format!("serializing config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| WaxError::io(format!("writing config file '{}': {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_hybrid_rag_mode() {
        let config = WaxConfig::default();
        assert_eq!(config.orchestrator.rag.mode, RagMode::Fast);
        assert_eq!(config.options.wal_fsync_policy, WalFsyncPolicy::OnCommit);
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: WaxConfig = toml::from_str(WaxConfig::default_toml()).unwrap();
        assert_eq!(config, WaxConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        WaxConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = WaxConfig::from_file(&path).unwrap();
        assert_eq!(config, WaxConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[options]\nwal_fsync_policy = \"perRecord\"\n").unwrap();

        WaxConfig::write_default_if_missing(&path).unwrap();

        let config = WaxConfig::from_file(&path).unwrap();
        assert_eq!(config.options.wal_fsync_policy, WalFsyncPolicy::PerRecord);
    }

    #[test]
    fn partial_config_uses_defaults_for_missing_fields() {
        let config: WaxConfig = toml::from_str("").unwrap();
        assert_eq!(config, WaxConfig::default());
    }

    #[test]
    fn rag_mode_round_trips_as_camel_case() {
        let toml_str = "mode = \"denseCached\"\n";
        let rag: FastRAGConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(rag.mode, RagMode::DenseCached);
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = WaxConfig::default();
        config.orchestrator.chunking.target_tokens = 256;

        config.write_to_file(&path).unwrap();
        let loaded = WaxConfig::from_file(&path).unwrap();
        assert_eq!(loaded.orchestrator.chunking.target_tokens, 256);
    }
}
