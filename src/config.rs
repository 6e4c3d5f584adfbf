//! Runtime configuration for indexing runs and query sessions.
//!
//! Configuration is an explicit struct constructed once and passed into each
//! component; there are no process-wide singletons. [`RagConfig::from_env`]
//! reads `GROUNDSMITH_*` variables (a `.env` file is honored via `dotenvy` in
//! the binary) and validates the result before anything else runs.

use std::env;
use std::path::PathBuf;

use crate::types::RagError;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CONTEXT_BUDGET: usize = 8000;
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Directory scanned for plain-text documents in index mode.
    pub docs_dir: PathBuf,
    /// SQLite database holding chunks and their vectors.
    pub db_path: PathBuf,
    /// Base URL of the Ollama server used for embeddings and chat.
    pub ollama_url: String,
    pub embedding_model: String,
    /// Dimension the embedding model produces. All vectors in one index must
    /// share it; a mismatch at query time is a consistency error.
    pub embedding_dimensions: usize,
    pub chat_model: String,
    /// Window size in characters.
    pub chunk_size: usize,
    /// Overlap in characters; must stay strictly below `chunk_size` or the
    /// window never advances.
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Character budget for the assembled context.
    pub context_budget: usize,
    /// Delete each source's existing rows before re-upserting, clearing
    /// stale chunks left by previously longer documents.
    pub reindex: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("./docs"),
            db_path: PathBuf::from("./groundsmith.sqlite"),
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            chat_model: "phi3:mini".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            reindex: false,
        }
    }
}

impl RagConfig {
    /// Builds a configuration from `GROUNDSMITH_*` environment variables,
    /// falling back to defaults for anything unset, then validates it.
    pub fn from_env() -> Result<Self, RagError> {
        let defaults = Self::default();
        let config = Self {
            docs_dir: env_path("GROUNDSMITH_DOCS_DIR", defaults.docs_dir),
            db_path: env_path("GROUNDSMITH_DB", defaults.db_path),
            ollama_url: env_string("GROUNDSMITH_OLLAMA_URL", defaults.ollama_url),
            embedding_model: env_string("GROUNDSMITH_EMBED_MODEL", defaults.embedding_model),
            embedding_dimensions: env_usize(
                "GROUNDSMITH_EMBED_DIMENSIONS",
                defaults.embedding_dimensions,
            )?,
            chat_model: env_string("GROUNDSMITH_CHAT_MODEL", defaults.chat_model),
            chunk_size: env_usize("GROUNDSMITH_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: env_usize("GROUNDSMITH_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: env_usize("GROUNDSMITH_TOP_K", defaults.top_k)?,
            context_budget: env_usize("GROUNDSMITH_CONTEXT_BUDGET", defaults.context_budget)?,
            reindex: env_flag("GROUNDSMITH_REINDEX"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the chunker and assembler rely on.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({}); \
                 otherwise the window never advances and indexing does not terminate",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be positive".into()));
        }
        if self.context_budget == 0 {
            return Err(RagError::Config("context_budget must be positive".into()));
        }
        if self.embedding_dimensions == 0 {
            return Err(RagError::Config(
                "embedding_dimensions must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> Result<usize, RagError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| RagError::Config(format!("{key} must be an integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
