//! Core data model shared across the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw document produced by an ingestion source.
///
/// Immutable once produced; scoped to a single indexing run.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identity of the source (typically the file name).
    pub source_id: String,
    /// Full extracted text of the document.
    pub raw_text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// A bounded contiguous slice of a document's text, the unit of embedding
/// and retrieval.
///
/// `id` is a pure function of `(source_id, sequence)` so re-indexing an
/// unchanged document reproduces identical ids and upserts in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    /// Zero-based position of this chunk within its source.
    pub sequence: usize,
    pub content: String,
}

/// A single retrieval hit after score normalization.
///
/// `relevance` is always higher-is-better; consumers never see the
/// store-native score direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source_id: String,
    pub content: String,
    pub relevance: f32,
}

/// Errors that can occur across the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking or budget parameters. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A single document could not be ingested. Recorded and skipped;
    /// never aborts the batch.
    #[error("ingestion failed for '{source_id}': {reason}")]
    Ingestion { source_id: String, reason: String },

    /// The embedding provider failed for one input.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// The vector store rejected or failed an operation.
    #[error("vector store error: {0}")]
    Storage(String),

    /// The index and the active embedding provider disagree on vector
    /// dimension. Fatal; never silently degraded.
    #[error(
        "embedding dimension mismatch: index holds {expected}-dimensional vectors \
         but the embedding provider produces {actual}"
    )]
    Consistency { expected: usize, actual: usize },

    /// The generation stream failed mid-answer. Recoverable; the session
    /// returns to awaiting the next query.
    #[error("generation error: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
