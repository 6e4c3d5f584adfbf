//! Vector store backends.
//!
//! A store persists `(id, vector, payload)` triples and answers
//! nearest-neighbor queries. The [`VectorStore`] trait keeps the pipeline
//! independent of any one database:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  └────────┬─────────┘
//!                           │
//!              ┌────────────┴────────────┐
//!              ▼                         ▼
//!       ┌─────────────┐          ┌──────────────┐
//!       │   SQLite    │          │   Memory     │
//!       │ sqlite-vec  │          │ (tests, REPL)│
//!       └─────────────┘          └──────────────┘
//! ```
//!
//! Stores report **cosine distance** (lower is more similar); converting that
//! into a single higher-is-better relevance is the retriever's job, so
//! nothing downstream ever needs store-specific knowledge.
//!
//! `upsert` is keyed by the chunk's stable id: re-writing an id replaces the
//! previous row and vector atomically, which is what makes re-indexing an
//! unchanged document a no-op for store cardinality.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// The payload persisted next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub source_id: String,
    pub content: String,
}

/// One persisted triple, ready for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: EntryPayload,
}

/// One nearest-neighbor hit, in store-native score terms.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub source_id: String,
    pub content: String,
    /// Cosine distance to the query vector; lower is more similar.
    pub distance: f32,
}

/// Persistent index supporting idempotent upsert and nearest-neighbor lookup.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites the entry with this id. The first upsert fixes
    /// the store's vector dimension; later entries with a different
    /// dimension fail with [`RagError::Consistency`].
    async fn upsert(&self, entry: IndexEntry) -> Result<(), RagError>;

    /// Returns up to `k` hits ordered by ascending cosine distance. An empty
    /// store yields an empty result, not an error.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError>;

    /// Number of entries currently stored.
    async fn count(&self) -> Result<usize, RagError>;

    /// Dimension of the stored vectors; `None` while the store is empty.
    async fn dimensions(&self) -> Result<Option<usize>, RagError>;

    /// Removes every entry belonging to one source, returning how many rows
    /// were deleted. Used to clear stale chunks before re-indexing a
    /// document that may have shrunk.
    async fn delete_by_source(&self, source_id: &str) -> Result<usize, RagError>;
}
