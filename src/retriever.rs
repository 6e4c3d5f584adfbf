//! Query-time retrieval: embed, check consistency, search, normalize.

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::stores::VectorStore;
use crate::types::{Evidence, RagError};

/// Embeds a query and performs a top-k similarity lookup.
///
/// The retriever owns score normalization: stores report cosine distance
/// (lower is better), evidence carries `relevance = 1 - distance` (higher is
/// better), so downstream consumers see one consistent ordering direction.
pub struct Retriever {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embeddings, store }
    }

    /// Returns up to `k` evidence items, best-first.
    ///
    /// A dimension mismatch between the active embedding provider and a
    /// non-empty store is a fatal [`RagError::Consistency`]; it is detected
    /// before any store query runs and never produces a degraded result. An
    /// empty store yields zero evidence, and fewer than `k` hits is not an
    /// error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Evidence>, RagError> {
        if let Some(expected) = self.store.dimensions().await? {
            let actual = self.embeddings.dimensions();
            if expected != actual {
                return Err(RagError::Consistency { expected, actual });
            }
        }

        let vector = self.embeddings.embed(query).await?;
        let hits = self.store.search(&vector, k).await?;
        tracing::debug!(hits = hits.len(), k, "retrieved evidence");

        Ok(hits
            .into_iter()
            .map(|hit| Evidence {
                source_id: hit.source_id,
                content: hit.content,
                relevance: 1.0 - hit.distance,
            })
            .collect())
    }
}
