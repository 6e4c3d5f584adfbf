//! Best-effort chunk indexing.
//!
//! Each chunk is embedded and upserted independently: one bad chunk is
//! recorded in the report and the batch keeps going, so a large indexing run
//! is never invalidated by a single failure. Because chunk ids are stable and
//! the store upserts by id, the whole operation is safe to re-run.

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::stores::{EntryPayload, IndexEntry, VectorStore};
use crate::types::{Chunk, RagError};

/// Outcome of one indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Chunks successfully embedded and upserted.
    pub written: usize,
    /// Chunks that failed, with the failing id and reason.
    pub failed: Vec<IndexFailure>,
}

#[derive(Debug)]
pub struct IndexFailure {
    pub chunk_id: String,
    pub reason: String,
}

/// Turns chunks into `(id, vector, payload)` triples and upserts them.
pub struct IndexWriter {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl IndexWriter {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embeddings, store }
    }

    /// Indexes every chunk, isolating per-chunk failures.
    ///
    /// An empty input is a no-op success. Re-running with unchanged chunks
    /// overwrites identical ids with identical payloads and leaves store
    /// cardinality unchanged.
    pub async fn index(&self, chunks: &[Chunk]) -> IndexReport {
        let mut report = IndexReport::default();
        for chunk in chunks {
            match self.index_chunk(chunk).await {
                Ok(()) => report.written += 1,
                Err(err) => {
                    tracing::warn!(chunk_id = %chunk.id, error = %err, "failed to index chunk");
                    report.failed.push(IndexFailure {
                        chunk_id: chunk.id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            written = report.written,
            failed = report.failed.len(),
            "indexing run complete"
        );
        report
    }

    async fn index_chunk(&self, chunk: &Chunk) -> Result<(), RagError> {
        let vector = self.embeddings.embed(&chunk.content).await?;
        self.store
            .upsert(IndexEntry {
                id: chunk.id.clone(),
                vector,
                payload: EntryPayload {
                    source_id: chunk.source_id.clone(),
                    content: chunk.content.clone(),
                },
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddings;
    use crate::stores::MemoryVectorStore;
    use async_trait::async_trait;

    fn chunk(id: &str, source: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: source.to_string(),
            sequence: 0,
            content: content.to_string(),
        }
    }

    /// Fails on one specific input, succeeds on everything else.
    struct FlakyEmbeddings {
        inner: MockEmbeddings,
        poison: String,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbeddings {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            if text == self.poison {
                return Err(RagError::Embedding("simulated provider outage".into()));
            }
            self.inner.embed(text).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_name(&self) -> &str {
            "flaky-embeddings"
        }
    }

    #[tokio::test]
    async fn empty_input_is_a_noop_success() {
        let writer = IndexWriter::new(
            Arc::new(MockEmbeddings::default()),
            Arc::new(MemoryVectorStore::new()),
        );
        let report = writer.index(&[]).await;
        assert_eq!(report.written, 0);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn indexing_twice_leaves_cardinality_unchanged() {
        let store = Arc::new(MemoryVectorStore::new());
        let writer = IndexWriter::new(Arc::new(MockEmbeddings::default()), store.clone());
        let chunks = vec![
            chunk("doc.txt_chunk_0", "doc.txt", "first part"),
            chunk("doc.txt_chunk_1", "doc.txt", "second part"),
        ];

        let first = writer.index(&chunks).await;
        assert_eq!(first.written, 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let second = writer.index(&chunks).await;
        assert_eq!(second.written, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn one_bad_chunk_does_not_abort_the_batch() {
        let store = Arc::new(MemoryVectorStore::new());
        let writer = IndexWriter::new(
            Arc::new(FlakyEmbeddings {
                inner: MockEmbeddings::default(),
                poison: "bad".to_string(),
            }),
            store.clone(),
        );
        let chunks = vec![
            chunk("a_chunk_0", "a", "good"),
            chunk("a_chunk_1", "a", "bad"),
            chunk("a_chunk_2", "a", "also good"),
        ];

        let report = writer.index(&chunks).await;
        assert_eq!(report.written, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].chunk_id, "a_chunk_1");
        assert!(report.failed[0].reason.contains("simulated provider outage"));
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
