//! In-memory vector store for tests and ephemeral runs.
//!
//! Brute-force cosine search over a hash map. Same contract as the SQLite
//! backend, no persistence.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{EntryPayload, IndexEntry, SearchHit, VectorStore};
use crate::types::RagError;

#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    dimensions: Option<usize>,
    entries: HashMap<String, (Vec<f32>, EntryPayload)>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), RagError> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        match inner.dimensions {
            Some(expected) if expected != entry.vector.len() => {
                return Err(RagError::Consistency {
                    expected,
                    actual: entry.vector.len(),
                });
            }
            None => inner.dimensions = Some(entry.vector.len()),
            _ => {}
        }
        inner.entries.insert(entry.id, (entry.vector, entry.payload));
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        if let Some(expected) = inner.dimensions {
            if expected != vector.len() {
                return Err(RagError::Consistency {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        let mut hits: Vec<SearchHit> = inner
            .entries
            .iter()
            .map(|(id, (stored, payload))| SearchHit {
                id: id.clone(),
                source_id: payload.source_id.clone(),
                content: payload.content.clone(),
                distance: cosine_distance(vector, stored),
            })
            .collect();
        // Tie-break on id so results are deterministic across runs.
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, RagError> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner.entries.len())
    }

    async fn dimensions(&self) -> Result<Option<usize>, RagError> {
        let inner = self.inner.lock().expect("memory store mutex poisoned");
        Ok(inner.dimensions)
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize, RagError> {
        let mut inner = self.inner.lock().expect("memory store mutex poisoned");
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, (_, payload)| payload.source_id != source_id);
        Ok(before - inner.entries.len())
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}
