//! SQLite-backed vector store using the `sqlite-vec` extension.
//!
//! Chunks live in a plain `chunks` table keyed by their stable id; vectors
//! live in a `vec0` virtual table keyed by the chunk's rowid. The vector
//! dimension is fixed the first time an entry is written and recorded in
//! `index_meta`, so a later provider swap is detected instead of producing
//! garbage distances.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use super::{IndexEntry, SearchHit, VectorStore};
use crate::types::RagError;

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) the database at `path` and prepares the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path).await.map_err(storage)?;

        // Fail fast if the extension did not load.
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            Ok::<_, tokio_rusqlite::rusqlite::Error>(())
        })
        .await
        .map_err(storage)?;

        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunks (
                     id        TEXT PRIMARY KEY,
                     source_id TEXT NOT NULL,
                     content   TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
                 CREATE TABLE IF NOT EXISTS index_meta (
                     key   TEXT PRIMARY KEY,
                     value TEXT NOT NULL
                 );",
            )?;
            Ok::<_, tokio_rusqlite::rusqlite::Error>(())
        })
        .await
        .map_err(storage)?;

        Ok(Self { conn })
    }

    async fn stored_dimensions(&self) -> Result<Option<usize>, RagError> {
        self.conn
            .call(|conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM index_meta WHERE key = 'dimensions'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(
                    value.and_then(|raw| raw.parse::<usize>().ok()),
                )
            })
            .await
            .map_err(storage)
    }

    /// Creates the vec0 table for `dimensions`-wide vectors and records the
    /// dimension. Idempotent.
    async fn initialize_embeddings(&self, dimensions: usize) -> Result<(), RagError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_embeddings \
                         USING vec0(embedding float[{dimensions}])"
                    ),
                    [],
                )?;
                conn.execute(
                    "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('dimensions', ?1)",
                    [dimensions.to_string().as_str()],
                )?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await
            .map_err(storage)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), RagError> {
        let actual = entry.vector.len();
        match self.stored_dimensions().await? {
            Some(expected) if expected != actual => {
                return Err(RagError::Consistency { expected, actual });
            }
            Some(_) => {}
            None => self.initialize_embeddings(actual).await?,
        }

        let vector_json = serde_json::to_string(&entry.vector)?;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT rowid FROM chunks WHERE id = ?1",
                        [entry.id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                let rowid = match existing {
                    Some(rowid) => {
                        tx.execute(
                            "UPDATE chunks SET source_id = ?1, content = ?2 WHERE id = ?3",
                            [
                                entry.payload.source_id.as_str(),
                                entry.payload.content.as_str(),
                                entry.id.as_str(),
                            ],
                        )?;
                        tx.execute(&format!("DELETE FROM chunk_embeddings WHERE rowid = {rowid}"), [])?;
                        rowid
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO chunks (id, source_id, content) VALUES (?1, ?2, ?3)",
                            [
                                entry.id.as_str(),
                                entry.payload.source_id.as_str(),
                                entry.payload.content.as_str(),
                            ],
                        )?;
                        tx.last_insert_rowid()
                    }
                };
                tx.execute(
                    &format!("INSERT INTO chunk_embeddings (rowid, embedding) VALUES ({rowid}, ?1)"),
                    [vector_json.as_str()],
                )?;
                tx.commit()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(())
            })
            .await
            .map_err(storage)
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError> {
        let Some(expected) = self.stored_dimensions().await? else {
            return Ok(Vec::new());
        };
        if expected != vector.len() {
            return Err(RagError::Consistency {
                expected,
                actual: vector.len(),
            });
        }

        let vector_json = serde_json::to_string(vector)?;
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT c.id, c.source_id, c.content, \
                     vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                     FROM chunks c \
                     JOIN chunk_embeddings e ON e.rowid = c.rowid \
                     ORDER BY distance ASC \
                     LIMIT {k}"
                ))?;
                let rows = stmt.query_map([vector_json.as_str()], |row| {
                    Ok(SearchHit {
                        id: row.get(0)?,
                        source_id: row.get(1)?,
                        content: row.get(2)?,
                        distance: row.get(3)?,
                    })
                })?;
                let mut hits = Vec::new();
                for hit in rows {
                    hits.push(hit?);
                }
                Ok::<_, tokio_rusqlite::rusqlite::Error>(hits)
            })
            .await
            .map_err(storage)
    }

    async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(count as usize)
            })
            .await
            .map_err(storage)
    }

    async fn dimensions(&self) -> Result<Option<usize>, RagError> {
        self.stored_dimensions().await
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize, RagError> {
        let source_id = source_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM chunk_embeddings WHERE rowid IN \
                     (SELECT rowid FROM chunks WHERE source_id = ?1)",
                    [source_id.as_str()],
                )?;
                let deleted =
                    tx.execute("DELETE FROM chunks WHERE source_id = ?1", [source_id.as_str()])?;
                tx.commit()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(deleted)
            })
            .await
            .map_err(storage)
    }
}

fn storage(err: impl std::fmt::Display) -> RagError {
    RagError::Storage(err.to_string())
}

/// Registers the sqlite-vec extension for every connection opened afterwards.
///
/// The registration is process-wide and must happen exactly once; the result
/// of the first attempt is cached and returned to later callers.
fn register_sqlite_vec() -> Result<(), RagError> {
    static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

    let outcome = REGISTRATION.get_or_init(|| unsafe {
        type SqliteExtensionInit = unsafe extern "C" fn(
            *mut ffi::sqlite3,
            *mut *mut c_char,
            *const ffi::sqlite3_api_routines,
        ) -> i32;

        let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
        let init_fn: SqliteExtensionInit =
            transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
        let rc = ffi::sqlite3_auto_extension(Some(init_fn));
        if rc != ffi::SQLITE_OK {
            Err(format!("failed to register sqlite-vec extension (code {rc})"))
        } else {
            Ok(())
        }
    });
    outcome.clone().map_err(RagError::Storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::EntryPayload;
    use tempfile::tempdir;

    fn entry(id: &str, source: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector,
            payload: EntryPayload {
                source_id: source.to_string(),
                content: format!("content of {id}"),
            },
        }
    }

    #[tokio::test]
    async fn upsert_and_search_round_trip() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("t.sqlite")).await.unwrap();

        store.upsert(entry("a_chunk_0", "a", vec![1.0, 0.0, 0.0])).await.unwrap();
        store.upsert(entry("b_chunk_0", "b", vec![0.0, 1.0, 0.0])).await.unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a_chunk_0");
        assert_eq!(hits[0].source_id, "a");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn repeated_upsert_keeps_cardinality() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("t.sqlite")).await.unwrap();

        for _ in 0..3 {
            store.upsert(entry("a_chunk_0", "a", vec![0.5, 0.5])).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 1);

        let hits = store.search(&[0.5, 0.5], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "content of a_chunk_0");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("t.sqlite")).await.unwrap();
        store.upsert(entry("a", "a", vec![1.0, 0.0, 0.0])).await.unwrap();

        let err = store.search(&[1.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::Consistency { expected: 3, actual: 2 }));

        let err = store.upsert(entry("b", "b", vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, RagError::Consistency { .. }));
    }

    #[tokio::test]
    async fn empty_store_searches_empty() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("t.sqlite")).await.unwrap();
        assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert_eq!(store.dimensions().await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_by_source_clears_stale_rows() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("t.sqlite")).await.unwrap();
        store.upsert(entry("a_chunk_0", "a", vec![1.0, 0.0])).await.unwrap();
        store.upsert(entry("a_chunk_1", "a", vec![0.0, 1.0])).await.unwrap();
        store.upsert(entry("b_chunk_0", "b", vec![0.7, 0.7])).await.unwrap();

        assert_eq!(store.delete_by_source("a").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b_chunk_0");
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.sqlite");
        {
            let store = SqliteVectorStore::open(&path).await.unwrap();
            store.upsert(entry("a_chunk_0", "a", vec![1.0, 0.0])).await.unwrap();
        }
        let store = SqliteVectorStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.dimensions().await.unwrap(), Some(2));
    }
}
