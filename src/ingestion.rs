//! Document sources for the indexing pipeline.
//!
//! The core assumes nothing about file formats; a source only has to produce
//! `(source_id, raw_text)` pairs. The shipped [`DirectorySource`] walks a
//! directory tree for plain-text files. Richer extraction (PDF, HTML) lives
//! behind the same trait in external integrations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::types::{Document, RagError};

/// A capability that produces the documents of one indexing run.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<Document>, RagError>;
}

/// Reads `.txt` and `.md` files from a directory tree.
///
/// Files are visited in sorted path order so runs are deterministic. A file
/// that cannot be read is logged and skipped; one bad document never aborts
/// the batch.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn list_documents(&self) -> Result<Vec<Document>, RagError> {
        let mut paths = collect_text_files(&self.root).await?;
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let source_id = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match fs::read_to_string(&path).await {
                Ok(raw_text) => documents.push(Document { source_id, raw_text }),
                Err(err) => {
                    let failure = RagError::Ingestion {
                        source_id,
                        reason: err.to_string(),
                    };
                    tracing::warn!(path = %path.display(), error = %failure, "skipping document");
                }
            }
        }
        Ok(documents)
    }
}

async fn collect_text_files(root: &Path) -> Result<Vec<PathBuf>, RagError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("txt") | Some("md")
            ) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_text_files_in_sorted_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").await.unwrap();
        fs::write(dir.path().join("a.txt"), "first").await.unwrap();
        fs::write(dir.path().join("ignored.bin"), "binary").await.unwrap();

        let source = DirectorySource::new(dir.path());
        let documents = source.list_documents().await.unwrap();
        let ids: Vec<&str> = documents.iter().map(|d| d.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(documents[0].raw_text, "first");
    }

    #[tokio::test]
    async fn walks_nested_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).await.unwrap();
        fs::write(dir.path().join("nested/deep.md"), "nested text")
            .await
            .unwrap();

        let source = DirectorySource::new(dir.path());
        let documents = source.list_documents().await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source_id, "deep.md");
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let source = DirectorySource::new("/definitely/not/a/real/path");
        assert!(source.list_documents().await.is_err());
    }
}
