//! Deterministic sliding-window chunking and stable chunk identity.
//!
//! Chunking is a pure function of its inputs: the same text, size, and
//! overlap always produce byte-identical chunks, independent of locale,
//! file-system order, or wall-clock time. Windows are measured in characters
//! rather than bytes so multi-byte UTF-8 text never splits inside a code
//! point.

use crate::types::{Chunk, Document, RagError};

/// Splits `raw_text` into overlapping windows of at most `size` characters.
///
/// The window starts at offset 0 and advances by `size - overlap` characters
/// until it reaches the end of the text; the last chunk may be shorter than
/// `size`. Empty input yields zero chunks, not one empty chunk, so callers
/// can distinguish "nothing to index" downstream.
///
/// Preconditions: `size > 0` and `overlap < size`. Violations are
/// configuration errors, not panics.
pub fn chunk(raw_text: &str, size: usize, overlap: usize) -> Result<Vec<String>, RagError> {
    if size == 0 {
        return Err(RagError::Config("chunk size must be positive".into()));
    }
    if overlap >= size {
        return Err(RagError::Config(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
        )));
    }
    if raw_text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, plus the end of the text.
    let boundaries: Vec<usize> = raw_text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(raw_text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < total_chars {
        let end = (offset + size).min(total_chars);
        chunks.push(raw_text[boundaries[offset]..boundaries[end]].to_string());
        offset += step;
    }
    Ok(chunks)
}

/// Derives the stable, deterministic id for a chunk of one source.
///
/// Ids for sequences `0..n` of one source are pairwise distinct, and
/// re-running indexing on an unchanged document reproduces identical ids,
/// which is what makes store writes idempotent upserts.
pub fn make_chunk_id(source_id: &str, sequence: usize) -> String {
    format!("{source_id}_chunk_{sequence}")
}

/// Chunks a whole document, attaching source identity and sequence numbers.
pub fn chunk_document(
    document: &Document,
    size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, RagError> {
    let pieces = chunk(&document.raw_text, size, overlap)?;
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(sequence, content)| Chunk {
            id: make_chunk_id(&document.source_id, sequence),
            source_id: document.source_id.clone(),
            sequence,
            content,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_zero_chunks() {
        assert!(chunk("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = chunk("This is a test document.", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["This is a test document.".to_string()]);
    }

    #[test]
    fn fifteen_hundred_chars_split_in_two() {
        let text = "a".repeat(1500);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1000);
        // Second window starts at 800 and runs to the end.
        assert_eq!(chunks[1].len(), 700);
    }

    #[test]
    fn windows_overlap_by_the_configured_amount() {
        let text: String = ('a'..='z').cycle().take(30).collect();
        let chunks = chunk(&text, 10, 4).unwrap();
        for pair in chunks.windows(2) {
            let len = pair[0].chars().count();
            let tail: String = pair[0].chars().skip(len - 4).collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn multibyte_text_never_splits_a_code_point() {
        let text = "héllo wörld ".repeat(40);
        let chunks = chunk(&text, 50, 10).unwrap();
        for piece in &chunks {
            assert!(piece.chars().count() <= 50);
        }
        assert!(!chunks.is_empty());
    }

    #[test]
    fn zero_overlap_tiles_the_text_exactly() {
        let text = "abcdefghij";
        let chunks = chunk(text, 4, 0).unwrap();
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn overlap_equal_to_size_is_rejected() {
        assert!(matches!(chunk("abc", 5, 5), Err(RagError::Config(_))));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(chunk("abc", 0, 0), Err(RagError::Config(_))));
    }

    #[test]
    fn ids_are_stable_and_distinct() {
        assert_eq!(make_chunk_id("doc.pdf", 0), "doc.pdf_chunk_0");
        assert_eq!(make_chunk_id("doc.pdf", 0), make_chunk_id("doc.pdf", 0));
        let ids: Vec<String> = (0..10).map(|i| make_chunk_id("doc.pdf", i)).collect();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }

    #[test]
    fn chunk_document_attaches_identity() {
        let doc = Document::new("test.pdf", "This is a test document.");
        let chunks = chunk_document(&doc, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "test.pdf_chunk_0");
        assert_eq!(chunks[0].source_id, "test.pdf");
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].content, "This is a test document.");
    }

    #[test]
    fn chunk_document_on_empty_doc_is_empty() {
        let doc = Document::new("empty.txt", "");
        assert!(chunk_document(&doc, 1000, 200).unwrap().is_empty());
    }
}
