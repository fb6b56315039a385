//! Overlapping word-window chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` words.
//! Consecutive chunks share exactly `overlap` words so that a sentence
//! straddling a boundary is fully present in at least one chunk.
//!
//! # Algorithm
//!
//! 1. Split text on whitespace into a word list.
//! 2. If the list fits in one window, return the original text as a
//!    single chunk.
//! 3. Otherwise slide a `chunk_size` window forward by
//!    `chunk_size - overlap` words.
//! 4. Clip the last window so it ends exactly at the last word.
//!
//! A document with `n > chunk_size` words yields
//! `ceil((n - overlap) / (chunk_size - overlap))` chunks.
//!
//! # Example
//!
//! ```rust
//! use context_bench_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("doc-1", "one two three four five", 3, 1).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "one two three");
//! assert_eq!(chunks[1].text, "three four five");
//! ```

use crate::error::{BenchError, Result};
use crate::models::{Chunk, Document};

/// Validate a `(chunk_size, overlap)` pair.
pub fn validate_params(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(BenchError::InvalidParameter(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(BenchError::InvalidParameter(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Split `text` into overlapping word windows.
///
/// # Guarantees
///
/// - At least one chunk is returned (even for empty text).
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Every chunk but the first starts `overlap` words before the end of
///   its predecessor.
/// - The final chunk ends at the last word; nothing is truncated or padded.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_params(chunk_size, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= chunk_size {
        return Ok(vec![make_chunk(document_id, 0, text.to_string())]);
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(words.len());
        chunks.push(make_chunk(document_id, chunks.len(), words[start..end].join(" ")));
        if end == words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Chunk every document of a corpus, preserving corpus and source order.
pub fn chunk_corpus(documents: &[Document], chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_params(chunk_size, overlap)?;
    let mut all = Vec::new();
    for doc in documents {
        all.extend(chunk_text(&doc.id, &doc.text, chunk_size, overlap)?);
    }
    Ok(all)
}

/// Number of chunks [`chunk_text`] yields for `word_count` words.
pub fn expected_chunk_count(word_count: usize, chunk_size: usize, overlap: usize) -> usize {
    if word_count <= chunk_size {
        return 1;
    }
    let step = chunk_size - overlap;
    (word_count - overlap).div_ceil(step)
}

fn make_chunk(document_id: &str, index: usize, text: String) -> Chunk {
    Chunk {
        source_document_id: document_id.to_string(),
        chunk_index: index,
        text,
    }
}
