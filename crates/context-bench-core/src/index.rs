//! Brute-force in-memory vector index.
//!
//! Stores [`EmbeddedChunk`]s in insertion order and answers top-K queries
//! by cosine similarity over every stored vector. The index is built once
//! per run and is read-only afterwards; rebuilding produces a new value
//! rather than merging into the old one.

use crate::embedding::cosine_similarity;
use crate::error::{BenchError, Result};
use crate::models::{Chunk, EmbeddedChunk};

/// A chunk returned from [`VectorIndex::query_scored`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// Build a fresh index from embedded chunks.
    pub fn build(entries: Vec<EmbeddedChunk>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality of the stored vectors, if any are stored.
    pub fn dims(&self) -> Option<usize> {
        self.entries.first().map(|e| e.vector.len())
    }

    /// Return the `k` chunks most similar to `vector`, best first.
    ///
    /// Returns `min(len, k)` chunks. Equal scores keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .query_scored(vector, k)?
            .into_iter()
            .map(|s| s.chunk)
            .collect())
    }

    /// Like [`query`](Self::query) but keeps the similarity scores.
    pub fn query_scored(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(BenchError::InvalidParameter("k must be > 0".to_string()));
        }
        if self.entries.is_empty() {
            return Err(BenchError::IndexNotBuilt);
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(vector, &e.vector)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}
