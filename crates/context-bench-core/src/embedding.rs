//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] service that maps text to fixed-length
//! vectors, plus pure similarity helpers. Embedders are passed around as
//! `Arc<dyn Embedder>` so tests can substitute a deterministic fake.
//!
//! Concrete backends (fastembed, Ollama, OpenAI) live in the
//! `context-bench` app crate.

use async_trait::async_trait;

use crate::error::{BenchError, Result};

/// Maps a batch of texts to embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in input order.
    ///
    /// Implementations must send the batch in as few backend calls as the
    /// backend allows, never one call per text.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text. Convenience wrapper around [`Embedder::embed`].
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[text.to_string()]).await?;
    match vectors.len() {
        1 => Ok(vectors.remove(0)),
        n => Err(BenchError::EmbeddingUnavailable(format!(
            "expected 1 embedding, got {}",
            n
        ))),
    }
}

/// Check that a backend returned one vector per input.
pub fn ensure_batch_len(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(BenchError::EmbeddingUnavailable(format!(
            "embedding backend returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    Ok(())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

/// Cosine similarity of two answers' embeddings, as a rough agreement score.
pub async fn answer_similarity(embedder: &dyn Embedder, a: &str, b: &str) -> Result<f32> {
    let vectors = embedder.embed(&[a.to_string(), b.to_string()]).await?;
    ensure_batch_len(&vectors, 2)?;
    Ok(cosine_similarity(&vectors[0], &vectors[1]))
}
