//! Core data models used throughout Context Bench.
//!
//! These types flow from the document store, through chunking and
//! retrieval, into per-trial results and finally into the statistics.

use serde::{Deserialize, Serialize};

/// A loaded corpus document. `id` is the path relative to the corpus root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A word window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_document_id: String,
    pub chunk_index: usize,
    pub text: String,
}

/// A chunk paired with its embedding vector. Owned by the vector index.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Outcome of one language-model call made by an answering strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer_text: String,
    pub elapsed_seconds: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// One successful trial of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub strategy_name: String,
    /// 1-based.
    pub iteration: usize,
    pub result: QueryResult,
}

/// One skipped trial and the error that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFailure {
    pub strategy_name: String,
    pub iteration: usize,
    pub error: String,
}

/// Everything the trial runner produced for one strategy.
///
/// `records` and `failures` are each in iteration order, and together
/// account for every requested iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRun {
    pub strategy_name: String,
    pub requested: usize,
    pub records: Vec<TrialRecord>,
    pub failures: Vec<TrialFailure>,
}

impl TrialRun {
    pub fn new(strategy_name: impl Into<String>, requested: usize) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            requested,
            records: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn skipped(&self) -> usize {
        self.failures.len()
    }

    /// Answer text of the earliest successful trial.
    pub fn first_answer(&self) -> Option<&str> {
        self.records.first().map(|r| r.result.answer_text.as_str())
    }
}
