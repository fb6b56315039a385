//! Answering strategies.
//!
//! Both strategies implement [`AnsweringStrategy`]: given the corpus and a
//! question they build a prompt, submit it to the language model under the
//! retry policy, and return a timed, costed [`QueryResult`].
//!
//! | Strategy | Prompt contents | Timed span |
//! |----------|-----------------|------------|
//! | [`FullContext`] | every document, in corpus order | LLM call |
//! | [`RetrievalAugmented`] | top-K retrieved chunks | query embedding + retrieval + LLM call |
//!
//! The retrieval strategy builds its vector index once, in
//! [`AnsweringStrategy::prepare`] or lazily on the first answer. Index
//! construction is never part of a trial's elapsed time.

use async_trait::async_trait;
use context_bench_core::chunk::chunk_corpus;
use context_bench_core::cost::Pricing;
use context_bench_core::embedding::{embed_one, ensure_batch_len, Embedder};
use context_bench_core::error::{BenchError, Result};
use context_bench_core::index::VectorIndex;
use context_bench_core::llm::{LlmClient, LlmRequest, LlmResponse};
use context_bench_core::models::{Chunk, Document, EmbeddedChunk, QueryResult};
use context_bench_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::config::Config;

/// The closed set of strategies the harness can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    FullContext,
    Rag,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::FullContext => "full-context",
            StrategyKind::Rag => "rag",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait AnsweringStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// One-time setup before the first trial. Not timed.
    async fn prepare(&self, _corpus: &[Document]) -> Result<()> {
        Ok(())
    }

    async fn answer(&self, corpus: &[Document], question: &str) -> Result<QueryResult>;
}

/// Submits prompts to the model with retry, and prices the responses.
#[derive(Clone)]
pub struct LlmCaller {
    client: Arc<dyn LlmClient>,
    model: String,
    max_output_tokens: u32,
    pricing: Pricing,
    retry: RetryPolicy,
}

impl LlmCaller {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        max_output_tokens: u32,
        pricing: Pricing,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            max_output_tokens,
            pricing,
            retry,
        }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            client,
            config.llm.model.clone(),
            config.llm.max_output_tokens,
            config.llm.pricing(),
            config.retry.policy()?,
        ))
    }

    /// Submit `prompt`, retrying transient failures.
    ///
    /// Exhausted retries and fatal errors both become
    /// [`BenchError::AnswerFailed`] carrying the last error.
    pub async fn submit(&self, prompt: String) -> Result<LlmResponse> {
        let request = LlmRequest {
            model: self.model.clone(),
            prompt,
            max_output_tokens: self.max_output_tokens,
        };
        let label = format!("{} completion", self.client.provider());
        crate::retry::call_with_retry(&self.retry, &label, |_| self.client.complete(&request))
            .await
            .map_err(|e| BenchError::AnswerFailed {
                attempts: e.attempts,
                last_error: e.last_error,
            })
    }

    fn to_result(&self, response: LlmResponse, elapsed: Duration) -> QueryResult {
        QueryResult {
            cost_usd: self
                .pricing
                .calculate_cost(response.input_tokens, response.output_tokens),
            answer_text: response.text,
            elapsed_seconds: elapsed.as_secs_f64(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
        }
    }
}

// ============ Full Context ============

pub struct FullContext {
    llm: LlmCaller,
}

impl FullContext {
    pub fn new(llm: LlmCaller) -> Self {
        Self { llm }
    }
}

/// Every document under a labelled separator, followed by the question.
pub fn build_full_context_prompt(corpus: &[Document], question: &str) -> String {
    let body = corpus
        .iter()
        .map(|doc| format!("=== Document: {} ===\n{}", doc.id, doc.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{}\n\nQuestion: {}", body, question)
}

#[async_trait]
impl AnsweringStrategy for FullContext {
    fn name(&self) -> &str {
        StrategyKind::FullContext.name()
    }

    async fn answer(&self, corpus: &[Document], question: &str) -> Result<QueryResult> {
        let prompt = build_full_context_prompt(corpus, question);
        let start = Instant::now();
        let response = self.llm.submit(prompt).await?;
        Ok(self.llm.to_result(response, start.elapsed()))
    }
}

// ============ Retrieval Augmented ============

pub struct RetrievalAugmented {
    llm: LlmCaller,
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
    top_k: usize,
    index: OnceCell<VectorIndex>,
}

impl RetrievalAugmented {
    pub fn new(
        llm: LlmCaller,
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        chunk_overlap: usize,
        top_k: usize,
    ) -> Result<Self> {
        context_bench_core::chunk::validate_params(chunk_size, chunk_overlap)?;
        if top_k == 0 {
            return Err(BenchError::InvalidParameter("top_k must be > 0".to_string()));
        }
        Ok(Self {
            llm,
            embedder,
            chunk_size,
            chunk_overlap,
            top_k,
            index: OnceCell::new(),
        })
    }

    /// The built index, building it on first use.
    ///
    /// The index belongs to the first corpus it is built from; a strategy
    /// instance serves exactly one corpus.
    pub async fn index(&self, corpus: &[Document]) -> Result<&VectorIndex> {
        self.index
            .get_or_try_init(|| {
                build_index(
                    self.embedder.as_ref(),
                    corpus,
                    self.chunk_size,
                    self.chunk_overlap,
                )
            })
            .await
    }
}

/// Chunk, embed and index a corpus.
pub async fn build_index(
    embedder: &dyn Embedder,
    corpus: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<VectorIndex> {
    let start = Instant::now();
    let chunks = chunk_corpus(corpus, chunk_size, chunk_overlap)?;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed(&texts).await?;
    ensure_batch_len(&vectors, chunks.len())?;

    let entries: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
        .collect();
    let index = VectorIndex::build(entries);
    tracing::info!(
        "Built vector index: {} chunks from {} documents with {} in {:.2}s",
        index.len(),
        corpus.len(),
        embedder.model_name(),
        start.elapsed().as_secs_f64()
    );
    Ok(index)
}

/// Retrieved chunks under labelled separators, followed by the question.
pub fn build_rag_prompt(chunks: &[Chunk], question: &str) -> String {
    let body = chunks
        .iter()
        .enumerate()
        .map(|(rank, c)| {
            format!(
                "--- Excerpt {}: {} (chunk {}) ---\n{}",
                rank + 1,
                c.source_document_id,
                c.chunk_index,
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{}\n\nQuestion: {}", body, question)
}

#[async_trait]
impl AnsweringStrategy for RetrievalAugmented {
    fn name(&self) -> &str {
        StrategyKind::Rag.name()
    }

    async fn prepare(&self, corpus: &[Document]) -> Result<()> {
        self.index(corpus).await.map(|_| ())
    }

    async fn answer(&self, corpus: &[Document], question: &str) -> Result<QueryResult> {
        let index = self.index(corpus).await?;

        let start = Instant::now();
        let query = embed_one(self.embedder.as_ref(), question).await?;
        let chunks = index.query(&query, self.top_k)?;
        tracing::debug!("Retrieved {} chunks for the question", chunks.len());
        let prompt = build_rag_prompt(&chunks, question);
        let response = self.llm.submit(prompt).await?;
        Ok(self.llm.to_result(response, start.elapsed()))
    }
}

/// Build the strategy selected by `kind` from configuration.
pub fn create_strategy(
    kind: StrategyKind,
    config: &Config,
    llm: LlmCaller,
    embedder: Arc<dyn Embedder>,
) -> Result<Box<dyn AnsweringStrategy>> {
    match kind {
        StrategyKind::FullContext => Ok(Box::new(FullContext::new(llm))),
        StrategyKind::Rag => Ok(Box::new(RetrievalAugmented::new(
            llm,
            embedder,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.retrieval.top_k,
        )?)),
    }
}
