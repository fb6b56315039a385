//! CLI command implementations: `corpus`, `retrieve`, `ask` and `run`.
//!
//! Each `run_*` function loads what it needs from [`Config`], wires the
//! configured embedder and LLM client into the strategies, and prints to
//! stdout. [`run_comparison`] is the I/O-free core of `run` and takes its
//! collaborators as arguments.

use anyhow::{bail, Context, Result};
use context_bench_core::chunk::expected_chunk_count;
use context_bench_core::embedding::{answer_similarity, embed_one, Embedder};
use context_bench_core::models::{Document, TrialRun};
use context_bench_core::stats::{compare, ComparisonReport};
use std::path::Path;

use crate::config::Config;
use crate::corpus::DocumentStore;
use crate::embedding::create_embedder;
use crate::llm::create_llm_client;
use crate::progress::{format_number, TrialProgressReporter};
use crate::report::{self, BenchReport, ConfigSummary};
use crate::runner::run_trials;
use crate::strategy::{build_index, create_strategy, AnsweringStrategy, LlmCaller, StrategyKind};

/// Overrides from the `run` command line.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    pub iterations: Option<usize>,
    pub question: Option<String>,
    pub top_k: Option<usize>,
    pub skip_similarity: bool,
}

/// Resolve the question from the command line or `[trials] question`.
pub fn resolve_question(config: &Config, question: Option<String>) -> Result<String> {
    match question.or_else(|| config.trials.question.clone()) {
        Some(q) if !q.trim().is_empty() => Ok(q),
        _ => bail!("No question given. Pass --question or set [trials] question in the config."),
    }
}

/// `ctxbench corpus`: list documents with word and expected chunk counts.
pub fn run_corpus(config: &Config) -> Result<()> {
    let store = DocumentStore::load(&config.corpus)?;
    let size = config.chunking.chunk_size;
    let overlap = config.chunking.chunk_overlap;

    println!("{:<48} {:>10} {:>8}", "DOCUMENT", "WORDS", "CHUNKS");
    println!("{}", "-".repeat(68));
    let mut total_chunks = 0;
    for doc in store.documents() {
        let words = doc.word_count();
        let chunks = expected_chunk_count(words, size, overlap);
        total_chunks += chunks;
        println!(
            "{:<48} {:>10} {:>8}",
            doc.id,
            format_number(words as u64),
            chunks
        );
    }
    println!();
    println!(
        "{} documents, {} words, {} chunks (size {}, overlap {})",
        store.documents().len(),
        format_number(store.total_words() as u64),
        total_chunks,
        size,
        overlap
    );

    for (id, reason) in store.skipped() {
        println!("skipped: {} ({})", id, reason);
    }
    Ok(())
}

/// `ctxbench retrieve`: show the chunks RAG would put in the prompt.
pub async fn run_retrieve(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let store = DocumentStore::load(&config.corpus)?;
    let embedder = create_embedder(&config.embedding)?;
    let k = limit.unwrap_or(config.retrieval.top_k);

    let index = build_index(
        embedder.as_ref(),
        store.documents(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )
    .await?;
    let query_vector = embed_one(embedder.as_ref(), query).await?;
    let results = index.query_scored(&query_vector, k)?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, scored) in results.iter().enumerate() {
        let c = &scored.chunk;
        println!(
            "{}. [{:.3}] {} (chunk {})",
            i + 1,
            scored.score,
            c.source_document_id,
            c.chunk_index
        );
        println!("    excerpt: \"{}\"", excerpt(&c.text, 200));
        println!();
    }
    Ok(())
}

/// `ctxbench ask`: answer the question once with one strategy.
pub async fn run_ask(config: &Config, kind: StrategyKind, question: Option<String>) -> Result<()> {
    let question = resolve_question(config, question)?;
    let store = DocumentStore::load(&config.corpus)?;
    let embedder = create_embedder(&config.embedding)?;
    let llm = LlmCaller::from_config(create_llm_client(&config.llm)?, config)?;
    let strategy = create_strategy(kind, config, llm, embedder)?;

    strategy.prepare(store.documents()).await?;
    let result = strategy
        .answer(store.documents(), &question)
        .await
        .with_context(|| format!("{} failed to answer", kind))?;

    println!("--- Answer ({}) ---", kind);
    println!("{}", result.answer_text.trim());
    println!();
    println!("time:          {:.2}s", result.elapsed_seconds);
    println!("input tokens:  {}", format_number(result.input_tokens));
    println!("output tokens: {}", format_number(result.output_tokens));
    println!("cost:          ${:.6}", result.cost_usd);
    Ok(())
}

/// `ctxbench run`: full-context baseline vs RAG candidate.
pub async fn run_bench(
    config: &Config,
    options: RunOptions,
    output: Option<&Path>,
    reporter: &dyn TrialProgressReporter,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(n) = options.iterations {
        config.trials.iterations = n;
    }
    if let Some(k) = options.top_k {
        config.retrieval.top_k = k;
    }
    crate::config::validate(&config)?;
    let question = resolve_question(&config, options.question)?;

    let store = DocumentStore::load(&config.corpus)?;
    let embedder = create_embedder(&config.embedding)?;
    let llm = LlmCaller::from_config(create_llm_client(&config.llm)?, &config)?;

    let baseline = create_strategy(StrategyKind::FullContext, &config, llm.clone(), embedder.clone())?;
    let candidate = create_strategy(StrategyKind::Rag, &config, llm, embedder.clone())?;
    let similarity = if options.skip_similarity {
        None
    } else {
        Some(embedder.as_ref())
    };

    let (runs, comparison) = run_comparison(
        baseline.as_ref(),
        candidate.as_ref(),
        store.documents(),
        &question,
        config.trials.iterations,
        config.trials.inter_trial_delay_secs,
        reporter,
        similarity,
    )
    .await?;

    let summary = ConfigSummary::new(&config, store.documents().len(), store.total_words());
    let bench = BenchReport::new(question, summary, runs, comparison);

    // With no --output the JSON goes to stdout, so keep the table on stderr.
    let text = report::render_summary(&bench);
    if output.is_some() {
        print!("{}", text);
    } else {
        eprint!("{}", text);
    }
    report::write_json(&bench, output)
}

/// Run both strategies and compare them.
///
/// The baseline runs to completion before the candidate starts. When
/// `similarity_embedder` is set, the first answers of both runs are
/// embedded and their cosine similarity attached to the report; a failure
/// there is logged and leaves the diagnostic unset.
#[allow(clippy::too_many_arguments)]
pub async fn run_comparison(
    baseline: &dyn AnsweringStrategy,
    candidate: &dyn AnsweringStrategy,
    corpus: &[Document],
    question: &str,
    iterations: usize,
    delay_secs: f64,
    reporter: &dyn TrialProgressReporter,
    similarity_embedder: Option<&dyn Embedder>,
) -> Result<(Vec<TrialRun>, ComparisonReport)> {
    let baseline_run = run_trials(baseline, corpus, question, iterations, delay_secs, reporter)
        .await
        .with_context(|| format!("{} trials failed", baseline.name()))?;
    let candidate_run = run_trials(candidate, corpus, question, iterations, delay_secs, reporter)
        .await
        .with_context(|| format!("{} trials failed", candidate.name()))?;

    let mut comparison = compare(&baseline_run, &candidate_run)?;

    if let (Some(embedder), Some(a), Some(b)) = (
        similarity_embedder,
        baseline_run.first_answer(),
        candidate_run.first_answer(),
    ) {
        match answer_similarity(embedder, a, b).await {
            Ok(sim) => comparison = comparison.with_answer_similarity(sim),
            Err(e) => tracing::warn!("Answer similarity unavailable: {}", e),
        }
    }

    Ok((vec![baseline_run, candidate_run], comparison))
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("héllo\nworld", 3), "hél…");
        assert_eq!(excerpt("short", 10), "short");
    }

    #[test]
    fn test_question_resolution_order() {
        let mut config: Config = toml::from_str("[corpus]\nroot = \"docs\"\n").unwrap();
        assert!(resolve_question(&config, None).is_err());
        assert!(resolve_question(&config, Some("  ".to_string())).is_err());

        config.trials.question = Some("from config".to_string());
        assert_eq!(resolve_question(&config, None).unwrap(), "from config");
        assert_eq!(
            resolve_question(&config, Some("from cli".to_string())).unwrap(),
            "from cli"
        );
    }
}
