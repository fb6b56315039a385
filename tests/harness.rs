//! End-to-end tests for the benchmark pipeline.
//!
//! Real strategies, runner, comparator and report, with deterministic
//! in-process fakes standing in for the embedding model and the LLM.

use async_trait::async_trait;
use context_bench::bench_cmd::run_comparison;
use context_bench::config::CorpusConfig;
use context_bench::corpus::{content_hash, DocumentStore};
use context_bench::models::Document;
use context_bench::progress::NoProgress;
use context_bench::report::{self, BenchReport, ConfigSummary};
use context_bench::runner::run_trials;
use context_bench::strategy::{AnsweringStrategy, FullContext, LlmCaller, RetrievalAugmented};
use context_bench::BenchError;
use context_bench_core::cost::Pricing;
use context_bench_core::embedding::Embedder;
use context_bench_core::llm::{LlmClient, LlmError, LlmRequest, LlmResponse};
use context_bench_core::retry::RetryPolicy;
use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ─── Fakes ───────────────────────────────────────────────────────────

/// Answers with a fixed text; input tokens are the prompt's word count.
/// Queued errors are returned first, one per call.
struct ScriptedLlm {
    errors: Mutex<VecDeque<LlmError>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new() -> Arc<Self> {
        Self::failing_with(Vec::new())
    }

    fn failing_with(errors: Vec<LlmError>) -> Arc<Self> {
        Arc::new(Self {
            errors: Mutex::new(errors.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(err) = self.errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(LlmResponse {
            text: "The zebra is striped.".to_string(),
            input_tokens: request.prompt.split_whitespace().count() as u64,
            output_tokens: 5,
        })
    }
}

const VOCABULARY: [&str; 4] = ["zebra", "rocket", "apple", "river"];

/// One dimension per vocabulary word plus a constant bias dimension.
struct KeywordEmbedder {
    batches: AtomicUsize,
}

impl KeywordEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, texts: &[String]) -> context_bench::Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// Keyword vectors, but the first batch (the index build) takes 10s.
struct SlowIndexEmbedder {
    inner: Arc<KeywordEmbedder>,
}

#[async_trait]
impl Embedder for SlowIndexEmbedder {
    fn model_name(&self) -> &str {
        "slow-index"
    }

    async fn embed(&self, texts: &[String]) -> context_bench::Result<Vec<Vec<f32>>> {
        if self.inner.batches.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        self.inner.embed(texts).await
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn filler(word: &str, n: usize) -> String {
    vec![word; n].join(" ")
}

/// Three documents of 600 words; only `b.txt` mentions zebras.
fn corpus() -> Vec<Document> {
    vec![
        Document::new("a.txt", format!("{} rocket launch", filler("lorem", 598))),
        Document::new(
            "b.txt",
            format!("{} the zebra is striped {}", filler("ipsum", 300), filler("ipsum", 296)),
        ),
        Document::new("c.txt", format!("{} apple orchard", filler("dolor", 598))),
    ]
}

fn instant_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::ZERO, 2.0).unwrap()
}

fn caller(llm: Arc<ScriptedLlm>, max_attempts: u32) -> LlmCaller {
    LlmCaller::new(
        llm,
        "test-model",
        256,
        Pricing::per_million(0.80, 4.00),
        instant_retry(max_attempts),
    )
}

fn rag(llm: Arc<ScriptedLlm>, embedder: Arc<KeywordEmbedder>) -> RetrievalAugmented {
    RetrievalAugmented::new(caller(llm, 3), embedder, 100, 10, 2).unwrap()
}

// ─── Strategies ──────────────────────────────────────────────────────

#[tokio::test]
async fn full_context_sends_whole_corpus() {
    let llm = ScriptedLlm::new();
    let strategy = FullContext::new(caller(llm.clone(), 3));

    let result = strategy.answer(&corpus(), "What is striped?").await.unwrap();

    let prompt = llm.last_prompt();
    assert!(prompt.contains("=== Document: a.txt ==="));
    assert!(prompt.contains("=== Document: c.txt ==="));
    assert!(prompt.ends_with("Question: What is striped?"));
    assert!(result.input_tokens > 1800);
    assert_eq!(result.output_tokens, 5);
    let expected = result.input_tokens as f64 * 0.80e-6 + 5.0 * 4.00e-6;
    assert!((result.cost_usd - expected).abs() < 1e-12);
    assert!(result.elapsed_seconds >= 0.0);
}

#[tokio::test]
async fn rag_retrieves_the_relevant_chunk() {
    let llm = ScriptedLlm::new();
    let strategy = rag(llm.clone(), KeywordEmbedder::new());

    let result = strategy.answer(&corpus(), "Which zebra?").await.unwrap();

    let prompt = llm.last_prompt();
    assert!(
        prompt.starts_with("--- Excerpt 1: b.txt (chunk"),
        "unexpected prompt: {}",
        &prompt[..prompt.len().min(200)]
    );
    assert!(prompt.contains("the zebra is striped"));
    assert!(prompt.contains("--- Excerpt 2:"));
    assert!(!prompt.contains("--- Excerpt 3:"));
    assert!(result.input_tokens < 300);
}

#[tokio::test]
async fn rag_index_is_built_once() {
    let llm = ScriptedLlm::new();
    let embedder = KeywordEmbedder::new();
    let strategy = rag(llm, embedder.clone());
    let docs = corpus();

    strategy.prepare(&docs).await.unwrap();
    assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);

    run_trials(&strategy, &docs, "zebra?", 3, 0.0, &NoProgress)
        .await
        .unwrap();
    // One index batch, then one question embedding per trial.
    assert_eq!(embedder.batches.load(Ordering::SeqCst), 4);
    assert_eq!(strategy.index(&docs).await.unwrap().len(), 21);
}

#[tokio::test(start_paused = true)]
async fn rag_lazy_index_build_is_not_timed() {
    let embedder = Arc::new(SlowIndexEmbedder {
        inner: KeywordEmbedder::new(),
    });
    let strategy =
        RetrievalAugmented::new(caller(ScriptedLlm::new(), 3), embedder.clone(), 100, 10, 2)
            .unwrap();
    let docs = corpus();

    let start = tokio::time::Instant::now();
    let result = strategy.answer(&docs, "Which zebra?").await.unwrap();

    // The build really waited on the clock.
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(embedder.inner.batches.load(Ordering::SeqCst), 2);
    assert!(
        result.elapsed_seconds < 1.0,
        "index build leaked into trial time: {}s",
        result.elapsed_seconds
    );
}

// ─── Retry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_errors_are_retried() {
    let llm = ScriptedLlm::failing_with(vec![
        LlmError::Transient("HTTP 429".into()),
        LlmError::Transient("HTTP 529".into()),
    ]);
    let strategy = FullContext::new(caller(llm.clone(), 3));

    let result = strategy.answer(&corpus(), "q").await;
    assert!(result.is_ok());
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_report_attempts() {
    let llm = ScriptedLlm::failing_with(vec![LlmError::Transient("timeout".into()); 3]);
    let strategy = FullContext::new(caller(llm.clone(), 3));

    let err = strategy.answer(&corpus(), "q").await.unwrap_err();
    match err {
        BenchError::AnswerFailed {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, LlmError::Transient("timeout".into()));
        }
        other => panic!("expected AnswerFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let llm = ScriptedLlm::failing_with(vec![LlmError::Fatal("HTTP 401".into())]);
    let strategy = FullContext::new(caller(llm.clone(), 3));

    let err = strategy.answer(&corpus(), "q").await.unwrap_err();
    assert!(matches!(err, BenchError::AnswerFailed { attempts: 1, .. }));
    assert_eq!(llm.calls(), 1);
}

// ─── Runner ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_trials_are_skipped_not_fatal() {
    // No retries: each queued error fails exactly one trial.
    let llm = ScriptedLlm::failing_with(vec![
        LlmError::Fatal("bad".into()),
        LlmError::Fatal("bad".into()),
    ]);
    let strategy = FullContext::new(caller(llm, 1));

    let run = run_trials(&strategy, &corpus(), "q", 5, 0.0, &NoProgress)
        .await
        .unwrap();
    assert_eq!(run.succeeded(), 3);
    assert_eq!(run.skipped(), 2);
    assert_eq!(run.failures[0].iteration, 1);
    assert_eq!(run.failures[1].iteration, 2);
}

#[tokio::test]
async fn all_trials_failing_is_an_error() {
    let llm = ScriptedLlm::failing_with(vec![LlmError::Fatal("bad".into()); 5]);
    let strategy = FullContext::new(caller(llm, 1));

    let err = run_trials(&strategy, &corpus(), "q", 5, 0.0, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::NoSuccessfulTrials { .. }));
}

// ─── Comparison & report ─────────────────────────────────────────────

#[tokio::test]
async fn comparison_reports_rag_savings() {
    let llm = ScriptedLlm::new();
    let embedder = KeywordEmbedder::new();
    let baseline = FullContext::new(caller(llm.clone(), 3));
    let candidate = rag(llm, embedder.clone());
    let docs = corpus();

    let (runs, comparison) = run_comparison(
        &baseline,
        &candidate,
        &docs,
        "Which zebra?",
        3,
        0.0,
        &NoProgress,
        Some(embedder.as_ref() as &dyn Embedder),
    )
    .await
    .unwrap();

    assert_eq!(runs.len(), 2);
    assert_eq!(comparison.baseline, "full-context");
    assert_eq!(comparison.candidate, "rag");
    assert!(comparison.relative_savings["input_tokens"] > 0.8);
    assert!(comparison.relative_savings["cost"] > 0.0);
    assert_eq!(comparison.relative_savings["output_tokens"], 0.0);
    // Identical fake answers embed identically.
    let sim = comparison.answer_similarity.unwrap();
    assert!((sim - 1.0).abs() < 1e-5);

    let config: context_bench::config::Config =
        toml::from_str("[corpus]\nroot = \"docs\"\n").unwrap();
    let summary = ConfigSummary::new(&config, docs.len(), 1800);
    let bench = BenchReport::new("Which zebra?", summary, runs, comparison);

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("report.json");
    report::write_json(&bench, Some(path.as_path())).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["runs"][1]["strategy_name"], "rag");
    assert_eq!(value["runs"][1]["records"].as_array().unwrap().len(), 3);
    assert_eq!(value["config"]["documents"], 3);

    let text = report::render_summary(&bench);
    assert!(text.contains("full-context"));
    assert!(text.contains("3/3"));
}

#[tokio::test]
async fn comparison_propagates_total_failure() {
    let failing = ScriptedLlm::failing_with(vec![LlmError::Fatal("down".into()); 2]);
    let baseline = FullContext::new(caller(failing, 1));
    let candidate = rag(ScriptedLlm::new(), KeywordEmbedder::new());

    let err = run_comparison(
        &baseline,
        &candidate,
        &corpus(),
        "q",
        2,
        0.0,
        &NoProgress,
        None,
    )
    .await
    .unwrap_err();
    assert!(format!("{:#}", err).contains("full-context"));
}

// ─── Corpus ──────────────────────────────────────────────────────────

fn corpus_config(root: &std::path::Path, cache_dir: Option<std::path::PathBuf>) -> CorpusConfig {
    CorpusConfig {
        root: root.to_path_buf(),
        include_globs: vec!["**/*.pdf".to_string(), "**/*.txt".to_string()],
        exclude_globs: vec![],
        cache_dir,
        follow_symlinks: false,
    }
}

#[test]
fn cached_pdf_text_is_used() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    let cache = tmp.path().join("cache");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&cache).unwrap();

    let pdf_bytes = b"%PDF-1.4 placeholder bytes".to_vec();
    fs::write(root.join("report.pdf"), &pdf_bytes).unwrap();
    fs::write(
        cache.join(format!("{}.txt", content_hash(&pdf_bytes))),
        "cached extraction text",
    )
    .unwrap();
    fs::write(root.join("notes.txt"), "plain notes").unwrap();

    let store = DocumentStore::load(&corpus_config(&root, Some(cache))).unwrap();
    let ids: Vec<&str> = store.documents().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["notes.txt", "report.pdf"]);
    assert_eq!(store.documents()[1].text, "cached extraction text");
    assert!(store.skipped().is_empty());
}

#[test]
fn unreadable_pdf_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(root.join("bad.pdf"), b"not a valid pdf").unwrap();
    fs::write(root.join("good.txt"), "This is good.").unwrap();

    let store = DocumentStore::load(&corpus_config(root, None)).unwrap();
    assert_eq!(store.documents().len(), 1);
    assert_eq!(store.documents()[0].id, "good.txt");
    assert_eq!(store.skipped().len(), 1);
    assert_eq!(store.skipped()[0].0, "bad.pdf");
}
