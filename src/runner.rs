//! Trial runner.
//!
//! Runs one strategy `iterations` times against the same corpus and
//! question, sequentially, pausing between calls. Per-trial answer
//! failures are recorded and skipped; everything else aborts the run.

use context_bench_core::error::{BenchError, Result};
use context_bench_core::models::{Document, TrialFailure, TrialRecord, TrialRun};
use context_bench_core::retry::{saturating_secs, MAX_DELAY};

use crate::progress::{TrialProgressEvent, TrialProgressReporter};
use crate::strategy::AnsweringStrategy;

/// Run `strategy` `iterations` times and collect the outcomes.
///
/// Calls [`AnsweringStrategy::prepare`] once before the first trial.
/// Sleeps `delay_secs` between calls, never after the last one.
///
/// # Errors
///
/// - [`BenchError::InvalidParameter`] for zero iterations or a negative /
///   non-finite delay.
/// - [`BenchError::NoSuccessfulTrials`] if every trial failed.
/// - Any non-trial error from the strategy (e.g. embedding unavailable).
pub async fn run_trials(
    strategy: &dyn AnsweringStrategy,
    corpus: &[Document],
    question: &str,
    iterations: usize,
    delay_secs: f64,
    reporter: &dyn TrialProgressReporter,
) -> Result<TrialRun> {
    if iterations == 0 {
        return Err(BenchError::InvalidParameter(
            "iterations must be > 0".to_string(),
        ));
    }
    if !(delay_secs.is_finite() && delay_secs >= 0.0) {
        return Err(BenchError::InvalidParameter(format!(
            "inter-trial delay must be a non-negative number of seconds, got {}",
            delay_secs
        )));
    }
    let delay = saturating_secs(delay_secs, MAX_DELAY);
    let name = strategy.name().to_string();

    strategy.prepare(corpus).await?;

    let mut run = TrialRun::new(name.clone(), iterations);
    for iteration in 1..=iterations {
        reporter.report(TrialProgressEvent::Started {
            strategy: name.clone(),
            iteration,
            total: iterations,
        });

        match strategy.answer(corpus, question).await {
            Ok(result) => {
                tracing::debug!(
                    "{} trial {}: {:.2}s, {} in / {} out tokens, ${:.6}",
                    name,
                    iteration,
                    result.elapsed_seconds,
                    result.input_tokens,
                    result.output_tokens,
                    result.cost_usd
                );
                reporter.report(TrialProgressEvent::Succeeded {
                    strategy: name.clone(),
                    iteration,
                    total: iterations,
                    elapsed_seconds: result.elapsed_seconds,
                    input_tokens: result.input_tokens,
                });
                run.records.push(TrialRecord {
                    strategy_name: name.clone(),
                    iteration,
                    result,
                });
            }
            Err(e) if e.is_trial_failure() => {
                tracing::warn!("{} trial {}/{} skipped: {}", name, iteration, iterations, e);
                reporter.report(TrialProgressEvent::Failed {
                    strategy: name.clone(),
                    iteration,
                    total: iterations,
                    error: e.to_string(),
                });
                run.failures.push(TrialFailure {
                    strategy_name: name.clone(),
                    iteration,
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        if iteration < iterations && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    if run.records.is_empty() {
        return Err(BenchError::NoSuccessfulTrials {
            strategy: name,
            requested: iterations,
        });
    }

    tracing::info!(
        "{}: {}/{} trials succeeded",
        run.strategy_name,
        run.succeeded(),
        run.requested
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use context_bench_core::llm::LlmError;
    use context_bench_core::models::QueryResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails on the listed 1-based calls, succeeds otherwise.
    struct Flaky {
        fail_on: Vec<usize>,
        calls: AtomicUsize,
        prepared: AtomicUsize,
    }

    impl Flaky {
        fn new(fail_on: &[usize]) -> Self {
            Self {
                fail_on: fail_on.to_vec(),
                calls: AtomicUsize::new(0),
                prepared: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnsweringStrategy for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn prepare(&self, _corpus: &[Document]) -> Result<()> {
            self.prepared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn answer(&self, _corpus: &[Document], _question: &str) -> Result<QueryResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&n) {
                return Err(BenchError::AnswerFailed {
                    attempts: 3,
                    last_error: LlmError::Transient("HTTP 529".into()),
                });
            }
            Ok(QueryResult {
                answer_text: format!("answer {}", n),
                elapsed_seconds: 1.0,
                input_tokens: 100,
                output_tokens: 10,
                cost_usd: 0.001,
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl AnsweringStrategy for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn answer(&self, _corpus: &[Document], _question: &str) -> Result<QueryResult> {
            Err(BenchError::EmbeddingUnavailable("model missing".into()))
        }
    }

    fn corpus() -> Vec<Document> {
        vec![Document::new("a.txt", "some text")]
    }

    #[tokio::test]
    async fn test_partial_failures_are_skipped() {
        let strategy = Flaky::new(&[2, 4]);
        let run = run_trials(&strategy, &corpus(), "q", 5, 0.0, &NoProgress)
            .await
            .unwrap();
        assert_eq!(run.requested, 5);
        assert_eq!(run.succeeded(), 3);
        assert_eq!(run.skipped(), 2);
        let iterations: Vec<usize> = run.records.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![1, 3, 5]);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 5);
        assert_eq!(strategy.prepared.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failures_is_an_error() {
        let strategy = Flaky::new(&[1, 2, 3, 4, 5]);
        let err = run_trials(&strategy, &corpus(), "q", 5, 0.0, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BenchError::NoSuccessfulTrials { requested: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_setup_errors_abort() {
        let err = run_trials(&Broken, &corpus(), "q", 3, 0.0, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rejects_bad_parameters() {
        let strategy = Flaky::new(&[]);
        for (iterations, delay) in [(0, 0.0), (1, -1.0), (1, f64::NAN)] {
            let err = run_trials(&strategy, &corpus(), "q", iterations, delay, &NoProgress)
                .await
                .unwrap_err();
            assert!(matches!(err, BenchError::InvalidParameter(_)));
        }
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_trials_only() {
        let strategy = Flaky::new(&[]);
        let start = tokio::time::Instant::now();
        run_trials(&strategy, &corpus(), "q", 3, 2.0, &NoProgress)
            .await
            .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }
}
