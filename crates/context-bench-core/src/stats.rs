//! Trial statistics and strategy comparison.
//!
//! Reduces each strategy's [`TrialRun`] to a [`StrategyStats`] and then
//! compares a candidate strategy against a baseline:
//!
//! ```text
//! savings(m) = (mean_baseline(m) - mean_candidate(m)) / mean_baseline(m)
//! ```
//!
//! A positive ratio means the candidate is cheaper / faster. Savings are
//! undefined when the baseline mean is zero; such metrics are listed in
//! [`ComparisonReport::undefined_savings`] instead of producing `inf` or
//! `NaN`.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{BenchError, Result};
use crate::models::{TrialRecord, TrialRun};

pub const METRIC_TIME: &str = "time";
pub const METRIC_INPUT_TOKENS: &str = "input_tokens";
pub const METRIC_OUTPUT_TOKENS: &str = "output_tokens";
pub const METRIC_COST: &str = "cost";

/// A per-trial quantity whose mean is compared across strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Time,
    InputTokens,
    OutputTokens,
    Cost,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Time,
        Metric::InputTokens,
        Metric::OutputTokens,
        Metric::Cost,
    ];

    /// Key used in [`ComparisonReport::relative_savings`].
    pub fn key(self) -> &'static str {
        match self {
            Metric::Time => METRIC_TIME,
            Metric::InputTokens => METRIC_INPUT_TOKENS,
            Metric::OutputTokens => METRIC_OUTPUT_TOKENS,
            Metric::Cost => METRIC_COST,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Time => "time",
            Metric::InputTokens => "input tokens",
            Metric::OutputTokens => "output tokens",
            Metric::Cost => "cost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStats {
    pub requested: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub time_mean: f64,
    /// Population standard deviation (divides by N).
    pub time_std: f64,
    pub time_min: f64,
    pub time_max: f64,
    pub input_tokens_mean: f64,
    pub output_tokens_mean: f64,
    pub cost_mean: f64,
    pub cost_total: f64,
}

impl StrategyStats {
    /// Aggregate the successful trials of a run.
    ///
    /// Fails with [`BenchError::NoSuccessfulTrials`] when the run has no
    /// records; an empty sample never yields zeroed statistics.
    pub fn from_run(run: &TrialRun) -> Result<Self> {
        let records = &run.records;
        if records.is_empty() {
            return Err(BenchError::NoSuccessfulTrials {
                strategy: run.strategy_name.clone(),
                requested: run.requested,
            });
        }

        let times = project(records, |r| r.result.elapsed_seconds);
        let input = project(records, |r| r.result.input_tokens as f64);
        let output = project(records, |r| r.result.output_tokens as f64);
        let cost = project(records, |r| r.result.cost_usd);

        let time_mean = mean(&times);
        Ok(Self {
            requested: run.requested,
            succeeded: records.len(),
            skipped: run.failures.len(),
            time_mean,
            time_std: std_dev(&times, time_mean),
            time_min: times.iter().copied().fold(f64::INFINITY, f64::min),
            time_max: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            input_tokens_mean: mean(&input),
            output_tokens_mean: mean(&output),
            cost_mean: mean(&cost),
            cost_total: cost.iter().sum(),
        })
    }

    pub fn mean_of(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Time => self.time_mean,
            Metric::InputTokens => self.input_tokens_mean,
            Metric::OutputTokens => self.output_tokens_mean,
            Metric::Cost => self.cost_mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub baseline: String,
    pub candidate: String,
    pub per_strategy_stats: BTreeMap<String, StrategyStats>,
    /// Candidate-vs-baseline savings ratio per metric.
    pub relative_savings: BTreeMap<String, f64>,
    /// Metrics whose baseline mean was zero.
    pub undefined_savings: Vec<String>,
    /// Cosine similarity of the two strategies' first answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_similarity: Option<f32>,
}

impl ComparisonReport {
    pub fn with_answer_similarity(mut self, similarity: f32) -> Self {
        self.answer_similarity = Some(similarity);
        self
    }

    pub fn baseline_stats(&self) -> Option<&StrategyStats> {
        self.per_strategy_stats.get(&self.baseline)
    }

    pub fn candidate_stats(&self) -> Option<&StrategyStats> {
        self.per_strategy_stats.get(&self.candidate)
    }
}

/// Compare `candidate` against `baseline`.
pub fn compare(baseline: &TrialRun, candidate: &TrialRun) -> Result<ComparisonReport> {
    if baseline.strategy_name == candidate.strategy_name {
        return Err(BenchError::InvalidParameter(format!(
            "cannot compare strategy '{}' with itself",
            baseline.strategy_name
        )));
    }

    let stats_a = StrategyStats::from_run(baseline)?;
    let stats_b = StrategyStats::from_run(candidate)?;

    let mut relative_savings = BTreeMap::new();
    let mut undefined_savings = Vec::new();
    for metric in Metric::ALL {
        match relative_saving(stats_a.mean_of(metric), stats_b.mean_of(metric)) {
            Some(ratio) => {
                relative_savings.insert(metric.key().to_string(), ratio);
            }
            None => undefined_savings.push(metric.key().to_string()),
        }
    }

    let mut per_strategy_stats = BTreeMap::new();
    per_strategy_stats.insert(baseline.strategy_name.clone(), stats_a);
    per_strategy_stats.insert(candidate.strategy_name.clone(), stats_b);

    Ok(ComparisonReport {
        baseline: baseline.strategy_name.clone(),
        candidate: candidate.strategy_name.clone(),
        per_strategy_stats,
        relative_savings,
        undefined_savings,
        answer_similarity: None,
    })
}

/// `(baseline - candidate) / baseline`, or `None` when `baseline == 0`.
pub fn relative_saving(baseline: f64, candidate: f64) -> Option<f64> {
    if baseline == 0.0 || !baseline.is_finite() {
        return None;
    }
    Some((baseline - candidate) / baseline)
}

fn project(records: &[TrialRecord], f: impl Fn(&TrialRecord) -> f64) -> Vec<f64> {
    records.iter().map(f).collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
