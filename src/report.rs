//! Benchmark report: console summary and JSON export.
//!
//! The JSON document bundles the question, a summary of the settings that
//! shaped the run, every [`TrialRun`] and the [`ComparisonReport`], so a
//! run can be archived and diffed later. It is written to a file or to
//! stdout for piping.

use anyhow::{Context, Result};
use context_bench_core::models::TrialRun;
use context_bench_core::stats::{ComparisonReport, Metric, StrategyStats};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub question: String,
    /// RFC 3339 timestamp of report creation.
    pub generated_at: String,
    pub config: ConfigSummary,
    pub runs: Vec<TrialRun>,
    pub report: ComparisonReport,
}

/// The settings that influence the numbers in a report.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub documents: usize,
    pub total_words: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embedding_provider: String,
    pub embedding_model: Option<String>,
    pub llm_provider: String,
    pub llm_model: String,
    pub price_in_per_token: f64,
    pub price_out_per_token: f64,
    pub iterations: usize,
    pub inter_trial_delay_secs: f64,
}

impl ConfigSummary {
    pub fn new(config: &Config, documents: usize, total_words: usize) -> Self {
        Self {
            documents,
            total_words,
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            top_k: config.retrieval.top_k,
            embedding_provider: config.embedding.provider.clone(),
            embedding_model: config.embedding.model.clone(),
            llm_provider: config.llm.provider.clone(),
            llm_model: config.llm.model.clone(),
            price_in_per_token: config.llm.price_in_per_token,
            price_out_per_token: config.llm.price_out_per_token,
            iterations: config.trials.iterations,
            inter_trial_delay_secs: config.trials.inter_trial_delay_secs,
        }
    }
}

impl BenchReport {
    pub fn new(
        question: impl Into<String>,
        config: ConfigSummary,
        runs: Vec<TrialRun>,
        report: ComparisonReport,
    ) -> Self {
        Self {
            question: question.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            config,
            runs,
            report,
        }
    }
}

/// Write the report as pretty JSON to `output`, or to stdout when `None`.
pub fn write_json(report: &BenchReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("Wrote report to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Human-readable summary of a comparison.
pub fn render_summary(report: &BenchReport) -> String {
    let cmp = &report.report;
    let mut out = String::new();

    let _ = writeln!(out, "Context Bench — {} vs {}", cmp.baseline, cmp.candidate);
    let _ = writeln!(out, "{}", "=".repeat(48));
    let _ = writeln!(out);
    let _ = writeln!(out, "  Question:  {}", report.question);
    let _ = writeln!(
        out,
        "  Corpus:    {} documents, {} words",
        report.config.documents, report.config.total_words
    );
    let _ = writeln!(out, "  Model:     {}", report.config.llm_model);
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "  {:<14} {:>9} {:>7} {:>16} {:>9} {:>11} {:>11} {:>12}",
        "STRATEGY", "TRIALS", "SKIPPED", "TIME (s)", "MIN/MAX", "IN TOKENS", "OUT TOKENS", "COST ($)"
    );
    let _ = writeln!(out, "  {}", "-".repeat(96));
    for name in [&cmp.baseline, &cmp.candidate] {
        if let Some(stats) = cmp.per_strategy_stats.get(name) {
            let _ = writeln!(out, "  {}", stats_row(name, stats));
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "  Savings of {} vs {}:", cmp.candidate, cmp.baseline);
    for metric in Metric::ALL {
        let value = match cmp.relative_savings.get(metric.key()) {
            Some(ratio) => format!("{:+.1}%", ratio * 100.0),
            None => "undefined (baseline is zero)".to_string(),
        };
        let _ = writeln!(out, "    {:<14} {}", metric.label(), value);
    }

    if let Some(similarity) = cmp.answer_similarity {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Answer similarity: {:.3}", similarity);
    }

    let failures: Vec<_> = report.runs.iter().flat_map(|r| r.failures.iter()).collect();
    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Skipped trials:");
        for f in failures {
            let _ = writeln!(out, "    {} #{}: {}", f.strategy_name, f.iteration, f.error);
        }
    }

    out
}

fn stats_row(name: &str, stats: &StrategyStats) -> String {
    format!(
        "{:<14} {:>9} {:>7} {:>16} {:>9} {:>11.0} {:>11.0} {:>12.6}",
        name,
        format!("{}/{}", stats.succeeded, stats.requested),
        stats.skipped,
        format!("{:.2} ± {:.2}", stats.time_mean, stats.time_std),
        format!("{:.1}/{:.1}", stats.time_min, stats.time_max),
        stats.input_tokens_mean,
        stats.output_tokens_mean,
        stats.cost_mean
    )
}
