//! # Context Bench CLI (`ctxbench`)
//!
//! Compares full-context prompting against retrieval-augmented generation
//! on a local corpus.
//!
//! ## Usage
//!
//! ```bash
//! ctxbench --config ./config/bench.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxbench corpus` | List documents with word and chunk counts |
//! | `ctxbench retrieve "<query>"` | Show the top-K chunks and their scores |
//! | `ctxbench ask --strategy <s>` | Answer the question once with one strategy |
//! | `ctxbench run` | Run both strategies N times and compare |
//! | `ctxbench completions <shell>` | Print shell completions |
//!
//! Logging is controlled with `RUST_LOG` (default `info`) and goes to
//! stderr, as does trial progress.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use context_bench::bench_cmd::{self, RunOptions};
use context_bench::config;
use context_bench::progress::ProgressMode;
use context_bench::strategy::StrategyKind;

/// Context Bench CLI: RAG vs full-context question answering, measured.
///
/// All commands except `completions` read a TOML configuration file.
/// See `config/bench.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ctxbench",
    about = "Context Bench — compare RAG against full-context prompting on time, tokens, and cost",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bench.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List corpus documents with word and expected chunk counts.
    Corpus,

    /// Build the vector index and show the chunks retrieved for a query.
    Retrieve {
        /// The query text.
        query: String,

        /// Number of chunks to show (defaults to `[retrieval] top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer the question once with a single strategy.
    Ask {
        #[arg(long, value_enum)]
        strategy: StrategyKind,

        /// Question to ask (defaults to `[trials] question`).
        #[arg(long)]
        question: Option<String>,
    },

    /// Run both strategies repeatedly and compare them.
    ///
    /// Full-context is the baseline and RAG the candidate. The summary
    /// table is printed, and the JSON report goes to `--output` or stdout.
    Run {
        /// Trials per strategy (overrides `[trials] iterations`).
        #[arg(long)]
        iterations: Option<usize>,

        /// Question to ask (overrides `[trials] question`).
        #[arg(long)]
        question: Option<String>,

        /// Chunks per RAG prompt (overrides `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Write the JSON report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the answer-similarity diagnostic.
        #[arg(long)]
        skip_similarity: bool,

        /// Progress output on stderr (default: human on a TTY, else off).
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "ctxbench", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Corpus => {
            bench_cmd::run_corpus(&cfg)?;
        }
        Commands::Retrieve { query, limit } => {
            bench_cmd::run_retrieve(&cfg, &query, limit).await?;
        }
        Commands::Ask { strategy, question } => {
            bench_cmd::run_ask(&cfg, strategy, question).await?;
        }
        Commands::Run {
            iterations,
            question,
            top_k,
            output,
            skip_similarity,
            progress,
        } => {
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let options = RunOptions {
                iterations,
                question,
                top_k,
                skip_similarity,
            };
            bench_cmd::run_bench(&cfg, options, output.as_deref(), reporter.as_ref()).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
