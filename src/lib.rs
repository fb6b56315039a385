//! # Context Bench
//!
//! **A benchmark harness comparing retrieval-augmented generation against
//! full-context prompting.**
//!
//! Context Bench loads a document corpus, asks a language model the same
//! question repeatedly with two strategies, and reports how they differ in
//! latency, token usage, and dollar cost.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   Corpus    │──▶│    Strategies    │──▶│ Trial Runner │
//! │  PDF / TXT  │   │ full-context/rag │   │  N × answer  │
//! └─────────────┘   └────────┬─────────┘   └──────┬───────┘
//!                            │                    │
//!                  ┌─────────┴────────┐           ▼
//!                  ▼                  ▼     ┌──────────────┐
//!            ┌──────────┐       ┌──────────┐│  Comparator  │
//!            │ Embedder │       │   LLM    ││ stats + JSON │
//!            └──────────┘       └──────────┘└──────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **document store** ([`corpus`]) reads the corpus directory into
//!    [`models::Document`]s, extracting PDF text (cached by content hash).
//! 2. The **RAG strategy** ([`strategy`]) chunks every document
//!    ([`chunk`]), embeds the chunks ([`embedding`]) and builds an
//!    in-memory vector index once.
//! 3. The **trial runner** ([`runner`]) calls a strategy N times, recording
//!    elapsed time, token counts and cost for every successful answer.
//! 4. Statistics and relative savings are computed by the core crate and
//!    rendered by [`report`].
//!
//! ## Quick Start
//!
//! ```bash
//! ctxbench corpus                               # list documents and chunk counts
//! ctxbench retrieve "termination clause"        # inspect retrieval
//! ctxbench ask --strategy rag                   # one answer
//! ctxbench run --iterations 5 --output out.json # full comparison
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types: `Document`, `Chunk`, `QueryResult`, `TrialRun` |
//! | [`corpus`] | Corpus scanning, PDF extraction and text cache |
//! | [`chunk`] | Word-window chunker |
//! | [`embedding`] | Embedder backends: fastembed, Ollama, OpenAI |
//! | [`llm`] | LLM backends: Anthropic Messages API, Ollama chat |
//! | [`http`] | JSON POST helper with transient/fatal error classification |
//! | [`retry`] | Exponential-backoff retry loop |
//! | [`strategy`] | Full-context and retrieval-augmented answering |
//! | [`runner`] | Sequential trial loop |
//! | [`progress`] | Trial progress on stderr (human or JSON) |
//! | [`report`] | Console summary and JSON export |
//! | [`bench_cmd`] | CLI command implementations |
//!
//! ## Configuration
//!
//! Context Bench is configured via a TOML file (default: `config/bench.toml`).
//! See [`config`] for all available options and [`config::load_config`] for
//! validation rules.

pub mod bench_cmd;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod http;
pub mod llm;
pub mod models;
pub mod progress;
pub mod report;
pub mod retry;
pub mod runner;
pub mod strategy;

pub use context_bench_core::{BenchError, Result};
pub use strategy::{AnsweringStrategy, StrategyKind};
