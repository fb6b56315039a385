//! Core data models — re-exported from `context-bench-core`.

pub use context_bench_core::models::*;
