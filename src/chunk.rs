//! Overlapping word-window chunker — re-exported from `context-bench-core`.
//!
//! # Example
//!
//! ```rust
//! use context_bench::chunk::chunk_text;
//!
//! let chunks = chunk_text("doc-123", "a b c d e f g", 4, 1).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].text, "d e f g");
//! ```

pub use context_bench_core::chunk::*;
