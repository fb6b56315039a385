//! # Context Bench Core
//!
//! Shared, I/O-free logic for Context Bench: data models, word-window
//! chunking, the in-memory vector index, the cost model, retry policy,
//! and trial statistics.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. The
//! embedding and language-model seams are traits; concrete backends live
//! in the `context-bench` app crate.

pub mod chunk;
pub mod cost;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod retry;
pub mod stats;

pub use error::{BenchError, Result};
