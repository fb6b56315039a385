//! Language-model endpoint seam.
//!
//! [`LlmClient`] is a black-box RPC: one prompt in, text and token usage
//! out. Backends classify their own failures as [`LlmError::Transient`]
//! (worth retrying) or [`LlmError::Fatal`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    /// Rate limiting, server errors, timeouts, dropped connections.
    #[error("transient: {0}")]
    Transient(String),
    /// Authentication, malformed request, undecodable response.
    #[error("{0}")]
    Fatal(String),
}

impl Retryable for LlmError {
    fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider label used in logs and reports (e.g. `"anthropic"`).
    fn provider(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> std::result::Result<LlmResponse, LlmError>;
}
