//! Language-model backends.
//!
//! - **[`AnthropicClient`]** — `POST /v1/messages`; reads `ANTHROPIC_API_KEY`.
//! - **[`OllamaClient`]** — `POST /api/chat` on a local Ollama instance.
//!
//! Both perform a single non-streaming call per [`LlmClient::complete`];
//! retrying is the caller's job (see [`crate::retry`]). The HTTP client's
//! timeout is `llm.timeout_secs`, and a timeout surfaces as a transient
//! error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::http::{client_with_timeout, post_json};

pub use context_bench_core::llm::*;

const ANTHROPIC_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ============ Anthropic ============

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    url: String,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_URL.to_string());
        Ok(Self {
            client: client_with_timeout(config.timeout())?,
            api_key,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

fn parse_anthropic_response(json: serde_json::Value) -> Result<LlmResponse, LlmError> {
    let resp: AnthropicResponse = serde_json::from_value(json)
        .map_err(|e| LlmError::Fatal(format!("Invalid Anthropic response: {}", e)))?;
    let text = resp
        .content
        .into_iter()
        .filter(|c| c.kind == "text")
        .filter_map(|c| c.text)
        .collect::<Vec<_>>()
        .join("");
    Ok(LlmResponse {
        text,
        input_tokens: resp.usage.input_tokens,
        output_tokens: resp.usage.output_tokens,
    })
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_output_tokens,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
        ];
        let url = format!("{}/v1/messages", self.url);
        let json = post_json(&self.client, &url, &headers, &body).await?;
        parse_anthropic_response(json)
    }
}

// ============ Ollama ============

pub struct OllamaClient {
    client: Client,
    url: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Ok(Self {
            client: client_with_timeout(config.timeout())?,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}

fn parse_ollama_response(json: serde_json::Value) -> Result<LlmResponse, LlmError> {
    let resp: OllamaChatResponse = serde_json::from_value(json)
        .map_err(|e| LlmError::Fatal(format!("Invalid Ollama response: {}", e)))?;
    Ok(LlmResponse {
        text: resp.message.and_then(|m| m.content).unwrap_or_default(),
        input_tokens: resp.prompt_eval_count,
        output_tokens: resp.eval_count,
    })
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "stream": false,
            "options": { "num_predict": request.max_output_tokens },
        });
        let url = format!("{}/api/chat", self.url);
        let json = post_json(&self.client, &url, &[], &body).await?;
        parse_ollama_response(json)
    }
}

/// Create the configured [`LlmClient`].
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
