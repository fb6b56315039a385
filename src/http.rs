//! JSON-over-HTTP helpers shared by the embedding and LLM backends.
//!
//! Failures are classified for the retry loop: HTTP 429, 5xx, timeouts
//! and connection errors are transient; other 4xx responses and
//! undecodable bodies are fatal.

use context_bench_core::llm::LlmError;
use context_bench_core::retry::Retryable;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpError {
    #[error("{0} (transient)")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

impl Retryable for HttpError {
    fn is_transient(&self) -> bool {
        matches!(self, HttpError::Transient(_))
    }
}

impl From<HttpError> for LlmError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transient(msg) => LlmError::Transient(msg),
            HttpError::Fatal(msg) => LlmError::Fatal(msg),
        }
    }
}

/// Build a client with a per-request timeout.
pub fn client_with_timeout(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// POST `body` as JSON and decode the JSON response.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &B,
) -> Result<serde_json::Value, HttpError> {
    let mut req = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .json(body);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }

    let resp = req.send().await.map_err(|e| classify_send_error(url, e))?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| classify_send_error(url, e))?;

    if !status.is_success() {
        let msg = format!("POST {} failed: {} {}", url, status, text);
        return if is_retryable_status(status.as_u16()) {
            Err(HttpError::Transient(msg))
        } else {
            Err(HttpError::Fatal(msg))
        };
    }

    serde_json::from_str(&text)
        .map_err(|e| HttpError::Fatal(format!("POST {} decode failed: {} | {}", url, e, text)))
}

/// 408, 429, 529 (overloaded) and any 5xx.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 529) || (500..600).contains(&status)
}

fn classify_send_error(url: &str, e: reqwest::Error) -> HttpError {
    let msg = format!("POST {} failed: {}", url, e);
    if e.is_timeout() || e.is_connect() || e.is_request() {
        HttpError::Transient(msg)
    } else {
        HttpError::Fatal(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for s in [408, 429, 500, 502, 503, 529] {
            assert!(is_retryable_status(s), "{}", s);
        }
        for s in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(s), "{}", s);
        }
    }

    #[test]
    fn test_into_llm_error_keeps_class() {
        let e: LlmError = HttpError::Transient("x".into()).into();
        assert!(e.is_transient());
        let e: LlmError = HttpError::Fatal("y".into()).into();
        assert!(!e.is_transient());
    }

    #[test]
    fn test_display_marks_transient() {
        assert_eq!(HttpError::Transient("HTTP 429".into()).to_string(), "HTTP 429 (transient)");
        assert_eq!(HttpError::Fatal("HTTP 401".into()).to_string(), "HTTP 401");
        let boxed: Box<dyn std::error::Error> = Box::new(HttpError::Fatal("x".into()));
        assert_eq!(boxed.to_string(), "x");
    }
}
