use anyhow::{bail, Context, Result};
use context_bench_core::chunk;
use context_bench_core::cost::Pricing;
use context_bench_core::retry::{saturating_secs, RetryPolicy, MAX_DELAY};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub trials: TrialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Directory for extracted-text cache files. Disabled when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL override (Anthropic API or Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default = "default_price_in")]
    pub price_in_per_token: f64,
    #[serde(default = "default_price_out")]
    pub price_out_per_token: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            price_in_per_token: default_price_in(),
            price_out_per_token: default_price_out(),
        }
    }
}

fn default_llm_provider() -> String {
    "anthropic".to_string()
}
fn default_llm_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> f64 {
    120.0
}
fn default_price_in() -> f64 {
    Pricing::default().price_in_per_token
}
fn default_price_out() -> f64 {
    Pricing::default().price_out_per_token
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> f64 {
    1.0
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrialsConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_inter_trial_delay_secs")]
    pub inter_trial_delay_secs: f64,
    #[serde(default)]
    pub question: Option<String>,
}

impl Default for TrialsConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            inter_trial_delay_secs: default_inter_trial_delay_secs(),
            question: None,
        }
    }
}

fn default_iterations() -> usize {
    5
}
fn default_inter_trial_delay_secs() -> f64 {
    2.0
}

impl LlmConfig {
    pub fn pricing(&self) -> Pricing {
        Pricing::new(self.price_in_per_token, self.price_out_per_token)
    }

    /// Per-request timeout, capped at [`MAX_LLM_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        saturating_secs(self.timeout_secs, MAX_LLM_TIMEOUT)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new(
            self.max_attempts,
            saturating_secs(self.base_delay_secs, MAX_DELAY),
            self.backoff_multiplier,
        )?)
    }
}

/// Longest accepted `llm.timeout_secs`.
pub const MAX_LLM_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations that would fail later in the run.
pub fn validate(config: &Config) -> Result<()> {
    chunk::validate_params(config.chunking.chunk_size, config.chunking.chunk_overlap)?;

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "local" | "ollama" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or openai.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be >= 1");
    }
    if config.embedding.provider != "local" && config.embedding.model.is_none() {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.llm.provider.as_str() {
        "anthropic" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be anthropic or ollama.",
            other
        ),
    }
    if config.llm.max_output_tokens == 0 {
        bail!("llm.max_output_tokens must be >= 1");
    }
    if !(config.llm.timeout_secs.is_finite() && config.llm.timeout_secs > 0.0) {
        bail!("llm.timeout_secs must be > 0");
    }
    if config.llm.timeout_secs > MAX_LLM_TIMEOUT.as_secs_f64() {
        bail!(
            "llm.timeout_secs must be <= {}",
            MAX_LLM_TIMEOUT.as_secs()
        );
    }
    if config.llm.price_in_per_token < 0.0 || config.llm.price_out_per_token < 0.0 {
        bail!("llm prices must be >= 0");
    }

    if !(config.retry.base_delay_secs.is_finite() && config.retry.base_delay_secs >= 0.0) {
        bail!("retry.base_delay_secs must be >= 0");
    }
    if config.retry.base_delay_secs > MAX_DELAY.as_secs_f64() {
        bail!("retry.base_delay_secs must be <= {}", MAX_DELAY.as_secs());
    }
    config.retry.policy()?;

    if config.trials.iterations == 0 {
        bail!("trials.iterations must be >= 1");
    }
    if !(config.trials.inter_trial_delay_secs.is_finite()
        && config.trials.inter_trial_delay_secs >= 0.0)
    {
        bail!("trials.inter_trial_delay_secs must be >= 0");
    }
    if config.trials.inter_trial_delay_secs > MAX_DELAY.as_secs_f64() {
        bail!(
            "trials.inter_trial_delay_secs must be <= {}",
            MAX_DELAY.as_secs()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg = parse("[corpus]\nroot = \"./docs\"\n").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.chunk_overlap, 50);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay_secs, 1.0);
        assert_eq!(cfg.llm.timeout(), Duration::from_secs(120));
        assert_eq!(cfg.llm.pricing(), Pricing::default());
        assert_eq!(cfg.corpus.include_globs.len(), 3);
        assert!(cfg.corpus.cache_dir.is_none());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let err = parse(
            "[corpus]\nroot = \".\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse("[corpus]\nroot = \".\"\n[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[corpus]\nroot = \".\"\n[llm]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn test_remote_embedding_requires_model() {
        assert!(parse("[corpus]\nroot = \".\"\n[embedding]\nprovider = \"ollama\"\n").is_err());
        assert!(parse(
            "[corpus]\nroot = \".\"\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n"
        )
        .is_ok());
    }

    #[test]
    fn test_trial_bounds() {
        assert!(parse("[corpus]\nroot = \".\"\n[trials]\niterations = 0\n").is_err());
        assert!(parse("[corpus]\nroot = \".\"\n[trials]\ninter_trial_delay_secs = -1.0\n").is_err());
        assert!(parse("[corpus]\nroot = \".\"\n[retry]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn test_huge_durations_rejected_not_panicking() {
        assert!(parse("[corpus]\nroot = \".\"\n[llm]\ntimeout_secs = 1e30\n").is_err());
        assert!(parse("[corpus]\nroot = \".\"\n[retry]\nbase_delay_secs = 1e30\n").is_err());
        assert!(
            parse("[corpus]\nroot = \".\"\n[trials]\ninter_trial_delay_secs = 1e30\n").is_err()
        );

        let llm = LlmConfig {
            timeout_secs: 1e30,
            ..LlmConfig::default()
        };
        assert_eq!(llm.timeout(), MAX_LLM_TIMEOUT);
        let retry = RetryConfig {
            base_delay_secs: 1e30,
            ..RetryConfig::default()
        };
        assert_eq!(retry.policy().unwrap().base_delay, MAX_DELAY);
    }
}
