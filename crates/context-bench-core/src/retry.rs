//! Retry policy for calls to remote endpoints.
//!
//! The policy is pure data; the async `call_with_retry` helper that
//! consumes it lives in the app crate next to the tokio runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BenchError, Result};

/// Upper bound on any single backoff or inter-trial pause.
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// `secs` as a [`Duration`], clamped to `max`.
///
/// Negative and NaN inputs become zero; overflowing or infinite ones
/// become `max`.
pub fn saturating_secs(secs: f64, max: Duration) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).map_or(max, |d| d.min(max))
}

/// Failure classification consumed by retry loops.
pub trait Retryable {
    /// True when the same call may succeed if repeated later.
    fn is_transient(&self) -> bool;
}

/// `max_attempts` total tries; the delay before retry `n` (1-based) is
/// `base_delay × backoff_multiplier^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_multiplier: f64) -> Result<Self> {
        if max_attempts == 0 {
            return Err(BenchError::InvalidParameter(
                "retry.max_attempts must be >= 1".to_string(),
            ));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(BenchError::InvalidParameter(
                "retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            backoff_multiplier,
        })
    }

    /// Delay to wait before retry number `retry` (1 = first retry),
    /// capped at [`MAX_DELAY`].
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exp);
        saturating_secs(secs, MAX_DELAY)
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 1s base delay, doubling.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}
