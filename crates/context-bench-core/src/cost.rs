//! Token pricing.

use serde::{Deserialize, Serialize};

/// Per-token prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub price_in_per_token: f64,
    pub price_out_per_token: f64,
}

impl Pricing {
    pub fn new(price_in_per_token: f64, price_out_per_token: f64) -> Self {
        Self {
            price_in_per_token,
            price_out_per_token,
        }
    }

    /// Build from the per-million-token prices providers publish.
    pub fn per_million(input: f64, output: f64) -> Self {
        Self::new(input / 1_000_000.0, output / 1_000_000.0)
    }

    /// `input_tokens × price_in + output_tokens × price_out`.
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.price_in_per_token
            + output_tokens as f64 * self.price_out_per_token
    }
}

impl Default for Pricing {
    /// $0.80 / $4.00 per million input / output tokens.
    fn default() -> Self {
        Self::per_million(0.80, 4.00)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_input_only() {
        assert!(close(Pricing::default().calculate_cost(1_000_000, 0), 0.80));
    }

    #[test]
    fn test_output_only() {
        assert!(close(Pricing::default().calculate_cost(0, 1_000_000), 4.00));
    }

    #[test]
    fn test_mixed() {
        assert!(close(Pricing::default().calculate_cost(10_000, 500), 0.01));
    }

    #[test]
    fn test_zero_tokens_free() {
        assert_eq!(Pricing::default().calculate_cost(0, 0), 0.0);
    }
}
