//! Token counting and cost estimation.
//!
//! The estimate is deliberately provider-independent: tokens are approximated
//! by a whitespace word count so the figure is reproducible and never blocks
//! on a billing API. Swap in a real tokenizer through [`TokenCounter`]
//! without touching the accumulation logic.

use crate::config::TierProfile;

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Approximates tokens as whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Cost in USD of one completion under `profile`'s per-1K rates.
pub fn completion_cost(input_tokens: usize, output_tokens: usize, profile: &TierProfile) -> f64 {
    (input_tokens as f64 / 1000.0) * profile.input_rate_per_1k
        + (output_tokens as f64 / 1000.0) * profile.output_rate_per_1k
}

/// Running cost total for one document.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostAccumulator {
    total: f64,
}

impl CostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one paragraph's cost. Negative inputs are ignored so the total
    /// never decreases.
    pub fn add(&mut self, cost: f64) {
        if cost > 0.0 {
            self.total += cost;
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}
