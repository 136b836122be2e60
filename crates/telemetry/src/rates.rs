//! Built-in cost rate table for common API providers and models.
//!
//! Rates are in USD per 1 000 tokens, keyed by `(provider, model)`. Unknown
//! combinations fall back to a conservative default so metering never fails
//! a tool call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-thousand-token rates for one provider/model combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRates {
    /// Price per 1k input tokens in USD.
    pub input_per_1k: f64,
    /// Price per 1k output tokens in USD.
    pub output_per_1k: f64,
}

impl CostRates {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Fallback rates for unknown provider/model combinations.
pub const DEFAULT_RATES: CostRates = CostRates {
    input_per_1k: 0.001,
    output_per_1k: 0.002,
};

/// Thread-safe rate table with built-in defaults and runtime overrides.
pub struct RateTable {
    rates: RwLock<HashMap<String, CostRates>>,
}

impl RateTable {
    /// Create a rate table with built-in provider/model rates.
    pub fn with_defaults() -> Self {
        let mut rates = HashMap::new();

        // ── OpenAI ─────────────────────────────────────────────────
        rates.insert(key("openai", "gpt-4"), CostRates::new(0.03, 0.06));
        rates.insert(key("openai", "gpt-4-turbo"), CostRates::new(0.01, 0.03));
        rates.insert(key("openai", "gpt-3.5-turbo"), CostRates::new(0.001, 0.002));

        // ── Anthropic ──────────────────────────────────────────────
        rates.insert(
            key("anthropic", "claude-3-opus"),
            CostRates::new(0.015, 0.075),
        );
        rates.insert(
            key("anthropic", "claude-3-sonnet"),
            CostRates::new(0.003, 0.015),
        );
        rates.insert(
            key("anthropic", "claude-3-haiku"),
            CostRates::new(0.00025, 0.00125),
        );

        // ── Google ─────────────────────────────────────────────────
        rates.insert(key("google", "gemini-pro"), CostRates::new(0.001, 0.002));
        rates.insert(key("google", "gemini-ultra"), CostRates::new(0.01, 0.03));

        // ── Azure OpenAI ───────────────────────────────────────────
        rates.insert(key("azure", "gpt-4"), CostRates::new(0.03, 0.06));
        rates.insert(key("azure", "gpt-35-turbo"), CostRates::new(0.001, 0.002));

        Self {
            rates: RwLock::new(rates),
        }
    }

    /// Create an empty rate table.
    pub fn empty() -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// Look up rates for a provider/model pair. Returns None if not found.
    pub fn get(&self, provider: &str, model: &str) -> Option<CostRates> {
        let rates = self.rates.read().unwrap();
        rates.get(&key(provider, model)).cloned()
    }

    /// Add or update rates for a provider/model pair.
    pub fn set(&self, provider: &str, model: &str, rates: CostRates) {
        let mut table = self.rates.write().unwrap();
        table.insert(key(provider, model), rates);
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.rates.read().unwrap().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn key(provider: &str, model: &str) -> String {
    format!("{}_{}", provider.to_lowercase(), model.to_lowercase())
}
