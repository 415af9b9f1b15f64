//! Per-assistant pricing table.
//!
//! Prices are in USD per 1 thousand tokens. Each assistant has an input and
//! output price reflecting its underlying model. Overrides can be applied at
//! runtime from TOML config.

use hikewise_core::{AssistantId, Usage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Per-thousand-token pricing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// Price per 1K input tokens in USD.
    pub input_per_k: f64,
    /// Price per 1K output tokens in USD.
    pub output_per_k: f64,
}

impl Rates {
    pub fn new(input_per_k: f64, output_per_k: f64) -> Self {
        Self {
            input_per_k,
            output_per_k,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_k
            + (output_tokens as f64 / 1000.0) * self.output_per_k
    }
}

/// Thread-safe pricing table with built-in defaults and overrides.
pub struct PricingTable {
    rates: RwLock<HashMap<AssistantId, Rates>>,
}

impl PricingTable {
    /// Built-in rates: the research assistant runs on the large model, the
    /// coaching assistant on the small one.
    pub fn with_defaults() -> Self {
        let mut rates = HashMap::new();
        rates.insert(AssistantId::Nora, Rates::new(0.0025, 0.01));
        rates.insert(AssistantId::Patrick, Rates::new(0.00015, 0.0006));
        Self {
            rates: RwLock::new(rates),
        }
    }

    pub fn empty() -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<AssistantId, Rates>> {
        self.rates.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<AssistantId, Rates>> {
        self.rates.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, assistant: AssistantId) -> Option<Rates> {
        self.read().get(&assistant).copied()
    }

    /// Add or replace the rates for an assistant.
    pub fn set(&self, assistant: AssistantId, rates: Rates) {
        self.write().insert(assistant, rates);
    }

    /// Apply named overrides. Unknown assistant names are skipped and
    /// returned so the caller can report them.
    pub fn apply_overrides<'a, I>(&self, overrides: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, Rates)>,
    {
        let mut unknown = Vec::new();
        for (name, rates) in overrides {
            match AssistantId::parse(name) {
                Some(id) => self.set(id, rates),
                None => unknown.push(name.to_string()),
            }
        }
        unknown
    }

    /// Cost of a call, or 0.0 if the assistant has no rates.
    pub fn compute_cost(&self, assistant: AssistantId, input_tokens: u64, output_tokens: u64) -> f64 {
        self.get(assistant)
            .map(|r| r.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    pub fn cost_for_usage(&self, assistant: AssistantId, usage: &Usage) -> f64 {
        self.compute_cost(assistant, usage.input_tokens, usage.output_tokens)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn research_rates() {
        let table = PricingTable::with_defaults();
        // 2000 in, 500 out: 2 * 0.0025 + 0.5 * 0.01 = 0.01
        let cost = table.compute_cost(AssistantId::Nora, 2000, 500);
        assert!((cost - 0.01).abs() < 1e-12);
    }

    #[test]
    fn coaching_rates() {
        let table = PricingTable::with_defaults();
        // 1000 * 0.00015/1000 + 1000 * 0.0006/1000 = 0.00075
        let cost = table.compute_cost(AssistantId::Patrick, 1000, 1000);
        assert!((cost - 0.00075).abs() < 1e-12);
    }

    #[test]
    fn missing_rates_cost_nothing() {
        let table = PricingTable::empty();
        assert_eq!(table.compute_cost(AssistantId::Nora, 10_000, 10_000), 0.0);
    }

    #[test]
    fn overrides_replace_defaults() {
        let table = PricingTable::with_defaults();
        let unknown = table.apply_overrides([
            ("nora", Rates::new(1.0, 2.0)),
            ("sage", Rates::new(9.0, 9.0)),
        ]);
        assert_eq!(unknown, vec!["sage".to_string()]);
        let cost = table.compute_cost(AssistantId::Nora, 1000, 1000);
        assert!((cost - 3.0).abs() < 1e-12);
    }

    #[test]
    fn usage_helper_ignores_total() {
        let table = PricingTable::with_defaults();
        let usage = Usage {
            input_tokens: 1000,
            output_tokens: 0,
            total_tokens: 99_999,
        };
        let cost = table.cost_for_usage(AssistantId::Nora, &usage);
        assert!((cost - 0.0025).abs() < 1e-12);
    }
}
