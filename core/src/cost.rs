//! Cost estimation from character counts: ~4 chars per token, a flat 20%
//! context overhead, and a small per-model price table. Confidence grows
//! with the number of tool calls observed.

use serde::Deserialize;
use serde::Serialize;

/// USD per 1000 tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub model: &'static str,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

#[rustfmt::skip]
const PRICE_TABLE: &[ModelPrice] = &[
    ModelPrice { model: "claude-opus",   input_per_1k: 0.015,    output_per_1k: 0.075 },
    ModelPrice { model: "claude-sonnet", input_per_1k: 0.003,    output_per_1k: 0.015 },
    ModelPrice { model: "claude-haiku",  input_per_1k: 0.0008,   output_per_1k: 0.004 },
    ModelPrice { model: "gpt-4o-mini",   input_per_1k: 0.00015,  output_per_1k: 0.0006 },
    ModelPrice { model: "gpt-4o",        input_per_1k: 0.0025,   output_per_1k: 0.01 },
    ModelPrice { model: "gpt-4",         input_per_1k: 0.03,     output_per_1k: 0.06 },
    ModelPrice { model: "gemini-pro",    input_per_1k: 0.00125,  output_per_1k: 0.005 },
];

/// Used when the model is unknown; mid-range so the estimate is neither
/// flattering nor alarmist.
const FALLBACK_PRICE: ModelPrice = ModelPrice {
    model: "unknown",
    input_per_1k: 0.003,
    output_per_1k: 0.015,
};

const CHARS_PER_TOKEN: f64 = 4.0;
const CONTEXT_OVERHEAD: f64 = 1.2;

/// Longest-prefix lookup, so `claude-sonnet-4-20250514` resolves to the
/// `claude-sonnet` row.
pub fn price_for(model: &str) -> ModelPrice {
    let lower = model.to_lowercase();
    PRICE_TABLE
        .iter()
        .filter(|p| lower.starts_with(p.model) || lower.contains(p.model))
        .max_by_key(|p| p.model.len())
        .copied()
        .unwrap_or(FALLBACK_PRICE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub confidence: Confidence,
    pub tool_calls: u32,
}

/// Accumulates observed text volume for one session and prices it.
#[derive(Debug, Clone, Default)]
pub struct CostEstimator {
    model: String,
    input_chars: u64,
    output_chars: u64,
    tool_calls: u32,
}

impl CostEstimator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn add_input(&mut self, text: &str) {
        self.input_chars += text.chars().count() as u64;
    }

    pub fn add_output(&mut self, text: &str) {
        self.output_chars += text.chars().count() as u64;
    }

    pub fn record_tool_call(&mut self) {
        self.tool_calls += 1;
    }

    pub fn estimate(&self) -> CostEstimate {
        let input_tokens = tokens_for(self.input_chars);
        let output_tokens = tokens_for(self.output_chars);
        let price = price_for(&self.model);
        let cost_usd = (input_tokens as f64 / 1000.0) * price.input_per_1k
            + (output_tokens as f64 / 1000.0) * price.output_per_1k;
        CostEstimate {
            model: self.model.clone(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost_usd,
            confidence: confidence_for(self.tool_calls),
            tool_calls: self.tool_calls,
        }
    }
}

fn tokens_for(chars: u64) -> u64 {
    ((chars as f64 / CHARS_PER_TOKEN) * CONTEXT_OVERHEAD).round() as u64
}

/// Fewer than 5 tool calls is guesswork; 20 or more is a real sample.
fn confidence_for(tool_calls: u32) -> Confidence {
    match tool_calls {
        0..5 => Confidence::Low,
        5..20 => Confidence::Medium,
        _ => Confidence::High,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn four_chars_per_token_with_overhead() {
        assert_eq!(tokens_for(4000), 1200); // 1000 tokens * 1.2
        assert_eq!(tokens_for(0), 0);
    }

    #[test]
    fn versioned_model_names_resolve_by_prefix() {
        assert_eq!(price_for("claude-sonnet-4-20250514").model, "claude-sonnet");
        assert_eq!(price_for("gpt-4o-mini-2024-07-18").model, "gpt-4o-mini");
        assert_eq!(price_for("gpt-4o").model, "gpt-4o");
        assert_eq!(price_for("some-new-model").model, "unknown");
    }

    #[test]
    fn confidence_gates_at_5_and_20() {
        assert_eq!(confidence_for(0), Confidence::Low);
        assert_eq!(confidence_for(4), Confidence::Low);
        assert_eq!(confidence_for(5), Confidence::Medium);
        assert_eq!(confidence_for(19), Confidence::Medium);
        assert_eq!(confidence_for(20), Confidence::High);
    }

    #[test]
    fn estimate_prices_input_and_output_separately() {
        let mut estimator = CostEstimator::new("claude-sonnet");
        estimator.add_input(&"a".repeat(4000)); // 1200 tokens
        estimator.add_output(&"b".repeat(8000)); // 2400 tokens
        for _ in 0..6 {
            estimator.record_tool_call();
        }

        let estimate = estimator.estimate();
        assert_eq!(estimate.input_tokens, 1200);
        assert_eq!(estimate.output_tokens, 2400);
        assert_eq!(estimate.total_tokens, 3600);
        assert_eq!(estimate.confidence, Confidence::Medium);
        let expected = 1.2 * 0.003 + 2.4 * 0.015;
        assert!((estimate.cost_usd - expected).abs() < 1e-9);
    }
}
