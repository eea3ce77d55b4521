//! Process-wide model registry.
//!
//! A static mapping from model id to its pricing/capability record, plus a
//! tier-to-canonical-model mapping used for routing and escalation. Built
//! once at first access and immutable for the life of the process.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Backing provider for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAI,
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered model and its pricing/capability record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub provider: Provider,
    /// Cost/capability band, 1 (cheapest) through 4 (most capable).
    pub tier: u8,
    pub input_cost_per_m: f64,
    pub output_cost_per_m: f64,
    pub max_context: u32,
    pub throughput_tokens_per_sec: u32,
}

impl Model {
    /// Cost in USD for the given token usage.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_m
            + (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_m
    }
}

/// Model id reserved for voice-transcription tasks, a fixed special case in
/// tier selection.
pub const TRANSCRIPTION_MODEL_ID: &str = "mock-transcribe-v1";

fn seed_models() -> Vec<Model> {
    vec![
        Model {
            id: "mock-fast".to_string(),
            provider: Provider::Mock,
            tier: 1,
            input_cost_per_m: 0.15,
            output_cost_per_m: 0.60,
            max_context: 128_000,
            throughput_tokens_per_sec: 220,
        },
        Model {
            id: "mock-balanced".to_string(),
            provider: Provider::Mock,
            tier: 2,
            input_cost_per_m: 0.80,
            output_cost_per_m: 4.0,
            max_context: 200_000,
            throughput_tokens_per_sec: 140,
        },
        Model {
            id: "mock-capable".to_string(),
            provider: Provider::Mock,
            tier: 3,
            input_cost_per_m: 3.0,
            output_cost_per_m: 15.0,
            max_context: 200_000,
            throughput_tokens_per_sec: 90,
        },
        Model {
            id: "mock-flagship".to_string(),
            provider: Provider::Mock,
            tier: 4,
            input_cost_per_m: 15.0,
            output_cost_per_m: 75.0,
            max_context: 200_000,
            throughput_tokens_per_sec: 45,
        },
        Model {
            id: TRANSCRIPTION_MODEL_ID.to_string(),
            provider: Provider::Mock,
            tier: 1,
            input_cost_per_m: 0.10,
            output_cost_per_m: 0.10,
            max_context: 16_000,
            throughput_tokens_per_sec: 300,
        },
    ]
}

static REGISTRY: LazyLock<HashMap<String, Model>> = LazyLock::new(|| {
    seed_models()
        .into_iter()
        .map(|m| (m.id.clone(), m))
        .collect()
});

static TIER_DEFAULTS: LazyLock<HashMap<u8, String>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for model in REGISTRY.values() {
        if model.id == TRANSCRIPTION_MODEL_ID {
            continue;
        }
        map.entry(model.tier).or_insert_with(|| model.id.clone());
    }
    map
});

/// Process-wide, read-only model registry.
pub struct ModelRegistry;

impl ModelRegistry {
    pub fn get_model_by_id(id: &str) -> Option<&'static Model> {
        REGISTRY.get(id)
    }

    /// Canonical model id representing a given tier.
    pub fn model_for_tier(tier: u8) -> Option<&'static str> {
        TIER_DEFAULTS.get(&tier).map(|s| s.as_str())
    }

    pub fn tier_of_model(id: &str) -> Option<u8> {
        REGISTRY.get(id).map(|m| m.tier)
    }

    pub fn models() -> impl Iterator<Item = &'static Model> {
        REGISTRY.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_defaults_cover_all_tiers() {
        for tier in 1..=4u8 {
            assert!(ModelRegistry::model_for_tier(tier).is_some(), "tier {tier}");
        }
    }

    #[test]
    fn unknown_model_id_returns_none() {
        assert!(ModelRegistry::get_model_by_id("does-not-exist").is_none());
        assert!(ModelRegistry::tier_of_model("does-not-exist").is_none());
    }

    #[test]
    fn cost_calculation() {
        let model = ModelRegistry::get_model_by_id("mock-balanced").unwrap();
        let cost = model.cost(1_000_000, 500_000);
        assert!((cost - 2.8).abs() < 0.01);
    }

    #[test]
    fn transcription_model_is_not_a_tier_default() {
        for tier in 1..=4u8 {
            assert_ne!(ModelRegistry::model_for_tier(tier), Some(TRANSCRIPTION_MODEL_ID));
        }
        assert_eq!(ModelRegistry::tier_of_model(TRANSCRIPTION_MODEL_ID), Some(1));
    }
}
