//! Runtime configuration for the router and guidance engine.
//!
//! Recognizes a closed list of options; `from_env()` reads
//! `OSQR_ROUTER_*` / `OSQR_GUIDANCE_*` environment variables and rejects
//! anything outside that list rather than silently ignoring it.

use std::env;

use crate::error::{Error, Result};

/// Configuration for the tiered dispatch-and-repair router.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Below this confidence, the tier selector auto-upgrades by one tier.
    pub escalation_threshold: f64,
    /// At or above this confidence, judge-based validation is skipped.
    pub high_confidence_threshold: f64,
    /// Cap on escalation loop iterations per request.
    pub max_escalations: u32,
    /// Reserved: would bound same-tier repair iterations if that path existed.
    pub max_validation_retries: u32,
    pub classification_timeout_ms: u64,
    pub routing_timeout_ms: u64,
    pub validation_timeout_ms: u64,
    pub enable_validation: bool,
    pub enable_mrp_generation: bool,
    pub enable_cost_tracking: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.7,
            high_confidence_threshold: 0.95,
            max_escalations: 2,
            max_validation_retries: 3,
            classification_timeout_ms: 5000,
            routing_timeout_ms: 1000,
            validation_timeout_ms: 5000,
            enable_validation: true,
            enable_mrp_generation: true,
            enable_cost_tracking: true,
        }
    }
}

impl RouterConfig {
    /// Build a config from defaults overridden by `OSQR_ROUTER_*` env vars.
    ///
    /// Unrecognized `OSQR_ROUTER_*` keys are rejected rather than ignored.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        for (key, value) in env::vars() {
            let Some(field) = key.strip_prefix("OSQR_ROUTER_") else {
                continue;
            };
            match field {
                "ESCALATION_THRESHOLD" => cfg.escalation_threshold = parse_f64(&key, &value)?,
                "HIGH_CONFIDENCE_THRESHOLD" => {
                    cfg.high_confidence_threshold = parse_f64(&key, &value)?
                }
                "MAX_ESCALATIONS" => cfg.max_escalations = parse_u32(&key, &value)?,
                "MAX_VALIDATION_RETRIES" => cfg.max_validation_retries = parse_u32(&key, &value)?,
                "CLASSIFICATION_TIMEOUT_MS" => {
                    cfg.classification_timeout_ms = parse_u64(&key, &value)?
                }
                "ROUTING_TIMEOUT_MS" => cfg.routing_timeout_ms = parse_u64(&key, &value)?,
                "VALIDATION_TIMEOUT_MS" => cfg.validation_timeout_ms = parse_u64(&key, &value)?,
                "ENABLE_VALIDATION" => cfg.enable_validation = parse_bool(&key, &value)?,
                "ENABLE_MRP_GENERATION" => cfg.enable_mrp_generation = parse_bool(&key, &value)?,
                "ENABLE_COST_TRACKING" => cfg.enable_cost_tracking = parse_bool(&key, &value)?,
                other => {
                    return Err(Error::Config(format!(
                        "unrecognized config key OSQR_ROUTER_{other}"
                    )))
                }
            }
        }
        Ok(cfg)
    }
}

/// Configuration for the project guidance (mentorship-as-code) engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceConfig {
    /// Percentage of the caller's context budget the selector is allowed to fill.
    pub context_budget_percent: u8,
    /// Minimum proposer confidence required to emit a rule proposal.
    pub inference_threshold: f64,
    /// Item count at which consolidation is suggested.
    pub soft_limit: usize,
    /// Item count at which new items are rejected.
    pub hard_limit: usize,
    /// Half-decay period (days) used by the context selector's recency score.
    pub recency_decay_days: u32,
    /// Priority assigned to items that don't specify one.
    pub default_priority: u8,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            context_budget_percent: 70,
            inference_threshold: 0.7,
            soft_limit: 15,
            hard_limit: 25,
            recency_decay_days: 40,
            default_priority: 5,
        }
    }
}

impl GuidanceConfig {
    /// Build a config from defaults overridden by `OSQR_GUIDANCE_*` env vars.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        for (key, value) in env::vars() {
            let Some(field) = key.strip_prefix("OSQR_GUIDANCE_") else {
                continue;
            };
            match field {
                "CONTEXT_BUDGET_PERCENT" => {
                    cfg.context_budget_percent = parse_u32(&key, &value)? as u8
                }
                "INFERENCE_THRESHOLD" => cfg.inference_threshold = parse_f64(&key, &value)?,
                "SOFT_LIMIT" => cfg.soft_limit = parse_u32(&key, &value)? as usize,
                "HARD_LIMIT" => cfg.hard_limit = parse_u32(&key, &value)? as usize,
                "RECENCY_DECAY_DAYS" => cfg.recency_decay_days = parse_u32(&key, &value)?,
                "DEFAULT_PRIORITY" => cfg.default_priority = parse_u32(&key, &value)?.clamp(1, 10) as u8,
                other => {
                    return Err(Error::Config(format!(
                        "unrecognized config key OSQR_GUIDANCE_{other}"
                    )))
                }
            }
        }
        Ok(cfg)
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a float, got {value:?}")))
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be an integer, got {value:?}")))
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be an integer, got {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(Error::Config(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.escalation_threshold, 0.7);
        assert_eq!(cfg.high_confidence_threshold, 0.95);
        assert_eq!(cfg.max_escalations, 2);

        let gcfg = GuidanceConfig::default();
        assert_eq!(gcfg.context_budget_percent, 70);
        assert_eq!(gcfg.hard_limit, 25);
    }

    #[test]
    fn from_env_overrides_and_rejects_unknown_keys() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("OSQR_ROUTER_MAX_ESCALATIONS", "5");
        let cfg = RouterConfig::from_env().unwrap();
        assert_eq!(cfg.max_escalations, 5);
        env::remove_var("OSQR_ROUTER_MAX_ESCALATIONS");

        env::set_var("OSQR_ROUTER_NOT_A_REAL_KEY", "1");
        let err = RouterConfig::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        env::remove_var("OSQR_ROUTER_NOT_A_REAL_KEY");
    }
}
