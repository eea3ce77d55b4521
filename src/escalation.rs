//! Escalation controller: decides, given a validation verdict,
//! whether the request should be retried at a higher tier and builds the
//! next tier selection when it does.

use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationResult;
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::model::ModelRegistry;
use crate::tier_selector::TierSelection;
use crate::validator::{IssueSeverity, ValidationResult};

/// Outcome of an escalation decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub should_escalate: bool,
    pub new_decision: Option<TierSelection>,
    pub reason: String,
}

/// Whether `verdict` alone warrants escalation, independent of any cap.
pub fn needs_escalation(verdict: &ValidationResult) -> bool {
    verdict.should_escalate
}

fn describe_reason(verdict: &ValidationResult) -> String {
    if let Some(repair) = &verdict.suggested_repair {
        return repair.clone();
    }
    let descriptions: Vec<&str> = verdict
        .issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Error)
        .map(|i| i.description.as_str())
        .collect();
    if !descriptions.is_empty() {
        return descriptions.join("; ");
    }
    if let Some(issue) = verdict.issues.first() {
        return issue.description.clone();
    }
    "validator requested escalation".to_string()
}

/// Decide whether to escalate `current_tier`/`current_model_id` given
/// `verdict`, honoring `max_escalations` and the tier-4 ceiling.
///
/// `attempt_count` is the number of execution attempts already made for this
/// request (1 after the first execution).
pub fn handle_escalation(
    current_tier: u8,
    current_model_id: &str,
    classification: &ClassificationResult,
    verdict: &ValidationResult,
    cfg: &RouterConfig,
    attempt_count: u32,
) -> Result<EscalationOutcome> {
    let _ = classification;

    if !needs_escalation(verdict) {
        return Ok(EscalationOutcome {
            should_escalate: false,
            new_decision: None,
            reason: "validation passed".to_string(),
        });
    }

    if attempt_count > cfg.max_escalations {
        return Ok(EscalationOutcome {
            should_escalate: false,
            new_decision: None,
            reason: format!("escalation cap of {} reached", cfg.max_escalations),
        });
    }

    if current_tier >= 4 {
        return Ok(EscalationOutcome {
            should_escalate: false,
            new_decision: None,
            reason: "already at the top tier".to_string(),
        });
    }

    let next_tier = current_tier + 1;
    let next_model_id = ModelRegistry::model_for_tier(next_tier)
        .ok_or_else(|| Error::routing_failed(format!("no model registered for tier {next_tier}")))?;

    let reason = describe_reason(verdict);
    Ok(EscalationOutcome {
        should_escalate: true,
        new_decision: Some(TierSelection {
            model_id: next_model_id.to_string(),
            tier: next_tier,
            escalated_from: Some(current_model_id.to_string()),
            reason: Some(reason.clone()),
        }),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TaskType;
    use crate::validator::{IssueKind, ValidationIssue};
    use chrono::Utc;

    fn classification() -> ClassificationResult {
        ClassificationResult {
            task_type: TaskType::SimpleQa,
            tier: 1,
            confidence: 0.9,
            required_context: Vec::new(),
            reasoning: String::new(),
            input_token_estimate: 10,
            timestamp: Utc::now(),
        }
    }

    fn failing_verdict() -> ValidationResult {
        ValidationResult {
            valid: false,
            validator_model_id: "mock-fast".to_string(),
            issues: vec![ValidationIssue {
                kind: IssueKind::Incomplete,
                severity: IssueSeverity::Error,
                description: "response is empty".to_string(),
            }],
            should_escalate: true,
            suggested_repair: None,
        }
    }

    fn passing_verdict() -> ValidationResult {
        ValidationResult {
            valid: true,
            validator_model_id: "mock-fast".to_string(),
            issues: Vec::new(),
            should_escalate: false,
            suggested_repair: None,
        }
    }

    #[test]
    fn passing_verdict_never_escalates() {
        let cfg = RouterConfig::default();
        let outcome =
            handle_escalation(1, "mock-fast", &classification(), &passing_verdict(), &cfg, 1).unwrap();
        assert!(!outcome.should_escalate);
    }

    #[test]
    fn failing_verdict_escalates_one_tier() {
        let cfg = RouterConfig::default();
        let outcome =
            handle_escalation(1, "mock-fast", &classification(), &failing_verdict(), &cfg, 1).unwrap();
        assert!(outcome.should_escalate);
        assert_eq!(outcome.new_decision.unwrap().tier, 2);
    }

    #[test]
    fn escalation_ceiling_is_enforced() {
        let cfg = RouterConfig::default();
        let outcome = handle_escalation(
            1,
            "mock-fast",
            &classification(),
            &failing_verdict(),
            &cfg,
            cfg.max_escalations + 1,
        )
        .unwrap();
        assert!(!outcome.should_escalate);
        assert!(outcome.reason.contains("cap"));
    }

    #[test]
    fn tier_four_is_a_ceiling_regardless_of_cap() {
        let cfg = RouterConfig::default();
        let outcome =
            handle_escalation(4, "mock-flagship", &classification(), &failing_verdict(), &cfg, 1)
                .unwrap();
        assert!(!outcome.should_escalate);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::classifier::TaskType;
    use crate::validator::{IssueKind, ValidationIssue};
    use chrono::Utc;
    use proptest::prelude::*;

    fn classification() -> ClassificationResult {
        ClassificationResult {
            task_type: TaskType::SimpleQa,
            tier: 1,
            confidence: 0.9,
            required_context: Vec::new(),
            reasoning: String::new(),
            input_token_estimate: 10,
            timestamp: Utc::now(),
        }
    }

    fn failing_verdict() -> ValidationResult {
        ValidationResult {
            valid: false,
            validator_model_id: "mock-fast".to_string(),
            issues: vec![ValidationIssue {
                kind: IssueKind::Incomplete,
                severity: IssueSeverity::Error,
                description: "response is empty".to_string(),
            }],
            should_escalate: true,
            suggested_repair: None,
        }
    }

    proptest! {
        #[test]
        fn escalation_chain_tiers_strictly_increase_and_never_exceed_four(
            start_tier in 1u8..=4,
            attempt_count in 1u32..10,
        ) {
            let cfg = RouterConfig::default();
            let outcome = handle_escalation(
                start_tier,
                "mock-fast",
                &classification(),
                &failing_verdict(),
                &cfg,
                attempt_count,
            )
            .unwrap();

            if let Some(decision) = outcome.new_decision {
                prop_assert!(decision.tier > start_tier);
                prop_assert!(decision.tier <= 4);
            } else {
                prop_assert!(!outcome.should_escalate);
            }
        }
    }
}
