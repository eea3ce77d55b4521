//! Merge-Readiness Pack builder: the audit record produced for
//! every routed request, capturing the full classify/route/execute/validate
//! chain plus cost and latency accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::ClassificationResult;
use crate::model::ModelRegistry;
use crate::validator::ValidationResult;

/// Record of one escalation step in the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub from_model_id: String,
    pub to_model_id: String,
    pub reason: String,
}

/// Token usage for a single execution attempt, keyed by the model used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptUsage {
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The tier-selection decision as recorded into the pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecisionRecord {
    pub model_id: String,
    pub tier: u8,
    pub reason: Option<String>,
}

/// The full audit record for one routed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReadinessPack {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub original_input: String,
    pub classification: Option<ClassificationResult>,
    pub routing: Option<RoutingDecisionRecord>,
    pub validation: Option<ValidationResult>,
    /// Model ids in attempt order, first to last.
    pub escalation_chain: Vec<String>,
    pub escalations: Vec<EscalationRecord>,
    pub attempts: Vec<AttemptUsage>,
    pub classification_latency_ms: u64,
    pub routing_latency_ms: u64,
    pub execution_latency_ms: u64,
    pub validation_latency_ms: u64,
    pub total_latency_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
    pub functional_completeness: bool,
    pub justification: String,
}

/// Builds a [`MergeReadinessPack`] incrementally as a request moves through
/// the router's phases.
#[derive(Debug, Default)]
pub struct MrpBuilder {
    original_input: String,
    classification: Option<ClassificationResult>,
    routing: Option<RoutingDecisionRecord>,
    validation: Option<ValidationResult>,
    escalation_chain: Vec<String>,
    escalations: Vec<EscalationRecord>,
    attempts: Vec<AttemptUsage>,
    classification_latency_ms: u64,
    routing_latency_ms: u64,
    execution_latency_ms: u64,
    validation_latency_ms: u64,
    functional_completeness: bool,
    justification: Option<String>,
}

impl MrpBuilder {
    pub fn new(original_input: impl Into<String>) -> Self {
        Self {
            original_input: original_input.into(),
            functional_completeness: true,
            ..Default::default()
        }
    }

    pub fn with_classification(mut self, classification: ClassificationResult, latency_ms: u64) -> Self {
        self.classification_latency_ms += latency_ms;
        self.classification = Some(classification);
        self
    }

    pub fn with_routing(mut self, routing: RoutingDecisionRecord, latency_ms: u64) -> Self {
        self.routing_latency_ms += latency_ms;
        if let Some(previous) = &self.routing {
            self.escalations.push(EscalationRecord {
                from_model_id: previous.model_id.clone(),
                to_model_id: routing.model_id.clone(),
                reason: routing.reason.clone().unwrap_or_default(),
            });
        }
        self.escalation_chain.push(routing.model_id.clone());
        self.routing = Some(routing);
        self
    }

    pub fn with_execution(mut self, usage: AttemptUsage, latency_ms: u64) -> Self {
        self.execution_latency_ms += latency_ms;
        self.attempts.push(usage);
        self
    }

    pub fn with_validation(mut self, validation: ValidationResult, latency_ms: u64) -> Self {
        self.validation_latency_ms += latency_ms;
        self.validation = Some(validation);
        self
    }

    pub fn with_completeness(mut self, complete: bool) -> Self {
        self.functional_completeness = complete;
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    fn compute_cost(&self) -> f64 {
        self.attempts
            .iter()
            .map(|attempt| {
                ModelRegistry::get_model_by_id(&attempt.model_id)
                    .map(|m| m.cost(attempt.input_tokens, attempt.output_tokens))
                    .unwrap_or(0.0)
            })
            .sum()
    }

    fn default_justification(&self) -> String {
        let escalations = self.escalations.len();
        if self.functional_completeness {
            if escalations == 0 {
                "routed and validated on the first attempt".to_string()
            } else {
                format!("validated after {escalations} escalation(s)")
            }
        } else {
            "validation did not pass within the escalation budget".to_string()
        }
    }

    /// Seal the pack: stamps total latency, sums per-attempt cost, and fills
    /// in a default justification if none was set.
    pub fn build(self) -> MergeReadinessPack {
        let input_tokens = self.attempts.iter().map(|a| a.input_tokens).sum();
        let output_tokens = self.attempts.iter().map(|a| a.output_tokens).sum();
        let estimated_cost_usd = self.compute_cost();
        let total_latency_ms = self.classification_latency_ms
            + self.routing_latency_ms
            + self.execution_latency_ms
            + self.validation_latency_ms;
        let justification = self
            .justification
            .clone()
            .unwrap_or_else(|| self.default_justification());

        MergeReadinessPack {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            original_input: self.original_input,
            classification: self.classification,
            routing: self.routing,
            validation: self.validation,
            escalation_chain: self.escalation_chain,
            escalations: self.escalations,
            attempts: self.attempts,
            classification_latency_ms: self.classification_latency_ms,
            routing_latency_ms: self.routing_latency_ms,
            execution_latency_ms: self.execution_latency_ms,
            validation_latency_ms: self.validation_latency_ms,
            total_latency_ms,
            input_tokens,
            output_tokens,
            estimated_cost_usd,
            functional_completeness: self.functional_completeness,
            justification,
        }
    }
}
