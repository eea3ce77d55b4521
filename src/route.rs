//! Router entry point: wires classifier → tier selector →
//! executor → validator → escalation controller into one request/response
//! cycle and seals a [`MergeReadinessPack`] for every call.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::classifier::{self, ClassificationResult};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::escalation;
use crate::mrp::{AttemptUsage, MergeReadinessPack, MrpBuilder, RoutingDecisionRecord};
use crate::provider::{ChatMessage, CompletionOptions, CompletionPurpose, ProviderRegistry};
use crate::tier_selector::{self, TierSelection};
use crate::validator::{self, ValidationResult};

/// How the caller's input should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Text,
    Voice,
    Image,
}

/// A request to route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub input: String,
    pub input_type: InputType,
    pub session_id: String,
    pub user_id: Option<String>,
    pub context: Option<String>,
    pub force_model: Option<String>,
    pub force_tier: Option<u8>,
}

impl Request {
    pub fn new(input: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            input_type: InputType::Text,
            session_id: session_id.into(),
            user_id: None,
            context: None,
            force_model: None,
            force_tier: None,
        }
    }
}

/// Summary metadata returned alongside a routed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model_used: String,
    pub tier: u8,
    pub was_escalated: bool,
    pub was_validated: bool,
    pub total_latency_ms: u64,
    pub estimated_cost_usd: f64,
}

/// The full result of routing one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub output: String,
    pub mrp: MergeReadinessPack,
    pub metadata: ResponseMetadata,
}

/// Ties the classifier, tier selector, executor, validator, and escalation
/// controller together behind a single `route` call.
pub struct Router {
    providers: ProviderRegistry,
    config: RouterConfig,
}

impl Router {
    pub fn new(providers: ProviderRegistry, config: RouterConfig) -> Self {
        Self { providers, config }
    }

    async fn execute_one(
        &self,
        input: &str,
        model_id: &str,
    ) -> Result<(String, AttemptUsage, u64)> {
        let options = CompletionOptions::new(model_id, CompletionPurpose::General)
            .with_message(ChatMessage::user(input));
        let start = Instant::now();
        let outcome = self
            .providers
            .execute(model_id, options, self.config.routing_timeout_ms)
            .await?;
        let latency_ms = start.elapsed().as_millis() as u64;
        let usage = AttemptUsage {
            model_id: model_id.to_string(),
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
        };
        Ok((outcome.content, usage, latency_ms))
    }

    /// Route `request` through classify → select tier → execute → validate →
    /// escalate-if-needed, returning the final response and its sealed MRP.
    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn route(&self, request: &Request) -> Result<Response> {
        if request.input.trim().is_empty() {
            return Err(Error::InvalidRequest("input must not be empty".to_string()));
        }

        let mut builder = MrpBuilder::new(request.input.clone());

        let (classification, classification_latency_ms) = if let Some(model_id) = &request.force_model
        {
            // forceModel bypasses classification entirely
            let placeholder = ClassificationResult {
                task_type: classifier::TaskType::SimpleQa,
                tier: crate::model::ModelRegistry::tier_of_model(model_id).unwrap_or(1),
                confidence: 1.0,
                required_context: Vec::new(),
                reasoning: "classification skipped: forced model".to_string(),
                input_token_estimate: 0,
                timestamp: chrono::Utc::now(),
            };
            (placeholder, 0)
        } else {
            let start = Instant::now();
            let result = classifier::classify(&request.input, &self.config, &self.providers).await;
            let elapsed = start.elapsed().as_millis() as u64;
            match result {
                Ok(c) => (c, elapsed),
                Err(e) => {
                    warn!(error = %e, "classification failed, falling back to heuristic");
                    (classifier::quick_classify(&request.input), elapsed)
                }
            }
        };
        builder = builder.with_classification(classification.clone(), classification_latency_ms);

        let mut selection: TierSelection = tier_selector::select_tier(
            &classification,
            &self.config,
            request.force_model.as_deref(),
            request.force_tier,
        )?;
        builder = builder.with_routing(
            RoutingDecisionRecord {
                model_id: selection.model_id.clone(),
                tier: selection.tier,
                reason: selection.reason.clone(),
            },
            0,
        );

        let mut was_escalated = false;
        let mut output;
        let mut verdict: Option<ValidationResult> = None;
        let mut attempt_count: u32 = 0;

        loop {
            attempt_count += 1;
            let (response, usage, exec_latency_ms) =
                self.execute_one(&request.input, &selection.model_id).await?;
            builder = builder.with_execution(usage, exec_latency_ms);
            output = response;

            if !self.config.enable_validation
                || validator::should_skip_validation(
                    classification.confidence,
                    self.config.high_confidence_threshold,
                )
            {
                info!("validation skipped");
                break;
            }

            let start = Instant::now();
            let this_verdict = match validator::validate(&request.input, &output, &self.config, &self.providers).await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "validation failed, falling back to heuristic");
                    validator::quick_validate(&request.input, &output)
                }
            };
            let validation_latency_ms = start.elapsed().as_millis() as u64;
            builder = builder.with_validation(this_verdict.clone(), validation_latency_ms);

            let outcome = escalation::handle_escalation(
                selection.tier,
                &selection.model_id,
                &classification,
                &this_verdict,
                &self.config,
                attempt_count,
            )?;

            let should_escalate = outcome.should_escalate;
            verdict = Some(this_verdict);

            if !should_escalate {
                break;
            }

            let Some(new_decision) = outcome.new_decision else {
                break;
            };
            was_escalated = true;
            builder = builder.with_routing(
                RoutingDecisionRecord {
                    model_id: new_decision.model_id.clone(),
                    tier: new_decision.tier,
                    reason: new_decision.reason.clone(),
                },
                0,
            );
            selection = new_decision;
        }

        let functional_completeness = verdict.as_ref().map(|v| v.valid).unwrap_or(true);
        let mrp = builder.with_completeness(functional_completeness).build();

        let metadata = ResponseMetadata {
            model_used: selection.model_id.clone(),
            tier: selection.tier,
            was_escalated,
            was_validated: mrp.validation.is_some(),
            total_latency_ms: mrp.total_latency_ms,
            estimated_cost_usd: mrp.estimated_cost_usd,
        };

        Ok(Response {
            output,
            mrp,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new(ProviderRegistry::with_default_mock(), RouterConfig::default())
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        init_tracing();
        let router = router();
        let request = Request::new("   ", "session-1");
        let err = router.route(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn simple_question_routes_to_tier_one() {
        let router = router();
        let request = Request::new("What is 2+2?", "session-1");
        let response = router.route(&request).await.unwrap();
        assert!(!response.output.is_empty());
        assert_eq!(response.metadata.tier, 1);
    }

    #[tokio::test]
    async fn forced_model_bypasses_classification() {
        let router = router();
        let mut request = Request::new("What is 2+2?", "session-1");
        request.force_model = Some("mock-flagship".to_string());
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.metadata.model_used, "mock-flagship");
    }

    #[tokio::test]
    async fn forced_tier_is_honored() {
        let router = router();
        let mut request = Request::new("What is 2+2?", "session-1");
        request.force_tier = Some(3);
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.metadata.tier, 3);
    }

    #[tokio::test]
    async fn mrp_chain_starts_with_initial_selection() {
        let router = router();
        let request = Request::new("What is 2+2?", "session-1");
        let response = router.route(&request).await.unwrap();
        assert_eq!(response.mrp.escalation_chain.first().unwrap(), &response.metadata.model_used);
    }
}
