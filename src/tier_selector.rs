//! Tier selector: a pure function from a classification result
//! to a concrete model id. No network I/O lives here.

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassificationResult, TaskType};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::model::{ModelRegistry, TRANSCRIPTION_MODEL_ID};

/// Outcome of tier selection: the chosen model plus, if the selector upgraded
/// the tier itself (not a later escalation), the tier it upgraded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSelection {
    pub model_id: String,
    pub tier: u8,
    pub escalated_from: Option<String>,
    pub reason: Option<String>,
}

/// Select a model for `classification`, honoring any forced override.
///
/// `force_model` takes precedence over `force_tier`, which takes precedence
/// over the classifier's own tier. Voice transcription always uses the fixed
/// transcription model; multi-model deliberation is always routed to tier 4.
/// Below `escalation_threshold` confidence, the tier is bumped by one (capped
/// at tier 4) before the model is resolved.
pub fn select_tier(
    classification: &ClassificationResult,
    cfg: &RouterConfig,
    force_model: Option<&str>,
    force_tier: Option<u8>,
) -> Result<TierSelection> {
    if let Some(model_id) = force_model {
        let model = ModelRegistry::get_model_by_id(model_id)
            .ok_or_else(|| Error::routing_failed(format!("forced model {model_id} is unknown")))?;
        return Ok(TierSelection {
            model_id: model.id.clone(),
            tier: model.tier,
            escalated_from: None,
            reason: Some("forced model override".to_string()),
        });
    }

    if let Some(tier) = force_tier {
        let model_id = ModelRegistry::model_for_tier(tier)
            .ok_or_else(|| Error::routing_failed(format!("no model registered for tier {tier}")))?;
        return Ok(TierSelection {
            model_id: model_id.to_string(),
            tier,
            escalated_from: None,
            reason: Some("forced tier override".to_string()),
        });
    }

    if classification.task_type == TaskType::VoiceTranscription {
        return Ok(TierSelection {
            model_id: TRANSCRIPTION_MODEL_ID.to_string(),
            tier: ModelRegistry::tier_of_model(TRANSCRIPTION_MODEL_ID).unwrap_or(1),
            escalated_from: None,
            reason: Some("voice transcription uses the fixed transcription model".to_string()),
        });
    }

    if classification.task_type == TaskType::MultiModelDeliberation {
        let model_id = ModelRegistry::model_for_tier(4)
            .ok_or_else(|| Error::routing_failed("no model registered for tier 4"))?;
        return Ok(TierSelection {
            model_id: model_id.to_string(),
            tier: 4,
            escalated_from: None,
            reason: Some("multi-model deliberation requires the top tier".to_string()),
        });
    }

    if classification.confidence < cfg.escalation_threshold {
        let upgraded_tier = (classification.tier + 1).min(4);
        let model_id = ModelRegistry::model_for_tier(upgraded_tier)
            .ok_or_else(|| Error::routing_failed(format!("no model registered for tier {upgraded_tier}")))?;
        return Ok(TierSelection {
            model_id: model_id.to_string(),
            tier: upgraded_tier,
            escalated_from: ModelRegistry::model_for_tier(classification.tier).map(str::to_string),
            reason: Some(format!(
                "Confidence {:.2} below threshold {:.2}",
                classification.confidence, cfg.escalation_threshold
            )),
        });
    }

    let model_id = ModelRegistry::model_for_tier(classification.tier)
        .ok_or_else(|| Error::routing_failed(format!("no model registered for tier {}", classification.tier)))?;
    Ok(TierSelection {
        model_id: model_id.to_string(),
        tier: classification.tier,
        escalated_from: None,
        reason: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn classification(task_type: TaskType, tier: u8, confidence: f64) -> ClassificationResult {
        ClassificationResult {
            task_type,
            tier,
            confidence,
            required_context: Vec::new(),
            reasoning: String::new(),
            input_token_estimate: 10,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn low_confidence_upgrades_one_tier() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::SimpleQa, 1, 0.5);
        let selection = select_tier(&c, &cfg, None, None).unwrap();
        assert_eq!(selection.tier, 2);
        assert_eq!(
            selection.reason.unwrap(),
            "Confidence 0.50 below threshold 0.70"
        );
    }

    #[test]
    fn high_confidence_uses_classified_tier() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::SimpleQa, 1, 0.9);
        let selection = select_tier(&c, &cfg, None, None).unwrap();
        assert_eq!(selection.tier, 1);
        assert!(selection.reason.is_none());
    }

    #[test]
    fn voice_transcription_uses_fixed_model() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::VoiceTranscription, 1, 0.9);
        let selection = select_tier(&c, &cfg, None, None).unwrap();
        assert_eq!(selection.model_id, TRANSCRIPTION_MODEL_ID);
    }

    #[test]
    fn multi_model_deliberation_forces_tier_four() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::MultiModelDeliberation, 1, 0.9);
        let selection = select_tier(&c, &cfg, None, None).unwrap();
        assert_eq!(selection.tier, 4);
    }

    #[test]
    fn forced_model_bypasses_classification() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::SimpleQa, 1, 0.5);
        let selection = select_tier(&c, &cfg, Some("mock-flagship"), None).unwrap();
        assert_eq!(selection.model_id, "mock-flagship");
    }

    #[test]
    fn forced_tier_bypasses_confidence_upgrade() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::SimpleQa, 1, 0.1);
        let selection = select_tier(&c, &cfg, None, Some(3)).unwrap();
        assert_eq!(selection.tier, 3);
    }

    #[test]
    fn tier_four_confidence_upgrade_stays_capped() {
        let cfg = RouterConfig::default();
        let c = classification(TaskType::SimpleQa, 4, 0.1);
        let selection = select_tier(&c, &cfg, None, None).unwrap();
        assert_eq!(selection.tier, 4);
    }
}
