//! Classifier: labels a request with task type, complexity tier,
//! confidence, and an input-token estimate.
//!
//! Two entry points: [`classify`] (LLM-driven, via the provider registry)
//! and [`quick_classify`] (heuristic, no network, always terminates).

use std::sync::LazyLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::model::ModelRegistry;
use crate::provider::{
    ChatMessage, CompletionOptions, CompletionPurpose, ProviderRegistry, ResponseFormat,
};

/// Closed set of task labels the classifier may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SimpleQa,
    CodeGeneration,
    CreativeWriting,
    Analysis,
    MultiModelDeliberation,
    VoiceTranscription,
}

impl TaskType {
    fn from_label(label: &str) -> Self {
        match label {
            "code_generation" => Self::CodeGeneration,
            "creative_writing" => Self::CreativeWriting,
            "analysis" => Self::Analysis,
            "multi_model_deliberation" => Self::MultiModelDeliberation,
            "voice_transcription" => Self::VoiceTranscription,
            "simple_qa" => Self::SimpleQa,
            // unknown task labels map to simple_qa
            _ => Self::SimpleQa,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleQa => "simple_qa",
            Self::CodeGeneration => "code_generation",
            Self::CreativeWriting => "creative_writing",
            Self::Analysis => "analysis",
            Self::MultiModelDeliberation => "multi_model_deliberation",
            Self::VoiceTranscription => "voice_transcription",
        }
    }
}

/// Result of classifying a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub task_type: TaskType,
    /// Complexity tier, clamped to 1..4.
    pub tier: u8,
    /// Clamped to [0, 1].
    pub confidence: f64,
    pub required_context: Vec<String>,
    pub reasoning: String,
    pub input_token_estimate: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClassification {
    task_type: String,
    complexity_tier: i64,
    confidence_score: f64,
    #[serde(default)]
    required_context: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    input_token_estimate: Option<u32>,
}

fn default_token_estimate(input: &str) -> u32 {
    ((input.len() as f64 / 4.0).ceil() as u32).max(1)
}

fn clamp_tier(tier: i64) -> u8 {
    if (1..=4).contains(&tier) {
        tier as u8
    } else {
        // tier values outside 1..4 map to "simple" (tier 2)
        2
    }
}

fn from_raw(raw: RawClassification, input: &str) -> ClassificationResult {
    ClassificationResult {
        task_type: TaskType::from_label(&raw.task_type),
        tier: clamp_tier(raw.complexity_tier),
        confidence: raw.confidence_score.clamp(0.0, 1.0),
        required_context: raw.required_context,
        reasoning: raw.reasoning,
        input_token_estimate: raw
            .input_token_estimate
            .unwrap_or_else(|| default_token_estimate(input)),
        timestamp: Utc::now(),
    }
}

const CLASSIFIER_SYSTEM_PROMPT: &str = concat!(
    "You classify incoming requests for a tiered LLM router. Task types: ",
    "simple_qa, code_generation, creative_writing, analysis, multi_model_deliberation, ",
    "voice_transcription. Complexity tiers: 1 (trivial) through 4 (requires the most ",
    "capable model). Reply with JSON: {taskType, complexityTier, confidenceScore, ",
    "requiredContext, reasoning, inputTokenEstimate}."
);

/// LLM-driven classification via the tier-1 model. Capped by
/// `classification_timeout_ms`; failures are retryable.
pub async fn classify(
    input: &str,
    cfg: &RouterConfig,
    providers: &ProviderRegistry,
) -> Result<ClassificationResult> {
    let model_id = ModelRegistry::model_for_tier(1)
        .ok_or_else(|| Error::routing_failed("no tier-1 model registered for classification"))?;

    let options = CompletionOptions::new(model_id, CompletionPurpose::Classification)
        .with_message(ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT))
        .with_message(ChatMessage::user(input))
        .with_response_format(ResponseFormat::Json);

    let start = Instant::now();
    let outcome = providers
        .execute(model_id, options, cfg.classification_timeout_ms)
        .await
        .map_err(|e| match e {
            Error::Timeout { duration_ms, .. } => Error::Timeout {
                phase: "classification".to_string(),
                duration_ms,
                partial: None,
            },
            other => Error::classification_failed(other.to_string()),
        })?;
    let _elapsed = start.elapsed();

    let raw: RawClassification = serde_json::from_str(&outcome.content)
        .map_err(|e| Error::classification_failed(format!("invalid classifier JSON: {e}")))?;

    Ok(from_raw(raw, input))
}

/// Build the deterministic JSON a mock provider returns for a classification
/// call, derived from the same heuristics as [`quick_classify`].
pub(crate) fn mock_classification_json(input: &str) -> String {
    let result = quick_classify(input);
    serde_json::json!({
        "taskType": result.task_type.as_str(),
        "complexityTier": result.tier,
        "confidenceScore": result.confidence,
        "requiredContext": result.required_context,
        "reasoning": result.reasoning,
        "inputTokenEstimate": result.input_token_estimate,
    })
    .to_string()
}

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(function|class|implement|refactor|bug|compile|variable|code|script|def\s|fn\s)")
        .expect("invalid regex")
});
static WRITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(write a|compose|draft|story|poem|essay|creative)").expect("invalid regex")
});
static PLAN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(architect|design|strategy|trade.?off|compare|analyze|analysis)")
        .expect("invalid regex")
});
static INTERROGATIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(what|who|when|where|how many|is|are|does|do)\b").expect("invalid regex")
});
static DELIBERATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(multiple models|second opinion|cross.?check|deliberat|ensemble)")
        .expect("invalid regex")
});
static VOICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(transcribe|transcription|audio|voice\s+memo|spoken)").expect("invalid regex")
});

/// Heuristic classification. Never touches the network and always terminates.
pub fn quick_classify(input: &str) -> ClassificationResult {
    let trimmed = input.trim();
    let token_estimate = default_token_estimate(trimmed);

    let (task_type, tier, confidence, reasoning) = if VOICE_PATTERN.is_match(trimmed) {
        (
            TaskType::VoiceTranscription,
            1,
            0.9,
            "voice/transcription keywords matched",
        )
    } else if DELIBERATION_PATTERN.is_match(trimmed) {
        (
            TaskType::MultiModelDeliberation,
            4,
            0.9,
            "multi-model deliberation keywords matched",
        )
    } else if CODE_PATTERN.is_match(trimmed) {
        (TaskType::CodeGeneration, 3, 0.75, "code-related keywords matched")
    } else if WRITE_PATTERN.is_match(trimmed) {
        (TaskType::CreativeWriting, 2, 0.7, "creative-writing keywords matched")
    } else if PLAN_PATTERN.is_match(trimmed) {
        (TaskType::Analysis, 3, 0.75, "analysis/planning keywords matched")
    } else if trimmed.len() < 40 && INTERROGATIVE_PATTERN.is_match(trimmed) {
        (TaskType::SimpleQa, 1, 0.85, "short interrogative input")
    } else {
        (TaskType::SimpleQa, 2, 0.6, "no strong signal; defaulted to simple_qa")
    };

    ClassificationResult {
        task_type,
        tier,
        confidence,
        required_context: Vec::new(),
        reasoning: reasoning.to_string(),
        input_token_estimate: token_estimate,
        timestamp: Utc::now(),
    }
}
