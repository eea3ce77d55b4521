//! Judge-based validator: checks an executor's response against
//! the original input and decides whether escalation is warranted.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::model::ModelRegistry;
use crate::provider::{
    ChatMessage, CompletionOptions, CompletionPurpose, ProviderRegistry, ResponseFormat,
};

/// Closed set of problems a judge or heuristic can flag in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Format,
    Hallucination,
    Incomplete,
    OffTopic,
    Safety,
}

impl IssueKind {
    fn from_label(label: &str) -> Self {
        match label {
            "hallucination" => Self::Hallucination,
            "incomplete" => Self::Incomplete,
            "off_topic" => Self::OffTopic,
            "safety" => Self::Safety,
            _ => Self::Format,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Hallucination => "hallucination",
            Self::Incomplete => "incomplete",
            Self::OffTopic => "off_topic",
            Self::Safety => "safety",
        }
    }

    /// Issue kinds that warrant escalation regardless of severity.
    fn is_always_critical(&self) -> bool {
        matches!(self, Self::Safety | Self::Hallucination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub description: String,
}

/// Verdict produced by a judge call or the heuristic fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub validator_model_id: String,
    pub issues: Vec<ValidationIssue>,
    pub should_escalate: bool,
    pub suggested_repair: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    kind: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValidation {
    valid: bool,
    #[serde(default)]
    issues: Vec<RawIssue>,
    #[serde(default)]
    suggested_repair: Option<String>,
}

fn issues_from_raw(raw: Vec<RawIssue>) -> Vec<ValidationIssue> {
    raw.into_iter()
        .map(|i| ValidationIssue {
            kind: IssueKind::from_label(&i.kind),
            severity: if i.severity == "error" {
                IssueSeverity::Error
            } else {
                IssueSeverity::Warning
            },
            description: i.description,
        })
        .collect()
}

fn should_escalate_for(valid: bool, issues: &[ValidationIssue]) -> bool {
    !valid
        || issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error || i.kind.is_always_critical())
}

const JUDGE_SYSTEM_PROMPT: &str = concat!(
    "You are a judge reviewing whether a response adequately answers the ",
    "original request. Flag issues of kind format, hallucination, incomplete, ",
    "off_topic, or safety, each with severity warning or error. Reply with ",
    "JSON: {valid, issues: [{kind, severity, description}], suggestedRepair}."
);

/// Judge-based validation via the tier-1 model. Capped by `validation_timeout_ms`.
pub async fn validate(
    original_input: &str,
    response: &str,
    cfg: &RouterConfig,
    providers: &ProviderRegistry,
) -> Result<ValidationResult> {
    let model_id = ModelRegistry::model_for_tier(1)
        .ok_or_else(|| Error::routing_failed("no tier-1 model registered for validation"))?;

    let options = CompletionOptions::new(model_id, CompletionPurpose::Validation)
        .with_message(ChatMessage::system(JUDGE_SYSTEM_PROMPT))
        .with_message(ChatMessage::user(format!(
            "ORIGINAL REQUEST:\n{original_input}\n\nRESPONSE TO JUDGE:\n{response}"
        )))
        .with_response_format(ResponseFormat::Json);

    let outcome = providers
        .execute(model_id, options, cfg.validation_timeout_ms)
        .await
        .map_err(|e| match e {
            Error::Timeout { duration_ms, .. } => Error::Timeout {
                phase: "validation".to_string(),
                duration_ms,
                partial: None,
            },
            other => Error::validation_failed(other.to_string()),
        })?;

    let raw: RawValidation = serde_json::from_str(&outcome.content)
        .map_err(|e| Error::validation_failed(format!("invalid judge JSON: {e}")))?;

    let issues = issues_from_raw(raw.issues);
    let should_escalate = should_escalate_for(raw.valid, &issues);

    Ok(ValidationResult {
        valid: raw.valid,
        validator_model_id: model_id.to_string(),
        issues,
        should_escalate,
        suggested_repair: raw.suggested_repair,
    })
}

/// Deterministic JSON a mock provider returns for a judge call, derived from
/// the same heuristic as [`quick_validate`]. `input` is the combined
/// "ORIGINAL REQUEST / RESPONSE TO JUDGE" prompt body built in [`validate`].
pub(crate) fn mock_validation_json(input: &str) -> String {
    let (original, response) = split_judge_prompt(input);
    let result = quick_validate(original, response);
    serde_json::json!({
        "valid": result.valid,
        "issues": result.issues.iter().map(|i| serde_json::json!({
            "kind": i.kind.as_str(),
            "severity": if i.severity == IssueSeverity::Error { "error" } else { "warning" },
            "description": i.description,
        })).collect::<Vec<_>>(),
        "suggestedRepair": result.suggested_repair,
    })
    .to_string()
}

fn split_judge_prompt(input: &str) -> (&str, &str) {
    const PREFIX: &str = "ORIGINAL REQUEST:\n";
    const MARKER: &str = "RESPONSE TO JUDGE:\n";
    match input.find(MARKER) {
        Some(idx) => {
            let start = if input.starts_with(PREFIX) { PREFIX.len() } else { 0 };
            let original = input[start..idx].trim();
            let response = input[idx + MARKER.len()..].trim();
            (original, response)
        }
        None => (input, input),
    }
}

static ERROR_PHRASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(i don't know|i cannot|i'm not sure|as an ai|i apologize)").expect("invalid regex")
});
static DANGEROUS_TERM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(weapon|exploit payload|malware|bypass security)").expect("invalid regex")
});

/// Heuristic validation fallback. Never touches the network.
pub fn quick_validate(original_input: &str, response: &str) -> ValidationResult {
    let mut issues = Vec::new();
    let trimmed = response.trim();

    if trimmed.is_empty() {
        issues.push(ValidationIssue {
            kind: IssueKind::Incomplete,
            severity: IssueSeverity::Error,
            description: "response is empty".to_string(),
        });
    } else {
        if trimmed.len() < original_input.trim().len() / 4 {
            issues.push(ValidationIssue {
                kind: IssueKind::Incomplete,
                severity: IssueSeverity::Warning,
                description: "response is suspiciously short relative to the request".to_string(),
            });
        }
        if ERROR_PHRASE_PATTERN.is_match(trimmed) {
            issues.push(ValidationIssue {
                kind: IssueKind::Format,
                severity: IssueSeverity::Warning,
                description: "response contains a refusal/hedge phrase".to_string(),
            });
        }
        if DANGEROUS_TERM_PATTERN.is_match(trimmed) && !DANGEROUS_TERM_PATTERN.is_match(original_input)
        {
            issues.push(ValidationIssue {
                kind: IssueKind::Safety,
                severity: IssueSeverity::Error,
                description: "response introduces unsafe content not present in the request".to_string(),
            });
        }
    }

    let valid = !issues.iter().any(|i| i.severity == IssueSeverity::Error);
    let should_escalate = should_escalate_for(valid, &issues);

    ValidationResult {
        valid,
        validator_model_id: "quick-validate".to_string(),
        issues,
        should_escalate,
        suggested_repair: None,
    }
}

/// Whether validation can be skipped entirely given classifier confidence.
pub fn should_skip_validation(confidence: f64, high_confidence_threshold: f64) -> bool {
    confidence >= high_confidence_threshold
}

/// Merge several verdicts (e.g. judge + heuristic) into one, deduplicating
/// issues by description and escalating if any input verdict does.
pub fn merge_validation_results(results: Vec<ValidationResult>) -> ValidationResult {
    let mut merged = ValidationResult {
        valid: true,
        validator_model_id: "merged".to_string(),
        issues: Vec::new(),
        should_escalate: false,
        suggested_repair: None,
    };

    for result in results {
        merged.valid &= result.valid;
        merged.should_escalate |= result.should_escalate;
        if merged.suggested_repair.is_none() {
            merged.suggested_repair = result.suggested_repair;
        }
        for issue in result.issues {
            if !merged.issues.iter().any(|i| i.description == issue.description) {
                merged.issues.push(issue);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderRegistry;

    #[test]
    fn quick_validate_flags_empty_response() {
        let result = quick_validate("What is 2+2?", "");
        assert!(!result.valid);
        assert!(result.should_escalate);
    }

    #[test]
    fn quick_validate_accepts_reasonable_response() {
        let result = quick_validate("What is 2+2?", "2+2 equals 4.");
        assert!(result.valid);
        assert!(!result.should_escalate);
    }

    #[test]
    fn safety_issue_forces_escalation_even_if_marked_valid() {
        let issues = vec![ValidationIssue {
            kind: IssueKind::Safety,
            severity: IssueSeverity::Warning,
            description: "mentions a weapon".to_string(),
        }];
        assert!(should_escalate_for(true, &issues));
    }

    #[test]
    fn should_skip_validation_respects_threshold() {
        assert!(should_skip_validation(0.97, 0.95));
        assert!(!should_skip_validation(0.8, 0.95));
    }

    #[test]
    fn merge_deduplicates_issues_and_ors_escalation() {
        let a = ValidationResult {
            valid: true,
            validator_model_id: "a".to_string(),
            issues: vec![ValidationIssue {
                kind: IssueKind::Format,
                severity: IssueSeverity::Warning,
                description: "dup".to_string(),
            }],
            should_escalate: false,
            suggested_repair: None,
        };
        let b = ValidationResult {
            valid: false,
            validator_model_id: "b".to_string(),
            issues: vec![ValidationIssue {
                kind: IssueKind::Format,
                severity: IssueSeverity::Warning,
                description: "dup".to_string(),
            }],
            should_escalate: true,
            suggested_repair: Some("retry".to_string()),
        };
        let merged = merge_validation_results(vec![a, b]);
        assert_eq!(merged.issues.len(), 1);
        assert!(merged.should_escalate);
        assert!(!merged.valid);
    }

    #[tokio::test]
    async fn validate_via_mock_provider_round_trips() {
        let cfg = RouterConfig::default();
        let providers = ProviderRegistry::with_default_mock();
        let result = validate("What is 2+2?", "2+2 equals 4.", &cfg, &providers)
            .await
            .unwrap();
        assert!(result.valid);
    }
}
