//! Correction-inference pipeline: detects corrective feedback in
//! conversation turns and proposes new guidance items from it.
//!
//! Three stages: the Correction Detector flags a turn as corrective and
//! extracts the old/new behavior pair; the Temporal Classifier decides
//! whether the correction reads as a one-off or a standing rule; the
//! Proposer combines both signals into a confidence score and, above
//! threshold, synthesizes a proposed guidance item.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::GuidanceConfig;

use super::types::RuleProposal;

static CORRECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(no,|no i want|that's not|that's wrong|not like that|don't|do not|never do|instead of|stop doing|wrong)")
        .expect("invalid regex")
});
static STRONG_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(never|always|must|required|from now on)").expect("invalid regex"));
static EMPHASIS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(please|really|seriously|absolutely)\b").expect("invalid regex"));

static CONTRAST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:no,?\s+)?(?:please\s+)?(?:use\s+|do\s+|write\s+)?(.+?)\s+instead of\s+(.+?)(?:[.,;]|$)")
        .expect("invalid regex")
});
static PREFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:always|please)\s+(.+?)(?:[.,;]|$)").expect("invalid regex"));
static ALWAYS_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\balways\s+(.+?)(?:[.,;]|$)").expect("invalid regex"));
static PLEASE_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bplease\s+(.+?)(?:[.,;]|$)").expect("invalid regex"));
static NEVER_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnever\s+(.+?)(?:[.,;]|$)").expect("invalid regex"));
static PROHIBITION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:don't|do not|stop)\s+(.+?)(?:[.,;]|$)").expect("invalid regex"));

static ONE_TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(just this time|this once|only for now|just for this)").expect("invalid regex")
});
// "from now on"/"going forward" read as standing-rule language, not a
// this-instance-only timeframe, so they belong here rather than in NOW_PATTERN.
static ALWAYS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(always|every time|from now on|going forward)\b").expect("invalid regex"));
static NOW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(just for now|for now|this time|right now)\b").expect("invalid regex"));
static STRONG_ALWAYS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(always|every time|without exception)\b").expect("invalid regex"));
static SPECIFICITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(this file|this function|this time|right now|just here)").expect("invalid regex")
});

/// Closed set of correction flavors the detector distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionType {
    Contrast,
    Preference,
    Prohibition,
    Generic,
}

/// What the Correction Detector found in one user turn.
#[derive(Debug, Clone)]
pub struct CorrectionSignal {
    pub is_correction: bool,
    pub correction_type: Option<CorrectionType>,
    pub original_behavior: Option<String>,
    pub desired_behavior: Option<String>,
    /// 0.0 (weak hedge) through 1.0 (strong/imperative language).
    pub strength: f64,
}

fn capture_first(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string())
}

/// Combines pattern-match count, strong-language hits, emphasis words, and
/// exclamation count into a [0,1] correction-strength score.
fn correction_strength(user_msg: &str) -> f64 {
    let pattern_matches = CORRECTION_PATTERN.find_iter(user_msg).count() as f64;
    let strong_hits = STRONG_LANGUAGE.find_iter(user_msg).count() as f64;
    let emphasis_hits = EMPHASIS_PATTERN.find_iter(user_msg).count() as f64;
    let exclamations = user_msg.matches('!').count() as f64;

    let score = 0.3
        + 0.15 * pattern_matches.min(2.0)
        + 0.2 * strong_hits.min(2.0)
        + 0.1 * emphasis_hits.min(2.0)
        + 0.1 * exclamations.min(2.0);
    score.clamp(0.0, 1.0)
}

/// Detect whether `user_msg` is corrective feedback, and extract the
/// old/new behavior pair where the wording makes it explicit.
pub fn detect_correction(user_msg: &str) -> CorrectionSignal {
    let is_correction = CORRECTION_PATTERN.is_match(user_msg);
    if !is_correction {
        return CorrectionSignal {
            is_correction: false,
            correction_type: None,
            original_behavior: None,
            desired_behavior: None,
            strength: 0.0,
        };
    }

    let strength = correction_strength(user_msg);

    if let Some(captures) = CONTRAST_PATTERN.captures(user_msg) {
        let desired = captures.get(1).map(|m| m.as_str().trim().to_string());
        let original = captures.get(2).map(|m| m.as_str().trim().to_string());
        if desired.is_some() || original.is_some() {
            return CorrectionSignal {
                is_correction: true,
                correction_type: Some(CorrectionType::Contrast),
                original_behavior: original,
                desired_behavior: desired,
                strength,
            };
        }
    }

    if let Some(desired) = capture_first(&NEVER_CAPTURE, user_msg) {
        return CorrectionSignal {
            is_correction: true,
            correction_type: Some(CorrectionType::Prohibition),
            original_behavior: Some(desired.clone()),
            desired_behavior: Some(format!("Avoid {desired}")),
            strength,
        };
    }

    if let Some(desired) = capture_first(&PROHIBITION_PATTERN, user_msg) {
        return CorrectionSignal {
            is_correction: true,
            correction_type: Some(CorrectionType::Prohibition),
            original_behavior: Some(desired.clone()),
            desired_behavior: Some(format!("Avoid {desired}")),
            strength,
        };
    }

    if let Some(desired) = capture_first(&ALWAYS_CAPTURE, user_msg).or_else(|| capture_first(&PLEASE_CAPTURE, user_msg)) {
        let _ = PREFERENCE_PATTERN.is_match(user_msg);
        return CorrectionSignal {
            is_correction: true,
            correction_type: Some(CorrectionType::Preference),
            original_behavior: None,
            desired_behavior: Some(desired),
            strength,
        };
    }

    CorrectionSignal {
        is_correction: true,
        correction_type: Some(CorrectionType::Generic),
        original_behavior: None,
        desired_behavior: None,
        strength,
    }
}

/// What the Temporal Classifier decided about whether a correction
/// generalizes into a standing rule.
#[derive(Debug, Clone)]
pub struct TemporalSignal {
    pub is_generalizable: bool,
    pub explicit_always: bool,
    pub explicit_now: bool,
    pub confidence: f64,
}

/// Classify whether `user_msg` reads as a one-off instruction or a standing
/// rule the assistant should generalize going forward.
pub fn classify_temporal(user_msg: &str) -> TemporalSignal {
    let always_count = ALWAYS_PATTERN.find_iter(user_msg).count();
    let now_count = NOW_PATTERN.find_iter(user_msg).count();

    let mut explicit_always = always_count > 0;
    let mut explicit_now = now_count > 0;

    // On a conflict (both sets match), a strong-ALWAYS phrase wins outright;
    // otherwise the set with more matches wins.
    if explicit_always && explicit_now {
        if STRONG_ALWAYS_PATTERN.is_match(user_msg) || always_count >= now_count {
            explicit_now = false;
        } else {
            explicit_always = false;
        }
    }

    let is_specific = SPECIFICITY_PATTERN.is_match(user_msg);
    let is_generalizable = !is_specific && !explicit_now;

    let mut confidence: f64 = 0.5;
    if explicit_always {
        confidence += 0.35;
    }
    if explicit_now {
        confidence -= 0.4;
    }
    if !is_generalizable {
        confidence -= 0.2;
    }
    confidence += (0.1 * always_count as f64).min(0.2);
    confidence -= (0.1 * now_count as f64).min(0.2);
    confidence = confidence.clamp(0.0, 1.0);

    TemporalSignal {
        is_generalizable,
        explicit_always,
        explicit_now,
        confidence,
    }
}

/// One prior (user, assistant) turn, used to weigh repetition when scoring.
#[derive(Debug, Clone)]
pub struct TurnPair {
    pub user: String,
    pub assistant: String,
}

/// Outcome of analyzing one turn for a possible rule proposal.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub should_propose: bool,
    pub proposal: Option<RuleProposal>,
    pub confidence: f64,
}

fn category_for(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("test") {
        "testing"
    } else if lower.contains("format") || lower.contains("style") || lower.contains("indent") {
        "formatting"
    } else if lower.contains("ask") || lower.contains("confirm") || lower.contains("before") {
        "interaction"
    } else if lower.contains("comment") || lower.contains("doc") {
        "documentation"
    } else {
        "general"
    }
}

fn count_similar_prior_turns(user_msg: &str, history: &[TurnPair]) -> usize {
    let words: Vec<&str> = user_msg.split_whitespace().collect();
    history
        .iter()
        .filter(|turn| {
            let shared = turn
                .user
                .split_whitespace()
                .filter(|w| words.contains(w))
                .count();
            shared >= 2
        })
        .count()
}

fn synthesize_rule(signal: &CorrectionSignal) -> String {
    match (&signal.correction_type, &signal.original_behavior, &signal.desired_behavior) {
        (Some(CorrectionType::Contrast), Some(original), Some(desired)) => {
            format!("{desired} instead of {original}")
        }
        (Some(CorrectionType::Prohibition), _, Some(desired)) => desired.clone(),
        (Some(CorrectionType::Preference), _, Some(desired)) => {
            let mut chars = desired.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => desired.clone(),
            }
        }
        (Some(correction_type), _, _) => match correction_type {
            CorrectionType::Contrast => "Follow the corrected approach".to_string(),
            CorrectionType::Preference => "Follow the stated preference".to_string(),
            CorrectionType::Prohibition => "Avoid the corrected behavior".to_string(),
            CorrectionType::Generic => "Follow the correction from this conversation".to_string(),
        },
        (None, _, _) => "Follow the correction from this conversation".to_string(),
    }
}

/// Analyze a user turn (with the assistant turn it responds to and the
/// preceding history) for a rule proposal worth surfacing.
pub fn analyze(
    user_msg: &str,
    _prev_assistant_msg: &str,
    history: &[TurnPair],
    session_id: &str,
    cfg: &GuidanceConfig,
) -> InferenceResult {
    if ONE_TIME_PATTERN.is_match(user_msg) {
        return InferenceResult {
            should_propose: false,
            proposal: None,
            confidence: 0.0,
        };
    }

    let correction = detect_correction(user_msg);
    if !correction.is_correction {
        return InferenceResult {
            should_propose: false,
            proposal: None,
            confidence: 0.0,
        };
    }

    let temporal = classify_temporal(user_msg);
    let repeated = count_similar_prior_turns(user_msg, history);

    let mut confidence: f64 = 0.3;
    if temporal.explicit_always || temporal.explicit_now {
        confidence += 0.4;
    }
    confidence += match repeated {
        0 => 0.0,
        1 => 0.1,
        _ => 0.2,
    };
    if temporal.is_generalizable {
        confidence += 0.1;
    }
    confidence += 0.15 * correction.strength;
    confidence = confidence.clamp(0.0, 1.0);

    if confidence < cfg.inference_threshold {
        return InferenceResult {
            should_propose: false,
            proposal: None,
            confidence,
        };
    }

    let text = synthesize_rule(&correction);
    let category = category_for(&text);
    let proposal = RuleProposal::new(session_id, text, category, confidence, user_msg);

    InferenceResult {
        should_propose: true,
        proposal: Some(proposal),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_always_correction_crosses_threshold() {
        let cfg = GuidanceConfig::default();
        let result = analyze(
            "No, from now on, always ask before making changes",
            "ok, I made the change",
            &[],
            "session-1",
            &cfg,
        );
        assert!(result.should_propose);
        assert!(result.confidence >= 0.7, "confidence was {}", result.confidence);
        let proposal = result.proposal.unwrap();
        assert!(proposal.proposed_text.to_lowercase().contains("ask"));
        assert!(proposal.proposed_text.to_lowercase().contains("before"));
    }

    #[test]
    fn one_time_correction_is_suppressed() {
        let cfg = GuidanceConfig::default();
        let result = analyze("Just this time, skip the tests", "ok", &[], "session-1", &cfg);
        assert!(!result.should_propose);
    }

    #[test]
    fn non_correction_never_proposes() {
        let cfg = GuidanceConfig::default();
        let result = analyze("Can you summarize this file?", "sure", &[], "session-1", &cfg);
        assert!(!result.should_propose);
    }

    #[test]
    fn contrast_phrasing_extracts_instead_of_pair() {
        let signal = detect_correction("No, use four spaces instead of tabs");
        assert!(signal.is_correction);
        assert_eq!(signal.desired_behavior.unwrap(), "four spaces");
    }

    #[test]
    fn specific_scope_is_not_generalizable() {
        let signal = classify_temporal("Just for this file, always use tabs");
        assert!(!signal.is_generalizable);
    }

    #[test]
    fn bare_dont_is_detected_as_a_correction() {
        let signal = detect_correction("don't use tabs");
        assert!(signal.is_correction);
    }

    #[test]
    fn strong_always_phrase_wins_an_always_now_conflict() {
        let signal = classify_temporal("from now on, just for now, always run the linter");
        assert!(signal.explicit_always);
        assert!(!signal.explicit_now);
        assert!(signal.is_generalizable);
    }
}
