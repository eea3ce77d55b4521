//! Token-budgeted context selector: scores guidance items
//! against the current task and greedily admits them until the budget for
//! this call is exhausted.

use chrono::Utc;

use crate::config::GuidanceConfig;

use super::types::MentorScriptItem;

/// Token estimate for one item's rule text: character-based estimate plus a
/// fixed per-item overhead.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() as f64 / 4.0).ceil() as u32).max(1) + 5
}

/// Jaccard similarity over whitespace-tokenized, lowercased word sets.
pub fn jaccard(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;
    let a_words: HashSet<String> = a.to_lowercase().split_whitespace().map(str::to_string).collect();
    let b_words: HashSet<String> = b.to_lowercase().split_whitespace().map(str::to_string).collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }
    let intersection = a_words.intersection(&b_words).count() as f64;
    let union = a_words.union(&b_words).count() as f64;
    intersection / union
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("testing", &["test", "tests", "spec"]),
    ("formatting", &["format", "style", "lint"]),
    ("interaction", &["ask", "confirm", "explain"]),
    ("documentation", &["doc", "comment", "readme"]),
    ("api", &["api", "endpoint", "route"]),
    ("database", &["database", "sql", "query", "migration"]),
    ("security", &["security", "auth", "secret", "credential"]),
];

/// Relevance of `item` to `task`: word overlap plus a boost when the task
/// text mentions keywords belonging to the item's category.
pub fn relevance(item: &MentorScriptItem, task: &str) -> f64 {
    let mut score = jaccard(&item.text, task);
    if let Some((_, keywords)) = CATEGORY_KEYWORDS.iter().find(|(cat, _)| *cat == item.category) {
        let lower = task.to_lowercase();
        if keywords.iter().any(|k| lower.contains(k)) {
            score += 0.3;
        }
    }
    score.min(1.0)
}

/// Exponential recency decay: 1.0 at `updated_at == now`, halving every
/// `recency_decay_days`.
pub fn recency(item: &MentorScriptItem, decay_days: u32) -> f64 {
    let age_days = (Utc::now() - item.updated_at).num_seconds() as f64 / 86_400.0;
    let decay_days = decay_days.max(1) as f64;
    0.5f64.powf((age_days.max(0.0)) / decay_days)
}

/// Combined score for one item against the current task formula.
pub fn score_item(item: &MentorScriptItem, task: &str, cfg: &GuidanceConfig) -> f64 {
    let relevance_score = relevance(item, task);
    let priority_score = item.priority as f64 / 10.0;
    let usage_score = (item.applied_count as f64 / 100.0).min(1.0);
    let recency_score = recency(item, cfg.recency_decay_days);

    0.40 * relevance_score + 0.25 * priority_score + 0.20 * usage_score + 0.15 * recency_score
}

/// Result of selecting guidance items within a token budget.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub loaded: Vec<MentorScriptItem>,
    pub excluded: Vec<MentorScriptItem>,
    pub total_tokens_used: u32,
    pub budget_percentage: u8,
}

/// Greedily admit items by descending score until adding the next one would
/// exceed `context_budget * context_budget_percent / 100` tokens, then stop:
/// `loaded` is always a score-descending prefix of the sorted items, never a
/// sparser subset with smaller, lower-scored items admitted behind a gap.
pub fn select_items(items: &[MentorScriptItem], task: &str, context_budget: u32, cfg: &GuidanceConfig) -> SelectionResult {
    let target = (context_budget as f64 * cfg.context_budget_percent as f64 / 100.0) as u32;

    let mut scored: Vec<(f64, &MentorScriptItem)> = items.iter().map(|i| (score_item(i, task, cfg), i)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut loaded = Vec::new();
    let mut excluded = Vec::new();
    let mut used = 0u32;

    let mut iter = scored.into_iter();
    for (_, item) in iter.by_ref() {
        let cost = estimate_tokens(&item.text);
        if used + cost > target {
            excluded.push(item.clone());
            break;
        }
        used += cost;
        loaded.push(item.clone());
    }
    excluded.extend(iter.map(|(_, item)| item.clone()));

    SelectionResult {
        loaded,
        excluded,
        total_tokens_used: used,
        budget_percentage: cfg.context_budget_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::types::ItemSource;

    fn item(text: &str, priority: u8) -> MentorScriptItem {
        MentorScriptItem::new(text, "general", priority, ItemSource::UserDefined, None, None)
    }

    #[test]
    fn selection_respects_token_budget() {
        let cfg = GuidanceConfig::default();
        let items: Vec<MentorScriptItem> = (0..50)
            .map(|i| item(&"x".repeat(400), (i % 10 + 1) as u8))
            .collect();
        let result = select_items(&items, "general task", 500, &cfg);
        assert!(result.total_tokens_used <= 350);
        assert!(!result.loaded.is_empty());
    }

    #[test]
    fn higher_score_items_are_preferred() {
        let cfg = GuidanceConfig::default();
        let items = vec![item("irrelevant filler about nothing", 1), item("write tests for every change", 10)];
        let result = select_items(&items, "please write tests", 50, &cfg);
        assert_eq!(result.loaded[0].text, "write tests for every change");
    }

    #[test]
    fn jaccard_is_symmetric_and_bounded() {
        let score = jaccard("write tests", "tests write code");
        assert!(score > 0.0 && score <= 1.0);
        assert_eq!(jaccard("a", "a"), jaccard("a", "a"));
    }

    #[test]
    fn admission_stops_at_first_overflow_instead_of_packing_smaller_items_behind_it() {
        let cfg = GuidanceConfig::default();
        // A big, highest-priority item that alone blows the budget, followed
        // by several small items that would each fit individually.
        let items = vec![item(&"x".repeat(400), 10), item("short", 1), item("also short", 1)];
        let result = select_items(&items, "task", 50, &cfg);
        assert!(result.loaded.is_empty());
        assert_eq!(result.excluded.len(), 3);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::guidance::types::ItemSource;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn admitted_tokens_never_exceed_the_budget(
            specs in proptest::collection::vec((1usize..200, 1u8..=10), 1..20),
            budget in 50u32..2000,
        ) {
            let cfg = GuidanceConfig::default();
            let items: Vec<MentorScriptItem> = specs
                .iter()
                .map(|(len, priority)| {
                    MentorScriptItem::new("x".repeat(*len), "general", *priority, ItemSource::UserDefined, None, None)
                })
                .collect();
            let result = select_items(&items, "some task", budget, &cfg);
            let target = (budget as f64 * cfg.context_budget_percent as f64 / 100.0) as u32;
            prop_assert!(result.total_tokens_used <= target);
        }

        #[test]
        fn loaded_items_are_a_score_descending_prefix(
            specs in proptest::collection::vec((1usize..100, 1u8..=10), 2..15),
            budget in 50u32..2000,
        ) {
            let cfg = GuidanceConfig::default();
            let items: Vec<MentorScriptItem> = specs
                .iter()
                .map(|(len, priority)| {
                    MentorScriptItem::new("x".repeat(*len), "general", *priority, ItemSource::UserDefined, None, None)
                })
                .collect();
            let result = select_items(&items, "some task", budget, &cfg);
            let scores: Vec<f64> = result.loaded.iter().map(|i| score_item(i, "some task", &cfg)).collect();
            let mut sorted = scores.clone();
            sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
            prop_assert_eq!(scores, sorted);
        }
    }
}
