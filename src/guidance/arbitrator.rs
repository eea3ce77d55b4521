//! Layered precedence arbitrator: merges guidance from several
//! precedence layers into one prompt section, letting a higher layer's
//! position on a topic override a lower layer's.

use serde::{Deserialize, Serialize};

/// Precedence layers, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Constitutional,
    User,
    Plugin,
    Briefing,
}

/// One piece of guidance attributed to a layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceEntry {
    pub text: String,
    pub layer: Layer,
}

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("code", &["code", "function", "variable", "class"]),
    ("formatting", &["format", "tabs", "spaces", "indent", "style"]),
    ("interaction", &["ask", "confirm", "explain", "tone"]),
    ("tone", &["tone", "voice", "formal", "casual"]),
    ("debugging", &["debug", "bug", "error", "trace"]),
    ("testing", &["test", "tests", "coverage"]),
    ("documentation", &["doc", "comment", "readme"]),
    ("api", &["api", "endpoint", "route"]),
    ("database", &["database", "sql", "query", "migration"]),
    ("security", &["security", "auth", "secret", "credential"]),
];

/// Determine a coarse topic label for a piece of guidance text.
pub fn detect_topic(text: &str) -> String {
    let lower = text.to_lowercase();
    for (topic, keywords) in TOPIC_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return topic.to_string();
        }
    }
    lower
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// For each topic, keep only the entry from the highest-precedence layer
/// claiming it; entries whose topic is unclaimed by a higher layer pass
/// through unchanged. `sources` must be ordered highest-precedence first.
pub fn filter_overridden(sources: &[Vec<GuidanceEntry>]) -> Vec<GuidanceEntry> {
    let mut claimed_topics: Vec<String> = Vec::new();
    let mut result = Vec::new();

    for layer_entries in sources {
        for entry in layer_entries {
            let topic = detect_topic(&entry.text);
            if claimed_topics.contains(&topic) {
                continue;
            }
            result.push(entry.clone());
        }
        for entry in layer_entries {
            let topic = detect_topic(&entry.text);
            if !claimed_topics.contains(&topic) {
                claimed_topics.push(topic);
            }
        }
    }

    result
}

/// Merge the four layers into one prompt section with fixed headers,
/// applying [`filter_overridden`] across them in precedence order.
pub fn merge(constitutional: Vec<String>, user: Vec<String>, plugin: Vec<String>, briefing: Vec<String>) -> String {
    let to_entries = |texts: Vec<String>, layer: Layer| {
        texts
            .into_iter()
            .map(|text| GuidanceEntry { text, layer })
            .collect::<Vec<_>>()
    };

    let sources = vec![
        to_entries(constitutional, Layer::Constitutional),
        to_entries(user, Layer::User),
        to_entries(plugin, Layer::Plugin),
        to_entries(briefing, Layer::Briefing),
    ];
    let filtered = filter_overridden(&sources);

    let mut output = String::new();
    for layer in [Layer::Constitutional, Layer::User, Layer::Plugin, Layer::Briefing] {
        let entries: Vec<&GuidanceEntry> = filtered.iter().filter(|e| e.layer == layer).collect();
        if entries.is_empty() {
            continue;
        }
        output.push_str(&format!("## {:?} guidance\n", layer));
        for entry in entries {
            output.push_str("- ");
            output.push_str(&entry.text);
            output.push('\n');
        }
        output.push('\n');
    }
    output
}

/// A group of entries across layers that claim the same topic.
#[derive(Debug, Clone)]
pub struct ConflictGroup {
    pub topic: String,
    pub entries: Vec<GuidanceEntry>,
}

/// Find topics claimed by more than one entry across all four layers.
pub fn detect_conflicts(constitutional: &[String], user: &[String], plugin: &[String], briefing: &[String]) -> Vec<ConflictGroup> {
    let mut all: Vec<GuidanceEntry> = Vec::new();
    for (texts, layer) in [
        (constitutional, Layer::Constitutional),
        (user, Layer::User),
        (plugin, Layer::Plugin),
        (briefing, Layer::Briefing),
    ] {
        for text in texts {
            all.push(GuidanceEntry {
                text: text.clone(),
                layer,
            });
        }
    }

    let mut groups: Vec<ConflictGroup> = Vec::new();
    for entry in all {
        let topic = detect_topic(&entry.text);
        if let Some(group) = groups.iter_mut().find(|g| g.topic == topic) {
            group.entries.push(entry);
        } else {
            groups.push(ConflictGroup {
                topic,
                entries: vec![entry],
            });
        }
    }

    groups.retain(|g| g.entries.len() >= 2);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_layer_overrides_plugin_on_same_topic() {
        let merged = merge(
            vec![],
            vec!["Format code with tabs".to_string()],
            vec!["Format code with spaces".to_string()],
            vec![],
        );
        assert!(merged.contains("tabs"));
        assert!(!merged.contains("spaces"));
    }

    #[test]
    fn conflicting_topic_is_reported_once() {
        let conflicts = detect_conflicts(
            &[],
            &["Format code with tabs".to_string()],
            &["Format code with spaces".to_string()],
            &[],
        );
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].entries.len(), 2);
    }

    #[test]
    fn unrelated_topics_all_pass_through() {
        let merged = merge(
            vec!["Never reveal internal secrets".to_string()],
            vec!["Always write tests".to_string()],
            vec![],
            vec![],
        );
        assert!(merged.contains("secrets"));
        assert!(merged.contains("tests"));
    }
}
