//! VCR log: an append-only, per-project version/change record
//! used for audit and rollback.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::types::{Vcr, VcrAction};

/// Append-only, per-project VCR log. Guarded by a single mutex, mirroring
/// the store's own per-project lock granularity.
#[derive(Default)]
pub struct VcrLog {
    entries: Mutex<HashMap<String, Vec<Vcr>>>,
}

impl VcrLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, project_id: &str, entry: Vcr) {
        let mut entries = self.entries.lock().expect("vcr log mutex poisoned");
        entries.entry(project_id.to_string()).or_default().push(entry);
    }

    /// Full history for a project, oldest first.
    pub fn history(&self, project_id: &str) -> Vec<Vcr> {
        self.entries
            .lock()
            .expect("vcr log mutex poisoned")
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Full history for a project, newest first.
    pub fn reversed(&self, project_id: &str) -> Vec<Vcr> {
        let mut history = self.history(project_id);
        history.reverse();
        history
    }

    pub fn by_version(&self, project_id: &str, version: u64) -> Option<Vcr> {
        self.history(project_id).into_iter().find(|v| v.version == version)
    }

    pub fn latest(&self, project_id: &str) -> Option<Vcr> {
        self.history(project_id).into_iter().last()
    }

    pub fn by_item_id(&self, project_id: &str, item_id: &str) -> Vec<Vcr> {
        self.history(project_id)
            .into_iter()
            .filter(|v| v.item_id == item_id)
            .collect()
    }

    pub fn since_version(&self, project_id: &str, version: u64) -> Vec<Vcr> {
        self.history(project_id)
            .into_iter()
            .filter(|v| v.version > version)
            .collect()
    }

    pub fn by_action(&self, project_id: &str, action: VcrAction) -> Vec<Vcr> {
        self.history(project_id)
            .into_iter()
            .filter(|v| v.action == action)
            .collect()
    }

    pub fn by_time_range(&self, project_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Vcr> {
        self.history(project_id)
            .into_iter()
            .filter(|v| v.timestamp >= start && v.timestamp <= end)
            .collect()
    }

    pub fn current_version(&self, project_id: &str) -> u64 {
        self.latest(project_id).map(|v| v.version).unwrap_or(0)
    }

    pub fn version_exists(&self, project_id: &str, version: u64) -> bool {
        self.by_version(project_id, version).is_some()
    }

    pub fn available_versions(&self, project_id: &str) -> Vec<u64> {
        self.history(project_id).into_iter().map(|v| v.version).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::types::MentorScriptItem;
    use crate::guidance::types::ItemSource;

    fn entry(version: u64, action: VcrAction, item_id: &str) -> Vcr {
        Vcr {
            version,
            action,
            item_id: item_id.to_string(),
            before: None,
            after: Some(MentorScriptItem::new("text", "general", 5, ItemSource::UserDefined, None, None)),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn history_is_append_order_and_reversed_flips_it() {
        let log = VcrLog::new();
        log.append("p1", entry(1, VcrAction::Add, "a"));
        log.append("p1", entry(2, VcrAction::Add, "b"));
        assert_eq!(log.history("p1").len(), 2);
        assert_eq!(log.reversed("p1").first().unwrap().version, 2);
    }

    #[test]
    fn since_version_filters_strictly_greater() {
        let log = VcrLog::new();
        log.append("p1", entry(1, VcrAction::Add, "a"));
        log.append("p1", entry(2, VcrAction::Edit, "a"));
        log.append("p1", entry(3, VcrAction::Remove, "a"));
        assert_eq!(log.since_version("p1", 1).len(), 2);
    }

    #[test]
    fn projects_are_isolated() {
        let log = VcrLog::new();
        log.append("p1", entry(1, VcrAction::Add, "a"));
        assert!(log.history("p2").is_empty());
        assert_eq!(log.current_version("p2"), 0);
    }
}
