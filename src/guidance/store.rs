//! Guidance Store: per-project CRUD over guidance items and
//! reference docs, backed by an in-memory map and an append-only VCR log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, instrument};

use crate::config::GuidanceConfig;
use crate::error::{Error, Result};

use super::types::{ItemSource, MentorScriptItem, ProjectGuidance, ReferenceDoc, RuleProposal, Vcr, VcrAction};
use super::vcr::VcrLog;

/// Parameters for adding a new guidance item, mirroring the optional fields
/// of the add-item request (`rule`, `priority?`, `source?`,
/// `originalCorrection?`, `sessionId?`).
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub text: String,
    pub category: String,
    pub priority: Option<u8>,
    pub source: ItemSource,
    pub original_correction: Option<String>,
    pub session_id: Option<String>,
}

impl NewItem {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_source(mut self, source: ItemSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_original_correction(mut self, original_correction: impl Into<String>) -> Self {
        self.original_correction = Some(original_correction.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Per-project guidance state, mutated through a single process-wide mutex.
///
/// Mirrors the connection-guarded-by-a-mutex pattern used elsewhere in this
/// crate for shared mutable state, scaled down from a persistent backing
/// store to a pure in-memory map (guidance persistence is out of scope here).
pub struct GuidanceStore {
    projects: Mutex<HashMap<String, ProjectGuidance>>,
    vcr: Arc<VcrLog>,
    config: GuidanceConfig,
}

impl GuidanceStore {
    pub fn new(config: GuidanceConfig) -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
            vcr: Arc::new(VcrLog::new()),
            config,
        }
    }

    pub fn vcr_log(&self) -> Arc<VcrLog> {
        Arc::clone(&self.vcr)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProjectGuidance>> {
        self.projects.lock().expect("guidance store mutex poisoned")
    }

    /// Current state for a project, if it has ever been touched.
    pub fn get(&self, project_id: &str) -> Option<ProjectGuidance> {
        self.lock().get(project_id).cloned()
    }

    /// Current state for a project, creating an empty one on first access.
    pub fn ensure(&self, project_id: &str) -> ProjectGuidance {
        self.lock()
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectGuidance::new(project_id))
            .clone()
    }

    #[instrument(skip(self, new_item), fields(project_id))]
    pub fn add_item(&self, project_id: &str, new_item: NewItem) -> Result<MentorScriptItem> {
        if new_item.source == ItemSource::Inferred && new_item.original_correction.is_none() {
            return Err(Error::InvalidRequest(
                "inferred guidance items require an original_correction".to_string(),
            ));
        }

        let mut projects = self.lock();
        let project = projects
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectGuidance::new(project_id));

        if project.items.len() >= self.config.hard_limit {
            return Err(Error::InvalidRequest(format!(
                "project {project_id} is at its hard limit of {} guidance items",
                self.config.hard_limit
            )));
        }

        let item = MentorScriptItem::new(
            new_item.text,
            new_item.category,
            new_item.priority.unwrap_or(self.config.default_priority),
            new_item.source,
            new_item.original_correction,
            new_item.session_id,
        );
        project.items.push(item.clone());
        project.version += 1;
        project.last_updated = Utc::now();

        if project.items.len() >= self.config.soft_limit {
            debug!(project_id, count = project.items.len(), "guidance item count at or above soft limit");
        }

        self.vcr.append(
            project_id,
            Vcr {
                version: project.version,
                action: VcrAction::Add,
                item_id: item.id.clone(),
                before: None,
                after: Some(item.clone()),
                timestamp: Utc::now(),
            },
        );

        Ok(item)
    }

    pub fn update_item(
        &self,
        project_id: &str,
        item_id: &str,
        text: Option<String>,
        priority: Option<u8>,
    ) -> Result<MentorScriptItem> {
        let mut projects = self.lock();
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown project {project_id}")))?;

        let idx = project
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown item {item_id}")))?;

        let before = project.items[idx].clone();
        let item = &mut project.items[idx];
        if let Some(text) = text {
            item.text = text;
        }
        if let Some(priority) = priority {
            item.priority = priority.clamp(1, 10);
        }
        item.updated_at = Utc::now();
        let after = item.clone();

        project.version += 1;
        project.last_updated = Utc::now();

        self.vcr.append(
            project_id,
            Vcr {
                version: project.version,
                action: VcrAction::Edit,
                item_id: item_id.to_string(),
                before: Some(before),
                after: Some(after.clone()),
                timestamp: Utc::now(),
            },
        );

        Ok(after)
    }

    pub fn remove_item(&self, project_id: &str, item_id: &str) -> Result<()> {
        let mut projects = self.lock();
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown project {project_id}")))?;

        let idx = project
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown item {item_id}")))?;

        let removed = project.items.remove(idx);
        project.version += 1;
        project.last_updated = Utc::now();

        self.vcr.append(
            project_id,
            Vcr {
                version: project.version,
                action: VcrAction::Remove,
                item_id: item_id.to_string(),
                before: Some(removed),
                after: None,
                timestamp: Utc::now(),
            },
        );

        Ok(())
    }

    /// Bump `applied_count` on one item, recorded as an Edit VCR entry.
    pub fn increment_applied_count(&self, project_id: &str, item_id: &str) -> Result<MentorScriptItem> {
        self.batch_increment(project_id, &[item_id.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidRequest(format!("unknown item {item_id}")))
    }

    /// Bump `applied_count` on several items in one call. Each item still
    /// gets its own Edit VCR entry and its own version bump, since the VCR
    /// data model records one before/after pair per entry.
    pub fn batch_increment(&self, project_id: &str, item_ids: &[String]) -> Result<Vec<MentorScriptItem>> {
        let mut projects = self.lock();
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown project {project_id}")))?;

        let mut updated = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let idx = project
                .items
                .iter()
                .position(|i| &i.id == item_id)
                .ok_or_else(|| Error::InvalidRequest(format!("unknown item {item_id}")))?;

            let before = project.items[idx].clone();
            project.items[idx].applied_count += 1;
            project.items[idx].updated_at = Utc::now();
            let after = project.items[idx].clone();

            project.version += 1;
            self.vcr.append(
                project_id,
                Vcr {
                    version: project.version,
                    action: VcrAction::Edit,
                    item_id: item_id.clone(),
                    before: Some(before),
                    after: Some(after.clone()),
                    timestamp: Utc::now(),
                },
            );
            updated.push(after);
        }
        project.last_updated = Utc::now();

        Ok(updated)
    }

    /// Reference docs bump `version`/`last_updated` but are not part of the
    /// VCR's item-scoped data model, so no VCR entry is appended here.
    /// Rejects a `path` that already exists in the project, enforcing the
    /// unique-paths invariant on `reference_docs`.
    pub fn add_reference_doc(
        &self,
        project_id: &str,
        path: impl Into<String>,
        context: impl Into<String>,
    ) -> Result<ReferenceDoc> {
        let mut projects = self.lock();
        let project = projects
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectGuidance::new(project_id));

        let path = path.into();
        if project.reference_docs.iter().any(|d| d.path == path) {
            return Err(Error::InvalidRequest(format!(
                "reference doc path {path} already exists in project {project_id}"
            )));
        }

        let doc = ReferenceDoc {
            path,
            context: context.into(),
            added_at: Utc::now(),
        };
        project.reference_docs.push(doc.clone());
        project.version += 1;
        project.last_updated = Utc::now();
        Ok(doc)
    }

    pub fn remove_reference_doc(&self, project_id: &str, path: &str) -> Result<()> {
        let mut projects = self.lock();
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown project {project_id}")))?;

        let before_len = project.reference_docs.len();
        project.reference_docs.retain(|d| d.path != path);
        if project.reference_docs.len() == before_len {
            return Err(Error::InvalidRequest(format!("unknown reference doc path {path}")));
        }
        project.version += 1;
        project.last_updated = Utc::now();
        Ok(())
    }

    /// Promote an accepted rule proposal into a first-class guidance item,
    /// carrying `original_correction`/`session_id` as provenance and emitting
    /// the usual Add VCR entry. Marks `proposal` accepted on success.
    pub fn accept_proposal(
        &self,
        project_id: &str,
        proposal: &mut RuleProposal,
        priority: Option<u8>,
    ) -> Result<MentorScriptItem> {
        let mut new_item = NewItem::new(proposal.proposed_text.clone(), proposal.category.clone())
            .with_source(ItemSource::Inferred)
            .with_original_correction(proposal.original_correction.clone())
            .with_session_id(proposal.session_id.clone());
        new_item.priority = priority;

        let item = self.add_item(project_id, new_item)?;
        proposal.accept();
        Ok(item)
    }

    /// Roll a project back to `target_version` by inverting every VCR entry
    /// newer than it, in reverse (newest-first) order.
    pub fn rollback(&self, project_id: &str, target_version: u64) -> Result<ProjectGuidance> {
        let to_undo = self.vcr.since_version(project_id, target_version);

        let mut projects = self.lock();
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown project {project_id}")))?;

        for entry in to_undo.into_iter().rev() {
            match entry.action {
                VcrAction::Add => {
                    project.items.retain(|i| i.id != entry.item_id);
                }
                VcrAction::Remove => {
                    if let Some(before) = entry.before {
                        project.items.push(before);
                    }
                }
                VcrAction::Edit => {
                    if let Some(before) = entry.before {
                        if let Some(item) = project.items.iter_mut().find(|i| i.id == entry.item_id) {
                            *item = before;
                        }
                    }
                }
            }
        }

        project.version = target_version;
        project.last_updated = Utc::now();
        Ok(project.clone())
    }

    pub fn by_source(&self, project_id: &str, source: ItemSource) -> Vec<MentorScriptItem> {
        self.get(project_id)
            .map(|p| p.items.into_iter().filter(|i| i.source == source).collect())
            .unwrap_or_default()
    }

    pub fn by_priority(&self, project_id: &str) -> Vec<MentorScriptItem> {
        let mut items = self.get(project_id).map(|p| p.items).unwrap_or_default();
        items.sort_by_key(|i| std::cmp::Reverse(i.priority));
        items
    }

    pub fn by_usage(&self, project_id: &str) -> Vec<MentorScriptItem> {
        let mut items = self.get(project_id).map(|p| p.items).unwrap_or_default();
        items.sort_by_key(|i| std::cmp::Reverse(i.applied_count));
        items
    }

    pub fn is_at_soft_limit(&self, project_id: &str) -> bool {
        self.get(project_id).is_some_and(|p| p.items.len() >= self.config.soft_limit)
    }

    pub fn is_at_hard_limit(&self, project_id: &str) -> bool {
        self.get(project_id).is_some_and(|p| p.items.len() >= self.config.hard_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GuidanceStore {
        GuidanceStore::new(GuidanceConfig::default())
    }

    #[test]
    fn add_then_remove_round_trips() {
        let store = store();
        let item = store.add_item("p1", NewItem::new("always write tests", "testing")).unwrap();
        assert_eq!(store.get("p1").unwrap().items.len(), 1);
        store.remove_item("p1", &item.id).unwrap();
        assert_eq!(store.get("p1").unwrap().items.len(), 0);
    }

    #[test]
    fn hard_limit_rejects_further_adds() {
        let cfg = GuidanceConfig {
            hard_limit: 2,
            ..GuidanceConfig::default()
        };
        let store = GuidanceStore::new(cfg);
        store.add_item("p1", NewItem::new("a", "general")).unwrap();
        store.add_item("p1", NewItem::new("b", "general")).unwrap();
        let err = store.add_item("p1", NewItem::new("c", "general")).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn inferred_item_without_original_correction_is_rejected() {
        let store = store();
        let err = store
            .add_item("p1", NewItem::new("rule", "general").with_source(ItemSource::Inferred))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn rollback_replays_vcr_to_target_version() {
        let store = store();
        let first = store.add_item("p1", NewItem::new("first", "general").with_priority(5)).unwrap();
        store.add_item("p1", NewItem::new("second", "general").with_priority(8)).unwrap();
        store.add_item("p1", NewItem::new("third", "general").with_priority(3)).unwrap();
        // two increments on the priority-8 item
        let second_id = store.by_priority("p1")[0].id.clone();
        store.increment_applied_count("p1", &second_id).unwrap();
        store.increment_applied_count("p1", &second_id).unwrap();
        assert_eq!(store.get("p1").unwrap().version, 5);

        let rolled_back = store.rollback("p1", 1).unwrap();
        assert_eq!(rolled_back.items.len(), 1);
        assert_eq!(rolled_back.items[0].id, first.id);
        assert_eq!(rolled_back.items[0].applied_count, 0);
    }

    #[test]
    fn reference_docs_do_not_append_vcr_entries() {
        let store = store();
        store.add_reference_doc("p1", "README.md", "content").unwrap();
        assert!(store.vcr_log().history("p1").is_empty());
        assert_eq!(store.get("p1").unwrap().version, 1);
    }

    #[test]
    fn duplicate_reference_doc_path_is_rejected() {
        let store = store();
        store.add_reference_doc("p1", "README.md", "content").unwrap();
        let err = store.add_reference_doc("p1", "README.md", "other content").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn accepting_a_proposal_promotes_it_to_a_store_item() {
        use super::super::types::{ProposalStatus, RuleProposal};

        let store = store();
        let mut proposal = RuleProposal::new(
            "session-1",
            "always write tests first",
            "testing",
            0.9,
            "No, always write tests first",
        );

        let item = store.accept_proposal("p1", &mut proposal, None).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Accepted);
        assert_eq!(item.source, ItemSource::Inferred);
        assert_eq!(item.original_correction.as_deref(), Some("No, always write tests first"));
        assert_eq!(item.promoted_from_session.as_deref(), Some("session-1"));
        assert_eq!(store.vcr_log().history("p1").len(), 1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn project_version_strictly_increases_with_each_mutation(n_adds in 1usize..12) {
            let store = GuidanceStore::new(GuidanceConfig::default());
            let mut last_version = 0u64;
            for i in 0..n_adds {
                store
                    .add_item("p1", NewItem::new(format!("rule {i}"), "general"))
                    .unwrap();
                let version = store.get("p1").unwrap().version;
                prop_assert!(version > last_version);
                last_version = version;
            }
        }
    }
}
