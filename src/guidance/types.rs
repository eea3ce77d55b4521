//! Core data model for the guidance engine: guidance items,
//! reference docs, per-project state, and the VCR (version/change-record) log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a guidance item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    #[default]
    UserDefined,
    Inferred,
}

/// A single piece of project guidance ("mentor script item").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorScriptItem {
    pub id: String,
    pub text: String,
    pub category: String,
    /// 1 (lowest) through 10 (highest).
    pub priority: u8,
    pub source: ItemSource,
    pub applied_count: u32,
    /// The corrective turn this item was inferred from. Present whenever
    /// `source` is `Inferred`.
    pub original_correction: Option<String>,
    /// Session this item was promoted from, if any.
    pub promoted_from_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MentorScriptItem {
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        priority: u8,
        source: ItemSource,
        original_correction: Option<String>,
        promoted_from_session: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            category: category.into(),
            priority: priority.clamp(1, 10),
            source,
            applied_count: 0,
            original_correction,
            promoted_from_session,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A reference document attached to a project (not versioned by the VCR).
/// Keyed by `path`, which must be unique within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDoc {
    pub path: String,
    pub context: String,
    pub added_at: DateTime<Utc>,
}

/// All guidance state for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectGuidance {
    pub project_id: String,
    pub items: Vec<MentorScriptItem>,
    pub reference_docs: Vec<ReferenceDoc>,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl ProjectGuidance {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            items: Vec::new(),
            reference_docs: Vec::new(),
            version: 0,
            last_updated: Utc::now(),
        }
    }
}

/// The closed set of mutating actions the VCR log can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcrAction {
    Add,
    Edit,
    Remove,
}

/// One entry in a project's version/change-record log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vcr {
    pub version: u64,
    pub action: VcrAction,
    pub item_id: String,
    pub before: Option<MentorScriptItem>,
    pub after: Option<MentorScriptItem>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle state of an inferred rule proposal awaiting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Edited,
    Accepted,
    Dismissed,
}

/// A candidate guidance item inferred from a correction in conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleProposal {
    pub id: String,
    pub session_id: String,
    pub proposed_text: String,
    pub category: String,
    pub original_correction: String,
    pub confidence: f64,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl RuleProposal {
    pub fn new(
        session_id: impl Into<String>,
        proposed_text: impl Into<String>,
        category: impl Into<String>,
        confidence: f64,
        original_correction: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            proposed_text: proposed_text.into(),
            category: category.into(),
            original_correction: original_correction.into(),
            confidence,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Replace the proposed text with a user edit, transitioning to `Edited`.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.proposed_text = text.into();
        self.status = ProposalStatus::Edited;
    }

    /// Mark the proposal accepted. Does not itself touch the Guidance Store;
    /// see `GuidanceStore::accept_proposal` for promotion into a store item.
    pub fn accept(&mut self) {
        self.status = ProposalStatus::Accepted;
    }

    pub fn dismiss(&mut self) {
        self.status = ProposalStatus::Dismissed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> RuleProposal {
        RuleProposal::new("session-1", "write tests first", "testing", 0.8, "always write tests first")
    }

    #[test]
    fn new_proposal_is_pending() {
        assert_eq!(proposal().status, ProposalStatus::Pending);
    }

    #[test]
    fn edit_replaces_text_and_transitions() {
        let mut p = proposal();
        p.edit("write tests before committing");
        assert_eq!(p.status, ProposalStatus::Edited);
        assert_eq!(p.proposed_text, "write tests before committing");
    }

    #[test]
    fn accept_and_dismiss_transition_to_terminal_states() {
        let mut accepted = proposal();
        accepted.accept();
        assert_eq!(accepted.status, ProposalStatus::Accepted);

        let mut dismissed = proposal();
        dismissed.dismiss();
        assert_eq!(dismissed.status, ProposalStatus::Dismissed);
    }
}
