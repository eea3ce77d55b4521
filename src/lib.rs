//! # osqr-router
//!
//! A tiered LLM dispatch-and-repair router paired with a project guidance
//! (mentorship-as-code) engine.
//!
//! ## Core Components
//!
//! - **Router**: classify → select tier → execute → validate → escalate,
//!   sealed into a [`mrp::MergeReadinessPack`] audit record for every request.
//! - **Guidance**: a versioned per-project rule store with a VCR change log,
//!   a correction-inference pipeline, a token-budgeted context selector, and
//!   a layered precedence arbitrator.
//!
//! ## Example
//!
//! ```rust,ignore
//! use osqr_router::{Request, Router, RouterConfig, ProviderRegistry};
//!
//! # async fn run() -> osqr_router::Result<()> {
//! let router = Router::new(ProviderRegistry::with_default_mock(), RouterConfig::default());
//! let request = Request::new("What is 2+2?", "session-1");
//! let response = router.route(&request).await?;
//! println!("{}", response.output);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod escalation;
pub mod guidance;
pub mod model;
pub mod mrp;
pub mod provider;
pub mod route;
pub mod tier_selector;
pub mod validator;

pub use classifier::{classify, quick_classify, ClassificationResult, TaskType};
pub use config::{GuidanceConfig, RouterConfig};
pub use error::{Error, Result};
pub use escalation::{handle_escalation, needs_escalation, EscalationOutcome};
pub use guidance::{
    ConflictGroup, GuidanceEntry, GuidanceStore, InferenceResult, ItemSource, Layer,
    MentorScriptItem, ProjectGuidance, ReferenceDoc, RuleProposal, SelectionResult, TurnPair,
    Vcr, VcrAction, VcrLog,
};
pub use model::{Model, ModelRegistry, Provider};
pub use mrp::{AttemptUsage, EscalationRecord, MergeReadinessPack, MrpBuilder, RoutingDecisionRecord};
pub use provider::{
    ChatMessage, ChatProvider, ChatRole, CompletionOptions, CompletionOutcome, CompletionPurpose,
    MockProvider, ProviderRegistry, ResponseFormat,
};
pub use route::{InputType, Request, Response, ResponseMetadata, Router};
pub use tier_selector::{select_tier, TierSelection};
pub use validator::{
    merge_validation_results, quick_validate, should_skip_validation, validate, IssueKind,
    IssueSeverity, ValidationIssue, ValidationResult,
};
