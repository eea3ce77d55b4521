//! Error taxonomy for the router and guidance engine.
//!
//! A closed set of error kinds, each carrying a `retryable` flag
//! and, where the failure happened mid-route, a partial [`MergeReadinessPack`]
//! snapshot for diagnosis.

use thiserror::Error;

use crate::mrp::MergeReadinessPack;

/// Result type alias using this crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing a request or mutating project guidance.
#[derive(Error, Debug)]
pub enum Error {
    /// Classifier returned non-JSON, failed schema validation, or timed out.
    #[error("classification failed: {message}")]
    ClassificationFailed {
        message: String,
        partial: Option<Box<MergeReadinessPack>>,
    },

    /// Internal inconsistency in routing (e.g. no model registered for a tier).
    #[error("routing failed: {message}")]
    RoutingFailed {
        message: String,
        partial: Option<Box<MergeReadinessPack>>,
    },

    /// Provider reports unavailable, or the model id is unknown to the registry.
    #[error("model unavailable: {model_id}")]
    ModelUnavailable {
        model_id: String,
        partial: Option<Box<MergeReadinessPack>>,
    },

    /// A phase exceeded its configured time budget.
    #[error("{phase} timed out after {duration_ms}ms")]
    Timeout {
        phase: String,
        duration_ms: u64,
        partial: Option<Box<MergeReadinessPack>>,
    },

    /// Judge response failed to parse; callers may fall back to a quick-validate verdict.
    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        partial: Option<Box<MergeReadinessPack>>,
    },

    /// Wraps a native provider error (network/5xx/rate-limit are retryable, others are not).
    #[error("provider error ({provider}): {message}")]
    ProviderError {
        provider: String,
        message: String,
        retryable: bool,
        partial: Option<Box<MergeReadinessPack>>,
    },

    /// Request failed validation before any phase ran.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error, including unrecognized config keys.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the phase that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ClassificationFailed { .. } => true,
            Error::RoutingFailed { .. } => false,
            Error::ModelUnavailable { .. } => true,
            Error::Timeout { .. } => true,
            Error::ValidationFailed { .. } => false,
            Error::ProviderError { retryable, .. } => *retryable,
            Error::InvalidRequest(_) => false,
            Error::Serialization(_) => false,
            Error::Config(_) => false,
            Error::Internal(_) => false,
        }
    }

    pub fn classification_failed(message: impl Into<String>) -> Self {
        Self::ClassificationFailed {
            message: message.into(),
            partial: None,
        }
    }

    pub fn routing_failed(message: impl Into<String>) -> Self {
        Self::RoutingFailed {
            message: message.into(),
            partial: None,
        }
    }

    pub fn model_unavailable(model_id: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model_id: model_id.into(),
            partial: None,
        }
    }

    pub fn timeout(phase: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            phase: phase.into(),
            duration_ms,
            partial: None,
        }
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            partial: None,
        }
    }

    pub fn provider_error(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
            retryable,
            partial: None,
        }
    }

    /// Attach a partial MRP snapshot to whichever variant supports it.
    pub fn with_partial(mut self, mrp: MergeReadinessPack) -> Self {
        let slot = match &mut self {
            Error::ClassificationFailed { partial, .. } => Some(partial),
            Error::RoutingFailed { partial, .. } => Some(partial),
            Error::ModelUnavailable { partial, .. } => Some(partial),
            Error::Timeout { partial, .. } => Some(partial),
            Error::ValidationFailed { partial, .. } => Some(partial),
            Error::ProviderError { partial, .. } => Some(partial),
            _ => None,
        };
        if let Some(slot) = slot {
            *slot = Some(Box::new(mrp));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_match_taxonomy() {
        assert!(Error::classification_failed("bad json").is_retryable());
        assert!(!Error::routing_failed("no model for tier").is_retryable());
        assert!(Error::model_unavailable("gpt-9").is_retryable());
        assert!(Error::timeout("classify", 5000).is_retryable());
        assert!(!Error::validation_failed("judge parse error").is_retryable());
        assert!(Error::provider_error("mock", "rate limited", true).is_retryable());
        assert!(!Error::provider_error("mock", "bad request", false).is_retryable());
        assert!(!Error::InvalidRequest("missing input".into()).is_retryable());
    }
}
