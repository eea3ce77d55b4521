//! Provider registry and executor.
//!
//! A single provider interface keyed by provider name, dispatched through a
//! registry with per-call timeout enforcement. Real HTTP-backed providers
//! are out of scope; the default registration is a deterministic mock so
//! classifier/validator call sites stay exercisable without network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::{Error, Result};
use crate::model::ModelRegistry;

/// A role in a chat exchange passed to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
}

/// A single message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Requested response shape; `Json` asks the mock provider for a
/// schema-shaped reply instead of free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    Json,
}

/// What a completion call is for. The mock provider uses this to decide
/// which deterministic JSON shape to synthesize; a real HTTP-backed
/// provider would ignore it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPurpose {
    Classification,
    Validation,
    General,
}

/// Wire request shape (mocked): `{model, messages, temperature?, maxTokens?, responseFormat?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub purpose: CompletionPurpose,
}

impl CompletionOptions {
    pub fn new(model: impl Into<String>, purpose: CompletionPurpose) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            response_format: None,
            purpose,
        }
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Wire response shape (mocked): `{content, model, inputTokens, outputTokens, latencyMs}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub content: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
}

/// A chat-completion backend, keyed into the registry by provider name.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    async fn complete(&self, options: CompletionOptions) -> Result<CompletionOutcome>;
}

/// Registry of providers by name, with per-call timeout enforcement.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// A registry pre-populated with the default mock provider under `"mock"`.
    pub fn with_default_mock() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MockProvider::new("mock")));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn providers(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.providers.get(name).is_some_and(|p| p.is_available())
    }

    /// Resolve `model_id` to a provider, enforce availability and a
    /// per-call timeout, and wrap non-router errors as provider errors.
    #[instrument(skip(self, options), fields(model_id))]
    pub async fn execute(
        &self,
        model_id: &str,
        options: CompletionOptions,
        timeout_ms: u64,
    ) -> Result<CompletionOutcome> {
        let model = ModelRegistry::get_model_by_id(model_id)
            .ok_or_else(|| Error::model_unavailable(model_id))?;

        let provider = self
            .providers
            .get(model.provider.as_str())
            .ok_or_else(|| Error::model_unavailable(model_id))?;

        if !provider.is_available() {
            warn!(model_id, provider = provider.name(), "provider unavailable");
            return Err(Error::model_unavailable(model_id));
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), provider.complete(options))
            .await
        {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(Error::ProviderError {
                message, retryable, ..
            })) => Err(Error::provider_error(provider.name(), message, retryable)),
            Ok(Err(other)) => Err(other),
            Err(_) => Err(Error::timeout("execute", timeout_ms)),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_mock()
    }
}

/// Deterministic in-process provider. Generates content shaped by
/// `purpose`/`response_format` so classifier and validator call sites are
/// exercisable without a network dependency.
pub struct MockProvider {
    name: String,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn estimate_tokens(text: &str) -> u64 {
        ((text.len() as f64 / 4.0).ceil() as u64).max(1)
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, options: CompletionOptions) -> Result<CompletionOutcome> {
        let start = Instant::now();
        let input = options.last_user_content().to_string();
        let input_tokens = Self::estimate_tokens(&input);

        let content = match (options.purpose, options.response_format) {
            (CompletionPurpose::Classification, _) => {
                crate::classifier::mock_classification_json(&input)
            }
            (CompletionPurpose::Validation, _) => crate::validator::mock_validation_json(&input),
            (_, Some(ResponseFormat::Json)) => "{}".to_string(),
            _ => format!("mock response to: {input}"),
        };
        let output_tokens = Self::estimate_tokens(&content);

        Ok(CompletionOutcome {
            content,
            model: options.model,
            input_tokens,
            output_tokens,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_rejects_unknown_model() {
        let registry = ProviderRegistry::with_default_mock();
        let opts = CompletionOptions::new("nope", CompletionPurpose::General);
        let err = registry.execute("nope", opts, 1000).await.unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn execute_dispatches_to_mock() {
        let registry = ProviderRegistry::with_default_mock();
        let opts = CompletionOptions::new("mock-fast", CompletionPurpose::General)
            .with_message(ChatMessage::user("hello there"));
        let outcome = registry.execute("mock-fast", opts, 1000).await.unwrap();
        assert!(outcome.content.contains("hello there"));
        assert!(outcome.input_tokens > 0);
    }

    #[test]
    fn providers_lists_registered_names() {
        let registry = ProviderRegistry::with_default_mock();
        assert_eq!(registry.providers(), vec!["mock"]);
        assert!(registry.is_available("mock"));
        assert!(!registry.is_available("anthropic"));
    }
}
