//! The generation service seam.

use async_trait::async_trait;
use claude::{Claude, Message, Request, RetryPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// What a generation call is for. Picks model and temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Year-by-year narrative generation.
    Bulk,
    /// Low-temperature structured output (arc design, previews).
    Structured,
    /// High-quality prose expansion.
    Prose,
}

impl GenerationKind {
    pub fn name(&self) -> &'static str {
        match self {
            GenerationKind::Bulk => "bulk",
            GenerationKind::Structured => "structured",
            GenerationKind::Prose => "prose",
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Service(#[from] claude::Error),

    #[error("generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Service(e) => e.is_transient(),
            GenerationError::Failed(_) => false,
        }
    }

    /// Errors no retry or later call can fix: missing or rejected credentials.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenerationError::Service(
                claude::Error::NoApiKey
                    | claude::Error::Config(_)
                    | claude::Error::Api { status: 401 | 403, .. }
            )
        )
    }
}

/// Anything that turns a prompt into free text.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, kind: GenerationKind) -> Result<String, GenerationError>;
}

/// Model and temperature for one [`GenerationKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSettings {
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub bulk: KindSettings,
    pub structured: KindSettings,
    pub prose: KindSettings,
    pub max_tokens: usize,
    pub retry: RetryPolicy,
    pub system: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            bulk: KindSettings {
                model: "claude-sonnet-4-20250514".to_string(),
                temperature: 0.9,
            },
            structured: KindSettings {
                model: "claude-sonnet-4-20250514".to_string(),
                temperature: 0.3,
            },
            prose: KindSettings {
                model: "claude-opus-4-20250514".to_string(),
                temperature: 0.8,
            },
            max_tokens: 8192,
            retry: RetryPolicy::default(),
            system: None,
        }
    }
}

impl GeneratorConfig {
    pub fn settings(&self, kind: GenerationKind) -> &KindSettings {
        match kind {
            GenerationKind::Bulk => &self.bulk,
            GenerationKind::Structured => &self.structured,
            GenerationKind::Prose => &self.prose,
        }
    }

    /// Use one model for every kind.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.bulk.model = model.clone();
        self.structured.model = model.clone();
        self.prose.model = model;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// [`GenerationService`] backed by the Claude Messages API.
#[derive(Clone)]
pub struct ClaudeGenerator {
    client: Claude,
    config: GeneratorConfig,
}

impl ClaudeGenerator {
    pub fn new(client: Claude, config: GeneratorConfig) -> Self {
        let client = client.with_retry_policy(config.retry);
        Self { client, config }
    }

    /// Client from `ANTHROPIC_API_KEY` with default settings.
    pub fn from_env() -> Result<Self, GenerationError> {
        Ok(Self::new(Claude::from_env()?, GeneratorConfig::default()))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

#[async_trait]
impl GenerationService for ClaudeGenerator {
    async fn generate(&self, prompt: &str, kind: GenerationKind) -> Result<String, GenerationError> {
        let settings = self.config.settings(kind);
        let mut request = Request::new(vec![Message::user(prompt)])
            .with_model(settings.model.clone())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(settings.temperature);
        if let Some(system) = &self.config.system {
            request = request.with_system(system.clone());
        }

        debug!(kind = kind.name(), model = %settings.model, chars = prompt.len(), "generation call");
        let response = self.client.complete_with_retry(&request).await?;
        debug!(
            kind = kind.name(),
            output_tokens = response.usage.output_tokens,
            "generation complete"
        );
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_per_kind() {
        let config = GeneratorConfig::default();
        assert!(config.settings(GenerationKind::Structured).temperature < config.settings(GenerationKind::Bulk).temperature);

        let config = config.with_model("claude-test");
        for kind in [GenerationKind::Bulk, GenerationKind::Structured, GenerationKind::Prose] {
            assert_eq!(config.settings(kind).model, "claude-test");
        }
    }

    #[test]
    fn test_generator_applies_retry_policy() {
        let client = Claude::new("test-key").unwrap();
        let retry = RetryPolicy::default().with_max_retries(1);
        let generator = ClaudeGenerator::new(client, GeneratorConfig::default().with_retry(retry));
        assert_eq!(generator.client.retry_policy().max_retries, 1);
    }

    #[test]
    fn test_error_transience() {
        let err: GenerationError = claude::Error::RateLimited("slow down".into()).into();
        assert!(err.is_transient());
        assert!(!GenerationError::Failed("bad".into()).is_transient());

        let err: GenerationError = claude::Error::Api { status: 401, message: "bad key".into() }.into();
        assert!(err.is_fatal());
        assert!(!GenerationError::Failed("bad".into()).is_fatal());
    }
}
