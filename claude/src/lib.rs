//! Minimal Anthropic Claude API client.
//!
//! This crate provides a focused client for Claude's Messages API with:
//! - Non-streaming completions
//! - Classification of failures into rate-limit, overload and fatal errors
//! - A retry policy with differentiated backoff per failure class

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Errors that can occur when using the Claude client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service overloaded (status {status}): {message}")]
    Overloaded { status: u16, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Classify a non-success HTTP status into an error.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => Error::RateLimited(message),
            500 | 502 | 503 | 504 | 529 => Error::Overloaded { status, message },
            _ => Error::Api { status, message },
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RateLimited(_) | Error::Overloaded { .. } | Error::Network(_)
        )
    }
}

/// Backoff policy for transient failures.
///
/// Rate-limit errors wait `rate_limit_unit × attempt`, overload and network
/// errors wait `overload_unit × attempt`. Anything else fails immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_unit: Duration,
    pub overload_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_unit: Duration::from_secs(10),
            overload_unit: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_units(mut self, rate_limit_unit: Duration, overload_unit: Duration) -> Self {
        self.rate_limit_unit = rate_limit_unit;
        self.overload_unit = overload_unit;
        self
    }

    /// Delay before retry number `attempt` (1-based), or `None` if the error
    /// should propagate.
    pub fn delay_for(&self, error: &Error, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        match error {
            Error::RateLimited(_) => Some(self.rate_limit_unit * attempt),
            Error::Overloaded { .. } | Error::Network(_) => Some(self.overload_unit * attempt),
            _ => None,
        }
    }
}

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a Claude client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        if api_key.trim().is_empty() {
            return Err(Error::NoApiKey);
        }
        Self::new(api_key)
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the retry policy used by [`Claude::complete_with_retry`].
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The default model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: &Request) -> Result<Response, Error> {
        let api_request = self.build_api_request(request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parse_response(api_response))
    }

    /// Send a completion request, retrying transient failures according to
    /// the client's [`RetryPolicy`].
    pub async fn complete_with_retry(&self, request: &Request) -> Result<Response, Error> {
        let mut attempt = 0;
        loop {
            match self.complete(request).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    attempt += 1;
                    let Some(delay) = self.retry.delay_for(&error, attempt) else {
                        return Err(error);
                    };
                    tracing::warn!(attempt, ?delay, %error, "transient API failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request) -> ApiRequest {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages,
            temperature: request.temperature,
        }
    }
}

fn parse_response(api_response: ApiResponse) -> Response {
    let text = api_response
        .content
        .into_iter()
        .filter_map(|c| match c {
            ApiContent::Text { text } => Some(text),
            ApiContent::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    let stop_reason = match api_response.stop_reason.as_deref() {
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    };

    Response {
        id: api_response.id,
        model: api_response.model,
        text,
        stop_reason,
        usage: Usage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        },
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request to send to Claude.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A completion response from Claude.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// Token usage information.
#[derive(Debug, Clone)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    content: Vec<ApiContent>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Claude::new("test-key").unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_client_with_model() {
        let client = Claude::new("test-key").unwrap().with_model("claude-3-opus");
        assert_eq!(client.model(), "claude-3-opus");
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Message::user("Hello")])
            .with_system("You are a chronicler")
            .with_max_tokens(1000)
            .with_temperature(0.7);

        assert_eq!(request.max_tokens, 1000);
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            Error::from_status(429, String::new()),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            Error::from_status(529, String::new()),
            Error::Overloaded { status: 529, .. }
        ));
        assert!(matches!(
            Error::from_status(401, String::new()),
            Error::Api { status: 401, .. }
        ));
        assert!(!Error::NoApiKey.is_transient());
        assert!(Error::Network("reset".into()).is_transient());
    }

    #[test]
    fn test_rate_limit_backs_off_longer_than_overload() {
        let policy = RetryPolicy::default();
        let rate = Error::RateLimited("slow down".into());
        let overload = Error::Overloaded {
            status: 529,
            message: String::new(),
        };

        assert_eq!(policy.delay_for(&rate, 1), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(&rate, 2), Some(Duration::from_secs(20)));
        assert_eq!(policy.delay_for(&overload, 2), Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_retry_cap_and_fatal_errors() {
        let policy = RetryPolicy::default();
        let rate = Error::RateLimited(String::new());
        assert!(policy.delay_for(&rate, 3).is_some());
        assert_eq!(policy.delay_for(&rate, 4), None);

        let fatal = Error::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(policy.delay_for(&fatal, 1), None);
        assert_eq!(RetryPolicy::none().delay_for(&rate, 1), None);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "model": "m",
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "1}"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 4}
        }"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = parse_response(api);
        assert_eq!(response.text, "{\"a\":1}");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.output_tokens, 4);
    }
}
