//! Backend call contract.
//!
//! Agents talk to the model backend only through [`LlmProvider`]. Network
//! providers live outside this workspace; [`MockProvider`] backs the tests
//! and local experiments.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ia_core::types::TokenUsage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend call failure. Orchestration wraps and propagates these as-is;
/// nothing in the workspace retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    /// Connection, DNS or TLS failure before a response arrived.
    #[error("backend unreachable: {0}")]
    Http(String),

    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed backend response: {0}")]
    Parse(String),

    #[error("backend rate limit hit (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("backend call timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Messages and call parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

impl LlmRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmRole::System => "system",
            LlmRole::User => "user",
            LlmRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for LlmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: LlmRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(LlmRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(LlmRole::Assistant, content)
    }
}

/// Parameters of one completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Concrete backend model id, never a tier name.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".into(),
            max_tokens: 2048,
            temperature: 1.0,
            system_prompt: None,
        }
    }
}

/// Generated text plus the backend's own token accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    /// Model that served the call. Empty means "whatever was requested".
    #[serde(default)]
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub finish_reason: String,
}

impl LlmResponse {
    pub fn new(content: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            content: content.into(),
            model: String::new(),
            input_tokens,
            output_tokens,
            finish_reason: "end_turn".into(),
        }
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(self.input_tokens, self.output_tokens)
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One completion over `messages`. No streaming.
    async fn complete(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<LlmResponse, LlmError>;
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

type Responder = dyn Fn(&[LlmMessage], &LlmConfig) -> Result<LlmResponse, LlmError> + Send + Sync;

/// One call as the mock saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    pub messages: Vec<LlmMessage>,
    pub config: LlmConfig,
}

impl CapturedCall {
    /// Content of the last message sent.
    pub fn prompt(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<LlmResponse, LlmError>>,
    calls: Vec<CapturedCall>,
}

/// Scripted in-memory backend.
///
/// Replies come from the queue first, then from the responder if one is
/// set, then fall back to `"Mock response"` with 10 input / 5 output tokens.
/// Clones share the script and the call log.
#[derive(Clone, Default)]
pub struct MockProvider {
    script: Arc<Mutex<Script>>,
    responder: Option<Arc<Responder>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: LlmResponse) -> Self {
        self.script().queued.push_back(Ok(response));
        self
    }

    pub fn with_reply(
        self,
        content: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        self.with_response(LlmResponse::new(content, input_tokens, output_tokens))
    }

    pub fn with_error(self, error: LlmError) -> Self {
        self.script().queued.push_back(Err(error));
        self
    }

    /// Compute replies from the request once the queue runs dry.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[LlmMessage], &LlmConfig) -> Result<LlmResponse, LlmError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<CapturedCall> {
        self.script().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script().calls.len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        messages: &[LlmMessage],
        config: &LlmConfig,
    ) -> Result<LlmResponse, LlmError> {
        let queued = {
            let mut script = self.script();
            script.calls.push(CapturedCall {
                messages: messages.to_vec(),
                config: config.clone(),
            });
            script.queued.pop_front()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut response = match (queued, &self.responder) {
            (Some(scripted), _) => scripted?,
            (None, Some(responder)) => responder(messages, config)?,
            (None, None) => LlmResponse::new("Mock response", 10, 5),
        };
        if response.model.is_empty() {
            response.model = config.model.clone();
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str) -> LlmConfig {
        LlmConfig {
            model: model.into(),
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn fallback_reply_takes_requested_model() {
        let mock = MockProvider::new();
        let reply = mock.complete(&[LlmMessage::user("ping")], &config("m-1")).await.unwrap();
        assert_eq!(reply.content, "Mock response");
        assert_eq!(reply.model, "m-1");
        assert_eq!(reply.usage().total_tokens(), 15);
    }

    #[tokio::test]
    async fn queue_drains_before_responder() {
        let mock = MockProvider::new()
            .with_reply("scripted", 1, 2)
            .with_error(LlmError::Timeout)
            .with_responder(|messages, _| {
                Ok(LlmResponse::new(messages[0].content.to_uppercase(), 1, 1))
            });
        let cfg = config("m");

        let first = mock.complete(&[LlmMessage::user("a")], &cfg).await.unwrap();
        assert_eq!(first.content, "scripted");
        assert_eq!(
            mock.complete(&[LlmMessage::user("b")], &cfg).await,
            Err(LlmError::Timeout)
        );
        let third = mock.complete(&[LlmMessage::user("c")], &cfg).await.unwrap();
        assert_eq!(third.content, "C");
    }

    #[tokio::test]
    async fn clones_share_call_log() {
        let mock = MockProvider::new();
        let handle = mock.clone();
        let cfg = LlmConfig {
            system_prompt: Some("terse".into()),
            ..config("m")
        };
        handle
            .complete(&[LlmMessage::assistant("earlier"), LlmMessage::user("now")], &cfg)
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(mock.call_count(), 1);
        assert_eq!(calls[0].prompt(), "now");
        assert_eq!(calls[0].config.system_prompt.as_deref(), Some("terse"));
    }

    #[test]
    fn error_messages() {
        let err = LlmError::Api {
            status: 529,
            message: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "backend returned status 529: overloaded");
        assert_eq!(LlmError::Timeout.to_string(), "backend call timed out");
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&LlmRole::Assistant).unwrap(), "\"assistant\"");
        let role: LlmRole = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, LlmRole::System);
        assert_eq!(LlmRole::User.to_string(), "user");
    }
}
