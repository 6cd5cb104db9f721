use std::sync::Arc;

use async_trait::async_trait;
use ia_core::clock::{Clock, SystemClock};
use ia_core::config::ModelCatalog;
use ia_core::types::{AgentRequest, AgentResponse, ModelTier, TokenUsageRecord};
use ia_intelligence::cost_tracker::CostTracker;
use ia_intelligence::llm::{LlmConfig, LlmMessage, LlmProvider};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{OrchestrationError, Result};

// ---------------------------------------------------------------------------
// Agent trait
// ---------------------------------------------------------------------------

/// Anything the orchestrators can call: one request in, one response out.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse>;
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: ModelTier,
    #[serde(default)]
    pub system_prompt: String,
    /// Falls back to the catalog default when unset.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Names of tools the agent may call. Informational only.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tier,
            system_prompt: String::new(),
            max_tokens: None,
            temperature: None,
            tools: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }
}

// ---------------------------------------------------------------------------
// LlmAgent
// ---------------------------------------------------------------------------

/// Agent backed by one LLM call per request.
///
/// Every successful call appends exactly one usage record to the shared
/// [`CostTracker`], with the agent name as the feature.
pub struct LlmAgent {
    config: AgentConfig,
    model: String,
    default_max_tokens: u32,
    provider: Arc<dyn LlmProvider>,
    tracker: CostTracker,
    clock: Arc<dyn Clock>,
}

impl LlmAgent {
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn LlmProvider>,
        tracker: CostTracker,
        catalog: &ModelCatalog,
    ) -> Self {
        Self {
            model: catalog.resolve(config.tier).to_string(),
            default_max_tokens: catalog.default_max_tokens,
            config,
            provider,
            tracker,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Concrete backend model this agent's tier resolved to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run `request` under a caller-chosen request id.
    pub async fn execute_with_id(
        &self,
        request: &AgentRequest,
        request_id: &str,
    ) -> Result<AgentResponse> {
        let name = self.config.name.as_str();
        info!(agent = %name, request_id, model = %self.model, "agent call started");

        let llm_config = self.llm_config();
        let messages = [LlmMessage::user(request.message.clone())];

        let started = self.clock.now();
        let response = match self.provider.complete(&messages, &llm_config).await {
            Ok(response) => response,
            Err(source) => {
                error!(agent = %name, request_id, error = %source, "agent call failed");
                return Err(OrchestrationError::Backend {
                    agent: name.to_string(),
                    source,
                });
            }
        };
        let latency_ms = self.clock.elapsed_ms(started);
        let usage = response.usage();

        let mut record =
            TokenUsageRecord::new(request_id, self.model.clone(), usage, self.clock.now())
                .with_feature(name);
        record.user_id = request.user_id.clone();
        record.session_id = request.session_id.clone();
        self.tracker.track(record).await;

        info!(
            agent = %name,
            request_id,
            latency_ms,
            tokens = usage.total_tokens(),
            "agent call completed"
        );

        Ok(AgentResponse {
            content: response.content,
            usage,
            latency_ms,
            model: self.model.clone(),
        })
    }

    fn llm_config(&self) -> LlmConfig {
        let defaults = LlmConfig::default();
        LlmConfig {
            model: self.model.clone(),
            max_tokens: self.config.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: self.config.temperature.unwrap_or(defaults.temperature),
            system_prompt: if self.config.system_prompt.is_empty() {
                None
            } else {
                Some(self.config.system_prompt.clone())
            },
        }
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let request_id = Uuid::new_v4().to_string();
        self.execute_with_id(request, &request_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ia_intelligence::llm::MockProvider;

    #[test]
    fn llm_config_falls_back_to_catalog_and_defaults() {
        let catalog = ModelCatalog::default();
        let agent = LlmAgent::new(
            AgentConfig::new("writer", ModelTier::TopTier),
            Arc::new(MockProvider::new()),
            CostTracker::default(),
            &catalog,
        );
        let cfg = agent.llm_config();
        assert_eq!(cfg.model, catalog.top_tier);
        assert_eq!(cfg.max_tokens, 2048);
        assert_eq!(cfg.temperature, 1.0);
        assert!(cfg.system_prompt.is_none());
    }

    #[test]
    fn llm_config_uses_agent_overrides() {
        let agent = LlmAgent::new(
            AgentConfig::new("writer", ModelTier::LowCost)
                .with_max_tokens(256)
                .with_temperature(0.2)
                .with_system_prompt("Be brief."),
            Arc::new(MockProvider::new()),
            CostTracker::default(),
            &ModelCatalog::default(),
        );
        let cfg = agent.llm_config();
        assert_eq!(cfg.max_tokens, 256);
        assert_eq!(cfg.temperature, 0.2);
        assert_eq!(cfg.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn agent_config_deserializes_tier_alias() {
        let cfg: AgentConfig =
            serde_json::from_str(r#"{"name": "triage", "tier": "haiku"}"#).unwrap();
        assert_eq!(cfg.tier, ModelTier::LowCost);
        assert!(cfg.tools.is_empty());
    }
}
