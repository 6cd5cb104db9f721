//! Fan-out of one request to several agents at once.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use ia_core::types::{
    AgentRequest, AgentResponse, TokenUsage, CONCURRENT_MODEL_TAG, RESPONSE_SEPARATOR,
};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::{OrchestrationError, Result};

#[derive(Default)]
pub struct ConcurrentExecutor {
    agents: Vec<Arc<dyn Agent>>,
}

impl ConcurrentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) -> &mut Self {
        self.agents.push(agent);
        self
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Send `request` to every agent concurrently.
    ///
    /// Responses come back in registration order. Any failure fails the whole
    /// call and the other in-flight calls are dropped.
    pub async fn execute(&self, request: &AgentRequest) -> Result<Vec<AgentResponse>> {
        info!(agents = self.agents.len(), "concurrent execution started");
        let responses = try_join_all(self.agents.iter().map(|agent| agent.execute(request))).await?;
        info!(responses = responses.len(), "concurrent execution completed");
        Ok(responses)
    }

    /// Like [`execute`](Self::execute), bounded by `timeout`. On expiry the
    /// outstanding calls are cancelled.
    pub async fn execute_with_timeout(
        &self,
        request: &AgentRequest,
        timeout: Duration,
    ) -> Result<Vec<AgentResponse>> {
        match tokio::time::timeout(timeout, self.execute(request)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(timeout_ms, "concurrent execution timed out");
                Err(OrchestrationError::Timeout { timeout_ms })
            }
        }
    }

    /// Combine responses into one: contents joined with a separator, usage
    /// summed, latency is the slowest response (calls ran in parallel).
    pub fn merge(responses: &[AgentResponse]) -> AgentResponse {
        AgentResponse {
            content: responses
                .iter()
                .map(|r| r.content.as_str())
                .collect::<Vec<_>>()
                .join(RESPONSE_SEPARATOR),
            usage: responses.iter().map(|r| r.usage).sum::<TokenUsage>(),
            latency_ms: responses.iter().map(|r| r.latency_ms).max().unwrap_or(0),
            model: CONCURRENT_MODEL_TAG.to_string(),
        }
    }
}
