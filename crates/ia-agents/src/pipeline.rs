//! Sequential composition: each stage receives the previous stage's output.

use std::sync::Arc;

use ia_core::types::{AgentRequest, AgentResponse, TokenUsage, PIPELINE_MODEL_TAG};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::{OrchestrationError, Result};

#[derive(Default)]
pub struct SequentialPipeline {
    stages: Vec<Arc<dyn Agent>>,
}

impl SequentialPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Stages run in the order they were added.
    pub fn add_stage(&mut self, agent: Arc<dyn Agent>) -> &mut Self {
        self.stages.push(agent);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, feeding each one's content to the next as
    /// its message. The first failure aborts the run.
    ///
    /// The result carries the last stage's content, the summed usage and
    /// latency of all stages, and the model tag `"pipeline"`.
    pub async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse> {
        if self.stages.is_empty() {
            return Err(OrchestrationError::EmptyPipeline);
        }
        info!(stages = self.stages.len(), "pipeline started");

        let mut current = request.clone();
        let mut usage = TokenUsage::default();
        let mut latency_ms = 0u64;
        let mut content = String::new();

        for (index, stage) in self.stages.iter().enumerate() {
            debug!(stage = index, agent = %stage.name(), "running pipeline stage");
            let response = stage.execute(&current).await?;

            usage = usage + response.usage;
            latency_ms += response.latency_ms;
            current = current.with_message(response.content.clone());
            content = response.content;
        }

        info!(latency_ms, tokens = usage.total_tokens(), "pipeline completed");
        Ok(AgentResponse {
            content,
            usage,
            latency_ms,
            model: PIPELINE_MODEL_TAG.to_string(),
        })
    }
}
