use std::sync::Arc;

use ia_agents::agent::{AgentConfig, LlmAgent};
use ia_agents::pipeline::SequentialPipeline;
use ia_agents::OrchestrationError;
use ia_core::config::ModelCatalog;
use ia_core::types::{AgentRequest, ModelTier, TokenUsage};
use ia_intelligence::cost_tracker::CostTracker;
use ia_intelligence::llm::{LlmError, LlmResponse, MockProvider};

fn stage(name: &str, provider: &MockProvider, tracker: &CostTracker) -> Arc<LlmAgent> {
    Arc::new(LlmAgent::new(
        AgentConfig::new(name, ModelTier::LowCost),
        Arc::new(provider.clone()),
        tracker.clone(),
        &ModelCatalog::default(),
    ))
}

#[tokio::test]
async fn test_empty_pipeline_fails() {
    let pipeline = SequentialPipeline::new();
    assert!(pipeline.is_empty());
    let err = pipeline.execute(&AgentRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::EmptyPipeline));
}

#[tokio::test]
async fn test_stage_output_becomes_next_message() {
    let tracker = CostTracker::default();
    let first = MockProvider::new().with_reply("draft", 10, 20);
    let second = MockProvider::new().with_reply("polished", 30, 40);

    let mut pipeline = SequentialPipeline::new();
    pipeline
        .add_stage(stage("drafter", &first, &tracker))
        .add_stage(stage("editor", &second, &tracker));
    assert_eq!(pipeline.len(), 2);

    let request = AgentRequest::new("write a haiku").with_user("u-1");
    let response = pipeline.execute(&request).await.unwrap();

    assert_eq!(first.calls()[0].prompt(), "write a haiku");
    assert_eq!(second.calls()[0].prompt(), "draft");

    assert_eq!(response.content, "polished");
    assert_eq!(response.usage, TokenUsage::new(40, 60));
    assert_eq!(response.usage.total_tokens(), 100);
    assert_eq!(response.model, "pipeline");

    // The user id is carried through every stage.
    let records = tracker.records().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.user_id.as_deref() == Some("u-1")));
    assert_eq!(records[1].feature.as_deref(), Some("editor"));
}

#[tokio::test]
async fn test_usage_sums_over_n_stages() {
    let tracker = CostTracker::default();
    let provider = MockProvider::new().with_responder(|messages, _| {
        let depth = messages[0].content.len() as u64;
        Ok(LlmResponse::new(format!("{}x", messages[0].content), depth, 1))
    });

    let mut pipeline = SequentialPipeline::new();
    for i in 0..4 {
        pipeline.add_stage(stage(&format!("stage-{i}"), &provider, &tracker));
    }

    let response = pipeline.execute(&AgentRequest::new("x")).await.unwrap();
    assert_eq!(response.content, "xxxxx");
    // Input tokens are 1, 2, 3, 4 across the stages.
    assert_eq!(response.usage, TokenUsage::new(10, 4));
    assert_eq!(tracker.request_count().await, 4);
}

#[tokio::test]
async fn test_failing_stage_aborts_remaining_stages() {
    let tracker = CostTracker::default();
    let ok = MockProvider::new();
    let broken = MockProvider::new().with_error(LlmError::Http("connection reset".into()));
    let never = MockProvider::new();

    let mut pipeline = SequentialPipeline::new();
    pipeline
        .add_stage(stage("a", &ok, &tracker))
        .add_stage(stage("b", &broken, &tracker))
        .add_stage(stage("c", &never, &tracker));

    let err = pipeline.execute(&AgentRequest::new("go")).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Backend { ref agent, .. } if agent == "b"));
    assert_eq!(never.call_count(), 0);
    assert_eq!(tracker.request_count().await, 1);
}
