use std::sync::Arc;
use std::time::Duration;

use ia_agents::agent::{AgentConfig, LlmAgent};
use ia_agents::concurrent::ConcurrentExecutor;
use ia_agents::OrchestrationError;
use ia_core::config::ModelCatalog;
use ia_core::types::{AgentRequest, ModelTier, TokenUsage};
use ia_intelligence::cost_tracker::CostTracker;
use ia_intelligence::llm::{LlmError, MockProvider};

fn agent(name: &str, provider: MockProvider) -> Arc<LlmAgent> {
    Arc::new(LlmAgent::new(
        AgentConfig::new(name, ModelTier::MidTier),
        Arc::new(provider),
        CostTracker::default(),
        &ModelCatalog::default(),
    ))
}

#[tokio::test]
async fn test_results_follow_registration_order() {
    let mut executor = ConcurrentExecutor::new();
    executor
        .add_agent(agent(
            "slow",
            MockProvider::new()
                .with_reply("slow answer", 1, 1)
                .with_delay(Duration::from_millis(60)),
        ))
        .add_agent(agent("fast", MockProvider::new().with_reply("fast answer", 1, 1)));

    let responses = executor.execute(&AgentRequest::new("q")).await.unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].content, "slow answer");
    assert_eq!(responses[1].content, "fast answer");
}

#[tokio::test]
async fn test_every_agent_sees_identical_request() {
    let a = MockProvider::new();
    let b = MockProvider::new();
    let mut executor = ConcurrentExecutor::new();
    executor.add_agent(agent("a", a.clone())).add_agent(agent("b", b.clone()));

    executor.execute(&AgentRequest::new("same prompt")).await.unwrap();
    assert_eq!(a.calls()[0].messages, b.calls()[0].messages);
}

#[tokio::test]
async fn test_agents_run_in_parallel() {
    let mut executor = ConcurrentExecutor::new();
    for i in 0..4 {
        executor.add_agent(agent(
            &format!("a{i}"),
            MockProvider::new().with_delay(Duration::from_millis(100)),
        ));
    }

    let started = std::time::Instant::now();
    executor.execute(&AgentRequest::new("q")).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_one_failure_fails_the_batch() {
    let mut executor = ConcurrentExecutor::new();
    executor
        .add_agent(agent("ok", MockProvider::new()))
        .add_agent(agent("down", MockProvider::new().with_error(LlmError::Timeout)));

    let err = executor.execute(&AgentRequest::new("q")).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Backend { ref agent, .. } if agent == "down"));
}

#[tokio::test]
async fn test_timeout_returns_no_partial_results() {
    let mut executor = ConcurrentExecutor::new();
    executor
        .add_agent(agent("fast", MockProvider::new()))
        .add_agent(agent(
            "stuck",
            MockProvider::new().with_delay(Duration::from_secs(5)),
        ));

    let err = executor
        .execute_with_timeout(&AgentRequest::new("q"), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::Timeout { timeout_ms: 50 }));
}

#[tokio::test]
async fn test_timeout_not_hit_returns_results() {
    let mut executor = ConcurrentExecutor::new();
    executor.add_agent(agent("fast", MockProvider::new().with_reply("hi", 2, 3)));

    let responses = executor
        .execute_with_timeout(&AgentRequest::new("q"), Duration::from_secs(5))
        .await
        .unwrap();
    let merged = ConcurrentExecutor::merge(&responses);
    assert_eq!(merged.content, "hi");
    assert_eq!(merged.usage, TokenUsage::new(2, 3));
    assert_eq!(merged.model, "concurrent");
}
