pub mod context_builder;
pub mod cost_tracker;
pub mod evaluator;
pub mod llm;

// Re-export the backend contract for convenience.
pub use llm::{
    CapturedCall, LlmConfig, LlmError, LlmMessage, LlmProvider, LlmResponse, LlmRole,
    MockProvider as LlmMockProvider,
};

pub use context_builder::{
    BuiltContext, ContextBuilder, ContextParams, ConversationMessage, UserProfile,
};
pub use cost_tracker::{CostTracker, NoopSink, UsageSink};
pub use evaluator::{
    EvaluationConfig, EvaluationResult, Evaluator, ExecutionOutput, TestCase, TestCategory,
};
