//! Agent orchestration: a single agent over the LLM backend, plus the
//! sequential, concurrent and supervised ways of combining agents.

pub mod agent;
pub mod concurrent;
pub mod pipeline;
pub mod supervisor;
pub mod tools;

pub use agent::{Agent, AgentConfig, LlmAgent};
pub use concurrent::ConcurrentExecutor;
pub use pipeline::SequentialPipeline;
pub use supervisor::{DefaultPlanner, Plan, Planner, SupervisorOrchestrator, Task, TaskOutcome};
pub use tools::{Tool, ToolError, ToolRegistry, ToolResult, ToolSpec};

use ia_intelligence::llm::LlmError;

// ---------------------------------------------------------------------------
// Crate-level error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// The backend call of an agent failed. Never retried.
    #[error("agent {agent}: backend call failed: {source}")]
    Backend {
        agent: String,
        #[source]
        source: LlmError,
    },

    #[error("pipeline has no stages")]
    EmptyPipeline,

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("plan contains task id {0} more than once")]
    DuplicateTask(String),

    /// A task names a dependency that is not part of the plan.
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    /// No pending task could be scheduled; `pending` is sorted.
    #[error("plan cannot make progress, cyclic dependencies among: {}", .pending.join(", "))]
    PlanCycle { pending: Vec<String> },

    #[error("concurrent execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
