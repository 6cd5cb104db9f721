//! Dependency-ordered execution of a task plan across registered agents.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures_util::future::try_join_all;
use ia_core::types::{
    AgentRequest, AgentResponse, TokenUsage, MULTI_AGENT_MODEL_TAG, RESPONSE_SEPARATOR,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::agent::Agent;
use crate::{OrchestrationError, Result};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One unit of work in a [`Plan`]. Ready once every task named in
/// `dependencies` has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub assigned_agent: String,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        assigned_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            assigned_agent: assigned_agent.into(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.insert(task_id.into());
        self
    }
}

/// Tasks for a single request. Built fresh per request, dependencies must
/// form a DAG.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<Task>,
}

impl Plan {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }
}

/// Result of one executed task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: String,
    pub agent: String,
    /// Zero-based wave the task ran in.
    pub wave: usize,
    pub response: AgentResponse,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Turns a request into a [`Plan`] over the registered agent names.
pub trait Planner: Send + Sync {
    fn plan(&self, request: &AgentRequest, agents: &[String]) -> Plan;
}

/// One independent task per registered agent, in registration order. Every
/// task lands in the first wave.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPlanner;

impl Planner for DefaultPlanner {
    fn plan(&self, request: &AgentRequest, agents: &[String]) -> Plan {
        let tasks = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| {
                Task::new(format!("task-{}", i + 1), request.message.clone(), agent.clone())
            })
            .collect();
        Plan::new(tasks)
    }
}

// ---------------------------------------------------------------------------
// SupervisorOrchestrator
// ---------------------------------------------------------------------------

pub struct SupervisorOrchestrator {
    agents: Vec<(String, Arc<dyn Agent>)>,
    planner: Box<dyn Planner>,
}

impl Default for SupervisorOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorOrchestrator {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            planner: Box::new(DefaultPlanner),
        }
    }

    pub fn with_planner(mut self, planner: impl Planner + 'static) -> Self {
        self.planner = Box::new(planner);
        self
    }

    /// Register `agent` under `name`. An existing entry with the same name is
    /// replaced in place and keeps its position.
    pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) {
        let name = name.into();
        match self.agents.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => {
                debug!(agent = %name, "replacing registered agent");
                slot.1 = agent;
            }
            None => {
                debug!(agent = %name, "registering agent");
                self.agents.push((name, agent));
            }
        }
    }

    /// Registered names, in registration order.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|(n, _)| n.clone()).collect()
    }

    fn agent(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Plan, run and aggregate. Latency is summed across tasks since waves
    /// run one after another.
    pub async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let plan = self.planner.plan(request, &self.agent_names());
        let outcomes = self.execute_plan(&plan, request).await?;

        let responses: Vec<&AgentResponse> = outcomes.iter().map(|o| &o.response).collect();
        Ok(AgentResponse {
            content: responses
                .iter()
                .map(|r| r.content.as_str())
                .collect::<Vec<_>>()
                .join(RESPONSE_SEPARATOR),
            usage: responses.iter().map(|r| r.usage).sum::<TokenUsage>(),
            latency_ms: responses.iter().map(|r| r.latency_ms).sum(),
            model: MULTI_AGENT_MODEL_TAG.to_string(),
        })
    }

    /// Run `plan` in dependency waves. Each wave executes every ready task
    /// concurrently with the original request; a failing task fails the plan.
    ///
    /// Outcomes are ordered by wave, then by position in the plan.
    pub async fn execute_plan(
        &self,
        plan: &Plan,
        request: &AgentRequest,
    ) -> Result<Vec<TaskOutcome>> {
        self.validate(plan)?;
        info!(tasks = plan.tasks.len(), "executing plan");

        let mut completed: HashSet<&str> = HashSet::new();
        let mut outcomes = Vec::with_capacity(plan.tasks.len());
        let mut wave = 0usize;

        while completed.len() < plan.tasks.len() {
            let ready: Vec<&Task> = plan
                .tasks
                .iter()
                .filter(|t| !completed.contains(t.id.as_str()))
                .filter(|t| t.dependencies.iter().all(|d| completed.contains(d.as_str())))
                .collect();

            if ready.is_empty() {
                let pending: Vec<String> = plan
                    .tasks
                    .iter()
                    .filter(|t| !completed.contains(t.id.as_str()))
                    .map(|t| t.id.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                error!(?pending, "plan has circular dependencies");
                return Err(OrchestrationError::PlanCycle { pending });
            }

            debug!(wave, tasks = ready.len(), "starting wave");
            let calls = ready.iter().map(|task| async move {
                let agent = self
                    .agent(&task.assigned_agent)
                    .ok_or_else(|| OrchestrationError::AgentNotFound(task.assigned_agent.clone()))?;
                let response = agent.execute(request).await?;
                Ok::<_, OrchestrationError>(TaskOutcome {
                    task_id: task.id.clone(),
                    agent: task.assigned_agent.clone(),
                    wave,
                    response,
                })
            });
            outcomes.extend(try_join_all(calls).await?);

            completed.extend(ready.iter().map(|t| t.id.as_str()));
            wave += 1;
        }

        info!(waves = wave, tasks = outcomes.len(), "plan completed");
        Ok(outcomes)
    }

    /// Reject plans with repeated task ids or references to unknown agents or
    /// tasks before any call is made.
    fn validate(&self, plan: &Plan) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::new();
        for task in &plan.tasks {
            if !ids.insert(task.id.as_str()) {
                return Err(OrchestrationError::DuplicateTask(task.id.clone()));
            }
        }
        for task in &plan.tasks {
            if self.agent(&task.assigned_agent).is_none() {
                return Err(OrchestrationError::AgentNotFound(task.assigned_agent.clone()));
            }
            if let Some(missing) = task.dependencies.iter().find(|d| !ids.contains(d.as_str())) {
                return Err(OrchestrationError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_planner_numbers_tasks_in_order() {
        let agents = vec!["research".to_string(), "write".to_string()];
        let plan = DefaultPlanner.plan(&AgentRequest::new("topic"), &agents);
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].id, "task-1");
        assert_eq!(plan.tasks[1].assigned_agent, "write");
        assert!(plan.tasks.iter().all(|t| t.dependencies.is_empty()));
        assert_eq!(plan.tasks[0].description, "topic");
    }

    #[test]
    fn task_deserializes_without_dependencies() {
        let task: Task = serde_json::from_str(
            r#"{"id": "a", "description": "d", "assigned_agent": "x"}"#,
        )
        .unwrap();
        assert!(task.dependencies.is_empty());
    }
}
