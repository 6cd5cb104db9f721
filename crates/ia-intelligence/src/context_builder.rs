//! Prompt context assembly under per-section token budgets.
//!
//! Token counts are estimated at four characters per token. This is a cheap
//! heuristic, not a tokenizer: callers must not rely on exact counts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ia_core::clock::{Clock, SystemClock};
use ia_core::config::ContextBudgets;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::LlmRole;

const CHARS_PER_TOKEN: usize = 4;
const ELLIPSIS: &str = "...";
const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Approximate token count: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Cut `text` to `max_tokens * 4` characters plus an ellipsis when its
/// estimate exceeds the budget. No word-boundary awareness.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_tokens * CHARS_PER_TOKEN).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub preferences: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: LlmRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: LlmRole, content: impl Into<String>) -> Self {
        Self::stamped(role, content, &SystemClock)
    }

    /// Message timestamped from `clock`.
    pub fn stamped(role: LlmRole, content: impl Into<String>, clock: &dyn Clock) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: clock.now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextParams {
    pub system_prompt: String,
    pub user_profile: Option<UserProfile>,
    pub domain_knowledge: Vec<String>,
    pub history: Vec<ConversationMessage>,
}

impl ContextParams {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_user_profile(mut self, profile: UserProfile) -> Self {
        self.user_profile = Some(profile);
        self
    }

    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.domain_knowledge = documents;
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Assembled prompt sections. `total_tokens` is the sum of the section
/// estimates, not an exact count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltContext {
    pub system_prompt: String,
    pub user_context: Option<String>,
    pub domain_knowledge: Option<String>,
    pub conversation_history: Option<String>,
    pub total_tokens: usize,
}

// ---------------------------------------------------------------------------
// ContextBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    budgets: ContextBudgets,
}

impl ContextBuilder {
    pub fn new(budgets: ContextBudgets) -> Self {
        Self { budgets }
    }

    pub fn budgets(&self) -> &ContextBudgets {
        &self.budgets
    }

    /// Render and truncate each present section independently.
    pub fn build(&self, params: &ContextParams) -> BuiltContext {
        let system_prompt = truncate_to_tokens(&params.system_prompt, self.budgets.system_prompt);
        let mut total_tokens = estimate_tokens(&system_prompt);

        let user_context = params.user_profile.as_ref().map(|p| self.user_context(p));
        let domain_knowledge = if params.domain_knowledge.is_empty() {
            None
        } else {
            Some(self.domain_knowledge(&params.domain_knowledge))
        };
        let conversation_history = if params.history.is_empty() {
            None
        } else {
            Some(self.history(&params.history))
        };

        for section in [&user_context, &domain_knowledge, &conversation_history]
            .into_iter()
            .flatten()
        {
            total_tokens += estimate_tokens(section);
        }

        if total_tokens > self.budgets.max_tokens {
            warn!(
                total_tokens,
                max_tokens = self.budgets.max_tokens,
                "built context exceeds overall token budget"
            );
        } else {
            debug!(total_tokens, "context built");
        }

        BuiltContext {
            system_prompt,
            user_context,
            domain_knowledge,
            conversation_history,
            total_tokens,
        }
    }

    fn user_context(&self, profile: &UserProfile) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &profile.name {
            lines.push(format!("Name: {name}"));
        }
        if let Some(role) = &profile.role {
            lines.push(format!("Role: {role}"));
        }
        if let Some(preferences) = &profile.preferences {
            let rendered = serde_json::to_string(preferences).unwrap_or_default();
            lines.push(format!("Preferences: {rendered}"));
        }
        truncate_to_tokens(&lines.join("\n"), self.budgets.user_context)
    }

    fn domain_knowledge(&self, documents: &[String]) -> String {
        truncate_to_tokens(&documents.join(DOCUMENT_SEPARATOR), self.budgets.domain_knowledge)
    }

    fn history(&self, messages: &[ConversationMessage]) -> String {
        let keep = self.budgets.history_messages.min(messages.len());
        let rendered = messages[messages.len() - keep..]
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    LlmRole::User => "User",
                    LlmRole::Assistant => "Assistant",
                    LlmRole::System => "System",
                };
                format!("{speaker}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        truncate_to_tokens(&rendered, self.budgets.history)
    }
}
