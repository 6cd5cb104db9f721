//! Tools an agent can be given: a declared parameter list, a JSON input
//! schema for the backend, and a name-keyed registry that validates calls
//! before dispatching them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Arguments of a tool call, keyed by parameter name.
pub type ToolParams = Map<String, Value>;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("tool {tool}: missing required parameters: {}", .missing.join(", "))]
    MissingParameters { tool: String, missing: Vec<String> },
}

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ToolParameter {
    pub fn required(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Check that every required parameter is present in `params`.
    pub fn validate(&self, params: &ToolParams) -> Result<(), ToolError> {
        let missing: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| p.required && !params.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        for name in &missing {
            warn!(tool = %self.name, parameter = %name, "missing required parameter");
        }
        Err(ToolError::MissingParameters {
            tool: self.name.clone(),
            missing,
        })
    }

    /// Backend tool definition: `{ name, description, input_schema }`.
    pub fn to_schema(&self) -> Value {
        let properties: BTreeMap<&str, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.as_str(),
                    json!({ "type": p.kind, "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    /// Run the tool. Failures of the tool itself are reported in the result.
    async fn execute(&self, params: ToolParams) -> ToolResult;
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool` under its spec name, replacing any previous entry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name.clone();
        debug!(tool = %name, "registering tool");
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of the named tools, skipping names that are not registered.
    /// Matches the `tools` list of an agent configuration.
    pub fn schemas_for(&self, names: &[String]) -> Vec<Value> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.spec().to_schema())
            .collect()
    }

    /// Validate `params` against the tool's spec, then run it.
    pub async fn dispatch(&self, name: &str, params: ToolParams) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.spec().validate(&params)?;
        debug!(tool = %name, "dispatching tool call");
        Ok(tool.execute(params).await)
    }
}
