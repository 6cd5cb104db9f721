use std::sync::Arc;

use async_trait::async_trait;
use ia_agents::tools::{
    ParameterKind, Tool, ToolError, ToolParameter, ToolParams, ToolRegistry, ToolResult, ToolSpec,
};
use serde_json::json;

struct WordCount {
    spec: ToolSpec,
}

impl WordCount {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new("word_count", "Count words in a text").with_parameter(
                ToolParameter::required("text", ParameterKind::String, "Text to count"),
            ),
        }
    }
}

#[async_trait]
impl Tool for WordCount {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, params: ToolParams) -> ToolResult {
        match params.get("text").and_then(|v| v.as_str()) {
            Some(text) => ToolResult::ok(json!(text.split_whitespace().count())),
            None => ToolResult::failed("text must be a string"),
        }
    }
}

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WordCount::new()));
    registry
}

fn params(value: serde_json::Value) -> ToolParams {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_dispatch_runs_tool() {
    let result = registry()
        .dispatch("word_count", params(json!({ "text": "one two three" })))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.data, Some(json!(3)));
}

#[tokio::test]
async fn test_tool_level_failure_is_a_result() {
    let result = registry()
        .dispatch("word_count", params(json!({ "text": 42 })))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("text must be a string"));
}

#[tokio::test]
async fn test_dispatch_validates_required_parameters() {
    let err = registry()
        .dispatch("word_count", ToolParams::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ToolError::MissingParameters { ref missing, .. } if missing == &["text"]
    ));
}

#[tokio::test]
async fn test_dispatch_unknown_tool() {
    let err = registry().dispatch("nope", ToolParams::new()).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound(ref name) if name == "nope"));
}

#[test]
fn test_schemas_for_agent_tool_list() {
    let registry = registry();
    assert_eq!(registry.names(), vec!["word_count"]);

    let schemas = registry.schemas_for(&["word_count".to_string(), "missing".to_string()]);
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0]["input_schema"]["required"], json!(["text"]));
}

#[test]
fn test_tool_result_omits_empty_fields() {
    let json = serde_json::to_value(ToolResult::ok(json!("x"))).unwrap();
    assert_eq!(json, json!({ "success": true, "data": "x" }));
}
