use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Api,
    Calculation,
    Database,
    Retrieval,
}

/// The wire description of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
    pub tool_type: ToolKind,
}

/// Result envelope for a direct tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<f64>,
}

/// A callable capability an agent may invoke: database query, vector search,
/// calculation, or an outbound API call
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> &Value;

    fn kind(&self) -> ToolKind;

    /// Execute the tool; arguments have already passed `validate_arguments`
    async fn execute(&self, call: ToolCall) -> AgentResult<Value>;

    /// Current configuration, for dynamic tools that carry one
    fn config(&self) -> Option<Value> {
        None
    }

    /// Merge a configuration patch; returns false when the tool is not configurable
    fn update_config(&self, _patch: &Value) -> bool {
        false
    }

    /// Check the schema's required list against the provided arguments
    fn validate_arguments(&self, arguments: &Value) -> AgentResult<()> {
        let required = self
            .parameters_schema()
            .get("required")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        for param in required {
            let Some(name) = param.as_str() else {
                continue;
            };
            if arguments.get(name).is_none() {
                return Err(AgentError::InvalidParameters(format!(
                    "missing required parameter '{}'",
                    name
                )));
            }
        }
        Ok(())
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters_schema: self.parameters_schema().clone(),
            tool_type: self.kind(),
        }
    }

    /// The tool as advertised to the model
    fn as_tool(&self) -> Tool {
        Tool::new(
            self.name(),
            self.description(),
            self.parameters_schema().clone(),
        )
    }
}

impl std::fmt::Debug for dyn ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Run a tool and wrap the result in the execution envelope, timing included.
/// Failures are reported in-band rather than bubbled, so callers always get
/// an outcome to return.
pub async fn execute_with_timing(
    tool: &dyn ToolExecutor,
    call: ToolCall,
) -> ExecuteOutcome {
    let start = Instant::now();
    let checked = tool
        .validate_arguments(&call.arguments)
        .map(|_| call);

    let result = match checked {
        Ok(call) => tool.execute(call).await,
        Err(e) => Err(e),
    };

    let execution_time_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

    match result {
        Ok(value) => ExecuteOutcome {
            success: true,
            result: Some(value),
            error_message: None,
            execution_time_ms: Some(execution_time_ms),
        },
        Err(e) => ExecuteOutcome {
            success: false,
            result: None,
            error_message: Some(e.to_string()),
            execution_time_ms: Some(execution_time_ms),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        schema: Value,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                schema: json!({
                    "type": "object",
                    "properties": {
                        "message": {"type": "string"}
                    },
                    "required": ["message"]
                }),
            }
        }
    }

    #[async_trait]
    impl ToolExecutor for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input"
        }

        fn parameters_schema(&self) -> &Value {
            &self.schema
        }

        fn kind(&self) -> ToolKind {
            ToolKind::Api
        }

        async fn execute(&self, call: ToolCall) -> AgentResult<Value> {
            Ok(json!({"message": call.arguments["message"]}))
        }
    }

    #[tokio::test]
    async fn test_execute_with_timing_success() {
        let tool = EchoTool::new();
        let outcome = execute_with_timing(
            &tool,
            ToolCall::new("echo", json!({"message": "hi"})),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.result, Some(json!({"message": "hi"})));
        assert!(outcome.error_message.is_none());
        assert!(outcome.execution_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_execute_with_timing_missing_required() {
        let tool = EchoTool::new();
        let outcome = execute_with_timing(&tool, ToolCall::new("echo", json!({}))).await;

        assert!(!outcome.success);
        assert!(outcome
            .error_message
            .unwrap()
            .contains("missing required parameter 'message'"));
    }

    #[test]
    fn test_spec_reflects_executor() {
        let tool = EchoTool::new();
        let spec = tool.spec();
        assert_eq!(spec.name, "echo");
        assert_eq!(spec.tool_type, ToolKind::Api);
        assert_eq!(spec.parameters_schema["required"][0], "message");
    }

    #[test]
    fn test_tool_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ToolKind::Calculation).unwrap(),
            "\"calculation\""
        );
        let kind: ToolKind = serde_json::from_str("\"api\"").unwrap();
        assert_eq!(kind, ToolKind::Api);
    }
}
