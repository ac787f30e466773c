use anyhow::Result;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::AgentResult;
use crate::models::agent::Agent;
use crate::models::content::Content;
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::Provider;
use crate::tools::ToolExecutor;

/// Request body for invoking an agent through the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default = "default_use_tools")]
    pub use_tools: bool,
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,
}

fn default_max_tokens() -> i32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_use_tools() -> bool {
    true
}

fn default_max_tool_calls() -> usize {
    3
}

/// One executed tool call, as reported back to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub tool: String,
    pub arguments: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub success: bool,
}

/// Final result of an agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    pub tools_used: Vec<String>,
    pub tool_results: Vec<ToolInvocationRecord>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Runs the tool-invocation loop: completion, tool dispatch, result
/// re-injection, repeated until the model answers without requesting tools
/// or the round budget runs out.
pub struct Orchestrator {
    provider: Box<dyn Provider + Send + Sync>,
}

impl Orchestrator {
    pub fn new(provider: Box<dyn Provider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Create a stream that yields each message as it is produced: the
    /// assistant message of every round and the tool responses that follow
    /// it. The stream ends after the first assistant message that carries no
    /// tool requests.
    pub async fn reply(
        &self,
        agent: &Agent,
        messages: &[Message],
        tools: Vec<Arc<dyn ToolExecutor>>,
        max_tool_calls: usize,
    ) -> Result<BoxStream<'_, Result<Message>>> {
        let system_prompt = agent.system_prompt();
        let tool_specs: Vec<Tool> = tools.iter().map(|tool| tool.as_tool()).collect();
        let mut messages = messages.to_vec();

        Ok(Box::pin(async_stream::try_stream! {
            let mut rounds = 0;
            loop {
                let (response, _) = self
                    .provider
                    .complete(&system_prompt, &messages, &tool_specs)
                    .await?;

                yield response.clone();

                // Make sure the message above is delivered before potentially
                // long-running tool executions start
                tokio::task::yield_now().await;

                let tool_requests: Vec<ToolRequest> = response
                    .tool_requests()
                    .into_iter()
                    .cloned()
                    .collect();

                if tool_requests.is_empty() {
                    break;
                }

                if rounds >= max_tool_calls {
                    // Budget exhausted: take the tools away and force a final answer
                    tracing::warn!("tool call budget of {} rounds reached", max_tool_calls);
                    let (final_response, _) = self
                        .provider
                        .complete(&system_prompt, &messages, &[])
                        .await?;
                    yield final_response;
                    break;
                }
                rounds += 1;

                // Dispatch all calls of the round in parallel, wait for all of them
                let futures: Vec<_> = tool_requests
                    .iter()
                    .map(|request| dispatch_tool_call(&tools, request.tool_call.clone()))
                    .collect();
                let outputs = futures::future::join_all(futures).await;

                let mut message_tool_response = Message::user();
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    message_tool_response =
                        message_tool_response.with_tool_response(request.id.clone(), output);
                }

                yield message_tool_response.clone();

                messages.push(response);
                messages.push(message_tool_response);
            }
        }))
    }

    /// Run the loop to completion and collect it into an AgentReply.
    pub async fn invoke(
        &self,
        agent: &Agent,
        request: &InvokeRequest,
        tools: Vec<Arc<dyn ToolExecutor>>,
    ) -> Result<AgentReply> {
        let tools = if request.use_tools { tools } else { Vec::new() };
        let mode = if tools.is_empty() {
            "basic"
        } else {
            "function_calling"
        };

        let messages = vec![Message::user().with_text(&request.prompt)];
        let mut stream = self
            .reply(agent, &messages, tools, request.max_tool_calls)
            .await?;

        let mut text = String::new();
        let mut tools_used: Vec<String> = Vec::new();
        let mut tool_results: Vec<ToolInvocationRecord> = Vec::new();
        // request id -> (tool name, arguments), so responses can be paired up
        let mut pending: HashMap<String, (String, Value)> = HashMap::new();

        while let Some(message) = stream.try_next().await? {
            for content in &message.content {
                match content {
                    MessageContent::Text(t) => {
                        if message.role == Role::Assistant && !t.text.is_empty() {
                            text = t.text.clone();
                        }
                    }
                    MessageContent::ToolRequest(request) => {
                        if let Ok(call) = &request.tool_call {
                            pending.insert(
                                request.id.clone(),
                                (call.name.clone(), call.arguments.clone()),
                            );
                        }
                    }
                    MessageContent::ToolResponse(response) => {
                        let Some((tool, arguments)) = pending.remove(&response.id) else {
                            continue;
                        };
                        let record = match &response.tool_result {
                            Ok(contents) => {
                                if !tools_used.contains(&tool) {
                                    tools_used.push(tool.clone());
                                }
                                ToolInvocationRecord {
                                    tool,
                                    arguments,
                                    result: Some(contents_to_value(contents)),
                                    error: None,
                                    success: true,
                                }
                            }
                            Err(e) => ToolInvocationRecord {
                                tool,
                                arguments,
                                result: None,
                                error: Some(e.to_string()),
                                success: false,
                            },
                        };
                        tool_results.push(record);
                    }
                }
            }
        }

        let mut metadata = Map::new();
        metadata.insert("agent_name".to_string(), Value::String(agent.name.clone()));
        metadata.insert("mode".to_string(), Value::String(mode.to_string()));

        Ok(AgentReply {
            text,
            tools_used,
            tool_results,
            metadata,
        })
    }
}

async fn dispatch_tool_call(
    tools: &[Arc<dyn ToolExecutor>],
    tool_call: AgentResult<ToolCall>,
) -> AgentResult<Vec<Content>> {
    let call = tool_call?;
    let tool = tools
        .iter()
        .find(|tool| tool.name() == call.name)
        .ok_or_else(|| crate::errors::AgentError::ToolNotFound(call.name.clone()))?;

    tool.validate_arguments(&call.arguments)?;
    let value = tool.execute(call).await?;
    Ok(vec![Content::text(value.to_string())])
}

/// Tool output travels through the conversation as text; parse it back into
/// structured JSON for the reply envelope when possible.
fn contents_to_value(contents: &[Content]) -> Value {
    let text = contents
        .iter()
        .filter_map(|content| content.as_text())
        .collect::<Vec<_>>()
        .join("\n");
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AgentError, AgentResult};
    use crate::providers::mock::MockProvider;
    use crate::tools::executor::ToolKind;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool {
        schema: Value,
    }

    impl EchoTool {
        fn new() -> Arc<dyn ToolExecutor> {
            Arc::new(Self {
                schema: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
            })
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
            Ok(json!({"echoed": call.arguments["message"]}))
        }
    }

    fn analyst() -> Agent {
        Agent {
            name: "analyst".to_string(),
            description: "test agent".to_string(),
            role_prompt: "You are a process analyst.".to_string(),
            tools: vec!["echo".to_string()],
        }
    }

    fn invoke_request(prompt: &str) -> InvokeRequest {
        serde_json::from_value(json!({"prompt": prompt})).unwrap()
    }

    async fn collect(
        orchestrator: &Orchestrator,
        tools: Vec<Arc<dyn ToolExecutor>>,
    ) -> Vec<Message> {
        let initial = vec![Message::user().with_text("hi")];
        let mut stream = orchestrator
            .reply(&analyst(), &initial, tools, 3)
            .await
            .unwrap();
        let mut messages = Vec::new();
        while let Some(message) = stream.try_next().await.unwrap() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_simple_response() {
        let response = Message::assistant().with_text("Hello!");
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![response.clone()])));

        let messages = collect(&orchestrator, vec![EchoTool::new()]).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], response);
    }

    #[tokio::test]
    async fn test_tool_call_round() {
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("echo", json!({"message": "test"}))),
            ),
            Message::assistant().with_text("Done!"),
        ])));

        let messages = collect(&orchestrator, vec![EchoTool::new()]).await;

        // tool request, tool response, final text
        assert_eq!(messages.len(), 3);
        assert!(messages[0]
            .content
            .iter()
            .any(|c| matches!(c, MessageContent::ToolRequest(_))));
        let response = messages[1].content[0].as_tool_response().unwrap();
        let contents = response.tool_result.as_ref().unwrap();
        assert!(contents[0].as_text().unwrap().contains("echoed"));
        assert_eq!(messages[2].text(), "Done!");
    }

    #[tokio::test]
    async fn test_invalid_tool_is_reported_in_band() {
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("missing_tool", json!({})))),
            Message::assistant().with_text("Recovered"),
        ])));

        let messages = collect(&orchestrator, vec![EchoTool::new()]).await;

        assert_eq!(messages.len(), 3);
        let response = messages[1].content[0].as_tool_response().unwrap();
        assert!(matches!(
            response.tool_result,
            Err(AgentError::ToolNotFound(_))
        ));
        assert_eq!(messages[2].text(), "Recovered");
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_in_one_round() {
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "first"}))))
                .with_tool_request("2", Ok(ToolCall::new("echo", json!({"message": "second"})))),
            Message::assistant().with_text("All done!"),
        ])));

        let messages = collect(&orchestrator, vec![EchoTool::new()]).await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content.len(), 2);
        assert_eq!(messages[2].text(), "All done!");
    }

    #[tokio::test]
    async fn test_budget_forces_final_answer() {
        // The model keeps asking for tools; after one allowed round the
        // orchestrator completes without tools and takes whatever comes back
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "a"})))),
            Message::assistant()
                .with_tool_request("2", Ok(ToolCall::new("echo", json!({"message": "b"})))),
            Message::assistant().with_text("Forced summary"),
        ])));

        let initial = vec![Message::user().with_text("loop forever")];
        let mut stream = orchestrator
            .reply(&analyst(), &initial, vec![EchoTool::new()], 1)
            .await
            .unwrap();
        let mut messages = Vec::new();
        while let Some(message) = stream.try_next().await.unwrap() {
            messages.push(message);
        }

        // round 1: request + response; round 2 request hits the budget,
        // then the forced finalize
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].text(), "Forced summary");
    }

    #[tokio::test]
    async fn test_invoke_collects_reply() {
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("echo", json!({"message": "lot L-1042"}))),
            ),
            Message::assistant().with_text("The lot is on hold."),
        ])));

        let reply = orchestrator
            .invoke(&analyst(), &invoke_request("check lot"), vec![EchoTool::new()])
            .await
            .unwrap();

        assert_eq!(reply.text, "The lot is on hold.");
        assert_eq!(reply.tools_used, vec!["echo"]);
        assert_eq!(reply.tool_results.len(), 1);
        assert!(reply.tool_results[0].success);
        assert_eq!(
            reply.tool_results[0].result.as_ref().unwrap()["echoed"],
            "lot L-1042"
        );
        assert_eq!(reply.metadata["mode"], "function_calling");
    }

    #[tokio::test]
    async fn test_invoke_without_tools() {
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_text("Plain answer"),
        ])));

        let mut request = invoke_request("just answer");
        request.use_tools = false;

        let reply = orchestrator
            .invoke(&analyst(), &request, vec![EchoTool::new()])
            .await
            .unwrap();

        assert_eq!(reply.text, "Plain answer");
        assert!(reply.tools_used.is_empty());
        assert_eq!(reply.metadata["mode"], "basic");
    }

    #[tokio::test]
    async fn test_invoke_records_failed_tool() {
        let orchestrator = Orchestrator::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_tool_request("1", Ok(ToolCall::new("echo", json!({})))),
            Message::assistant().with_text("Could not echo."),
        ])));

        let reply = orchestrator
            .invoke(&analyst(), &invoke_request("echo nothing"), vec![EchoTool::new()])
            .await
            .unwrap();

        assert_eq!(reply.tool_results.len(), 1);
        assert!(!reply.tool_results[0].success);
        assert!(reply.tools_used.is_empty());
        assert!(reply.tool_results[0]
            .error
            .as_ref()
            .unwrap()
            .contains("missing required parameter"));
    }

    #[test]
    fn test_invoke_request_defaults() {
        let request: InvokeRequest =
            serde_json::from_str(r#"{"prompt": "hello"}"#).unwrap();
        assert_eq!(request.max_tokens, 1024);
        assert_eq!(request.temperature, 0.7);
        assert!(request.use_tools);
        assert_eq!(request.max_tool_calls, 3);
        assert!(request.stop.is_none());
    }
}
