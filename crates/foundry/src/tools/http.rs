use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Mutex;
use std::time::Duration;

use super::executor::{ToolExecutor, ToolKind};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolCall;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A client-registered tool that performs an outbound HTTP call. The config
/// carries defaults (`base_url`, `headers`, `timeout_secs`) that individual
/// calls may override through their arguments.
pub struct HttpTool {
    name: String,
    description: String,
    schema: Value,
    config: Mutex<Value>,
    client: Client,
}

impl HttpTool {
    pub fn new<N, D>(name: N, description: D, schema: Value, config: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            config: Mutex::new(if config.is_object() { config } else { json!({}) }),
            client: Client::new(),
        }
    }

    fn config_snapshot(&self) -> Value {
        self.config.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for HttpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Api
    }

    fn config(&self) -> Option<Value> {
        Some(self.config_snapshot())
    }

    fn update_config(&self, patch: &Value) -> bool {
        let Some(patch) = patch.as_object() else {
            return false;
        };
        let mut config = self.config.lock().unwrap();
        let entries = config.as_object_mut().expect("config is always an object");
        for (key, value) in patch {
            entries.insert(key.clone(), value.clone());
        }
        true
    }

    async fn execute(&self, call: ToolCall) -> AgentResult<Value> {
        let config = self.config_snapshot();
        let arguments = &call.arguments;

        let url = arguments
            .get("url")
            .and_then(|u| u.as_str())
            .or_else(|| config.get("base_url").and_then(|u| u.as_str()))
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AgentError::InvalidParameters("URL is required for API calls".to_string())
            })?
            .to_string();

        let method = arguments
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| AgentError::InvalidParameters(format!("invalid method '{}'", method)))?;

        // Config headers first, call headers override
        let mut headers: Map<String, Value> = config
            .get("headers")
            .and_then(|h| h.as_object())
            .cloned()
            .unwrap_or_default();
        if let Some(call_headers) = arguments.get("headers").and_then(|h| h.as_object()) {
            for (name, value) in call_headers {
                headers.insert(name.clone(), value.clone());
            }
        }

        let timeout_secs = config
            .get("timeout_secs")
            .and_then(|t| t.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let data = arguments.get("data").cloned();

        let mut request = self
            .client
            .request(method.clone(), &url)
            .timeout(Duration::from_secs(timeout_secs));

        for (name, value) in &headers {
            if let Some(value) = value.as_str() {
                request = request.header(name.as_str(), value);
            }
        }

        let has_body = method == reqwest::Method::POST
            || method == reqwest::Method::PUT
            || method == reqwest::Method::PATCH;
        if has_body {
            if let Some(body) = data {
                request = request.json(&body);
            }
        } else if let Some(params) = data.as_ref().and_then(|d| d.as_object()) {
            let query: Vec<(String, String)> = params
                .iter()
                .map(|(k, v)| {
                    let rendered = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), rendered)
                })
                .collect();
            request = request.query(&query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ExecutionError(format!(
                "request to {} failed with status {}",
                url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

        Ok(json!({
            "status_code": status.as_u16(),
            "data": data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn weather_tool(base_url: &str) -> HttpTool {
        HttpTool::new(
            "plant_weather",
            "Fetches site weather conditions",
            json!({
                "type": "object",
                "properties": {
                    "data": {"type": "object"}
                }
            }),
            json!({
                "base_url": format!("{}/weather", base_url),
                "headers": {"x-api-key": "secret"}
            }),
        )
    }

    #[tokio::test]
    async fn test_get_with_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("city", "Ulsan"))
            .and(header("x-api-key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"temperature": 21.5})),
            )
            .mount(&server)
            .await;

        let tool = weather_tool(&server.uri());
        let result = tool
            .execute(ToolCall::new(
                "plant_weather",
                json!({"data": {"city": "Ulsan"}}),
            ))
            .await
            .unwrap();

        assert_eq!(result["status_code"], 200);
        assert_eq!(result["data"]["temperature"], 21.5);
    }

    #[tokio::test]
    async fn test_post_with_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(body_json(json!({"lot": "L-1042"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
            .mount(&server)
            .await;

        let tool = HttpTool::new(
            "ingest",
            "Posts lot data",
            json!({"type": "object", "properties": {}}),
            json!({}),
        );
        let result = tool
            .execute(ToolCall::new(
                "ingest",
                json!({
                    "url": format!("{}/ingest", server.uri()),
                    "method": "POST",
                    "data": {"lot": "L-1042"}
                }),
            ))
            .await
            .unwrap();

        assert_eq!(result["data"]["accepted"], true);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tool = weather_tool(&server.uri());
        let err = tool
            .execute(ToolCall::new("plant_weather", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn test_missing_url() {
        let tool = HttpTool::new(
            "bare",
            "No base url configured",
            json!({"type": "object", "properties": {}}),
            json!({}),
        );
        let err = tool.execute(ToolCall::new("bare", json!({}))).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[test]
    fn test_update_config_merges() {
        let tool = weather_tool("http://example.com");
        assert!(tool.update_config(&json!({"timeout_secs": 5})));
        let config = tool.config().unwrap();
        assert_eq!(config["timeout_secs"], 5);
        assert_eq!(config["headers"]["x-api-key"], "secret");

        assert!(!tool.update_config(&json!("not an object")));
    }
}
