use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use foundry::models::tool::ToolCall;
use foundry::tools::{execute_with_timing, ToolRegistration, ToolSpec};

use super::{ErrorResponse, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSpec>> {
    Json(state.tools.read().await.list())
}

async fn register_tool(
    State(state): State<AppState>,
    Json(registration): Json<ToolRegistration>,
) -> impl IntoResponse {
    let tool_type = registration.tool_type.clone();
    let mut tools = state.tools.write().await;
    match tools.register_dynamic(registration) {
        Ok(tool) => (
            StatusCode::OK,
            Json(json!({
                "message": format!("Tool '{}' registered successfully", tool.name()),
                "tool_info": {
                    "name": tool.name(),
                    "description": tool.description(),
                    "tool_type": tool_type,
                }
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e))).into_response(),
    }
}

async fn get_tool(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
) -> impl IntoResponse {
    let tools = state.tools.read().await;
    match tools.get(&tool_name) {
        Some(tool) => {
            let mut info = serde_json::to_value(tool.spec()).expect("spec serializes");
            if let Some(config) = tool.config() {
                info["config"] = config;
            }
            (StatusCode::OK, Json(info)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Tool not found")),
        )
            .into_response(),
    }
}

async fn delete_tool(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
) -> impl IntoResponse {
    let mut tools = state.tools.write().await;
    if tools.delete(&tool_name) {
        (
            StatusCode::OK,
            Json(MessageResponse::new(format!(
                "Tool '{}' has been deleted successfully",
                tool_name
            ))),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Tool not found")),
        )
            .into_response()
    }
}

async fn update_tool_config(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
    Json(config): Json<Value>,
) -> impl IntoResponse {
    let tools = state.tools.read().await;
    if tools.update_config(&tool_name, &config) {
        (
            StatusCode::OK,
            Json(MessageResponse::new(format!(
                "Configuration for tool '{}' updated successfully",
                tool_name
            ))),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "Tool not found or not a configurable tool",
            )),
        )
            .into_response()
    }
}

async fn execute_tool(
    State(state): State<AppState>,
    Json(request): Json<ExecuteToolRequest>,
) -> impl IntoResponse {
    let tool = state.tools.read().await.get(&request.tool_name);
    match tool {
        Some(tool) => {
            let call = ToolCall::new(&request.tool_name, request.parameters);
            let outcome = execute_with_timing(tool.as_ref(), call).await;
            (StatusCode::OK, Json(outcome)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!(
                "Tool '{}' not found",
                request.tool_name
            ))),
        )
            .into_response(),
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/tools", post(register_tool).get(list_tools))
        .route(
            "/api/tools/:tool_name",
            axum::routing::get(get_tool).delete(delete_tool),
        )
        .route("/api/tools/:tool_name/config", put(update_tool_config))
        .route("/api/tools/execute", post(execute_tool))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn request_json(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_builtin_tools_listed() {
        let state = test_state().await;
        let app = routes(state);

        let response = app
            .oneshot(Request::builder().uri("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let specs: Vec<Value> = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = specs.iter().filter_map(|s| s["name"].as_str()).collect();
        assert_eq!(names, vec!["calculator", "database_tool", "rag_search"]);
    }

    #[tokio::test]
    async fn test_register_get_delete_dynamic_tool() {
        let state = test_state().await;
        let app = routes(state);

        let registration = json!({
            "name": "mes_lookup",
            "description": "Looks up lots in the MES",
            "parameters_schema": {"type": "object", "properties": {}},
            "tool_type": "api",
            "config": {"base_url": "http://mes.local/api"}
        });

        let response = app
            .clone()
            .oneshot(request_json("POST", "/api/tools", registration.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // duplicate
        let response = app
            .clone()
            .oneshot(request_json("POST", "/api/tools", registration))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/tools/mes_lookup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let info: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(info["tool_type"], "api");
        assert_eq!(info["config"]["base_url"], "http://mes.local/api");

        let response = app
            .clone()
            .oneshot(request_json(
                "PUT",
                "/api/tools/mes_lookup/config",
                json!({"timeout_secs": 5}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/tools/mes_lookup")
                    .method("DELETE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tools/mes_lookup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reject_code_execution_tool_type() {
        let state = test_state().await;
        let app = routes(state);

        let response = app
            .oneshot(request_json(
                "POST",
                "/api/tools",
                json!({
                    "name": "evil",
                    "description": "runs arbitrary code",
                    "parameters_schema": {},
                    "tool_type": "custom"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execute_calculator() {
        let state = test_state().await;
        let app = routes(state);

        let response = app
            .clone()
            .oneshot(request_json(
                "POST",
                "/api/tools/execute",
                json!({
                    "tool_name": "calculator",
                    "parameters": {"expression": "2 ^ 10"}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let outcome: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(outcome["success"], true);
        assert_eq!(outcome["result"]["result"], 1024.0);

        // failures come back in the envelope, not as HTTP errors
        let response = app
            .oneshot(request_json(
                "POST",
                "/api/tools/execute",
                json!({
                    "tool_name": "calculator",
                    "parameters": {"expression": "1 / 0"}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let outcome: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(outcome["success"], false);
        assert!(outcome["error_message"]
            .as_str()
            .unwrap()
            .contains("division by zero"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let state = test_state().await;
        let app = routes(state);

        let response = app
            .oneshot(request_json(
                "POST",
                "/api/tools/execute",
                json!({"tool_name": "ghost", "parameters": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
