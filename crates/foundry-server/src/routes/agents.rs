use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use foundry::errors::RegistryError;
use foundry::models::agent::Agent;
use foundry::orchestrator::{InvokeRequest, Orchestrator};
use foundry::providers::factory;

use super::{ErrorResponse, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolAssignment {
    pub tool_names: Vec<String>,
}

async fn register_agent(
    State(state): State<AppState>,
    Json(agent): Json<Agent>,
) -> impl IntoResponse {
    let tools = state.tools.read().await;
    let mut agents = state.agents.write().await;
    match agents.register(agent.clone(), &tools) {
        Ok(()) => (StatusCode::OK, Json(agent)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e))).into_response(),
    }
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.agents.read().await.list())
}

async fn delete_agent(
    State(state): State<AppState>,
    Path(agent_name): Path<String>,
) -> impl IntoResponse {
    let mut agents = state.agents.write().await;
    if agents.delete(&agent_name) {
        (
            StatusCode::OK,
            Json(MessageResponse::new(format!(
                "Agent '{}' has been deleted successfully",
                agent_name
            ))),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Agent not found")),
        )
            .into_response()
    }
}

async fn assign_tools(
    State(state): State<AppState>,
    Path(agent_name): Path<String>,
    Json(assignment): Json<ToolAssignment>,
) -> impl IntoResponse {
    let tools = state.tools.read().await;
    let mut agents = state.agents.write().await;
    match agents.assign_tools(&agent_name, assignment.tool_names.clone(), &tools) {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse::new(format!(
                "Tools {:?} assigned to agent '{}'",
                assignment.tool_names, agent_name
            ))),
        )
            .into_response(),
        Err(e @ RegistryError::AgentNotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(ErrorResponse::new(e))).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e))).into_response(),
    }
}

async fn invoke_agent(
    State(state): State<AppState>,
    Path(agent_name): Path<String>,
    Json(request): Json<InvokeRequest>,
) -> impl IntoResponse {
    let Some(agent) = state.agents.read().await.get(&agent_name).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Agent not found")),
        )
            .into_response();
    };

    let tools = state.tools.read().await.select(&agent.tools);

    let config = state.provider_with_options(
        Some(request.temperature),
        Some(request.max_tokens),
        request.stop.clone(),
    );
    let provider = match factory::get_provider(config) {
        Ok(provider) => provider,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e)),
            )
                .into_response()
        }
    };

    let orchestrator = Orchestrator::new(provider);
    match orchestrator.invoke(&agent, &request, tools).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            tracing::error!("agent '{}' invocation failed: {}", agent_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e)),
            )
                .into_response()
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/agents", post(register_agent).get(list_agents))
        .route("/api/agents/:agent_name", delete(delete_agent))
        .route("/api/agents/:agent_name/tools", post(assign_tools))
        .route("/api/agents/:agent_name/invoke", post(invoke_agent))
        .with_state(state)
}
