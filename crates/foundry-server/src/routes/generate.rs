use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use foundry::models::message::Message;
use foundry::providers::factory;

use super::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<i32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> impl IntoResponse {
    let config = state.provider_with_options(
        request.temperature,
        request.max_tokens,
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

    let messages = vec![Message::user().with_text(&request.prompt)];
    match provider
        .complete("You are a helpful assistant.", &messages, &[])
        .await
    {
        Ok((message, _)) => (
            StatusCode::OK,
            Json(GenerationResponse {
                text: message.text(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("generation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e)),
            )
                .into_response()
        }
    }
}

async fn banner() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Welcome to Foundry",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/api/health", get(health))
        .route("/api/generate", post(generate))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, test_state_with_backend};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_banner_and_health() {
        let state = test_state().await;
        let app = routes(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let banner: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(banner["message"], "Welcome to Foundry");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_generate() {
        let (state, backend) = test_state_with_backend().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"temperature": 0.5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Generated text."},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            })))
            .mount(&backend)
            .await;

        let app = routes(state);
        let request = Request::builder()
            .uri("/api/generate")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"prompt": "say something", "temperature": 0.5}).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let generated: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(generated["text"], "Generated text.");
    }

    #[tokio::test]
    async fn test_generate_backend_down() {
        let state = test_state().await;
        let app = routes(state);

        let request = Request::builder()
            .uri("/api/generate")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(json!({"prompt": "hello"}).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
