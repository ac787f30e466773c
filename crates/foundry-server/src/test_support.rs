use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use wiremock::MockServer;

use foundry::agents::AgentRegistry;
use foundry::data::SqlStore;
use foundry::providers::configs::{ProviderConfig, VllmProviderConfig};
use foundry::tools::ToolRegistry;
use foundry::vector::{EmbeddingClient, WeaviateClient};

use crate::state::AppState;

async fn state_with_backend_url(url: &str) -> AppState {
    let db = Arc::new(SqlStore::open_in_memory().unwrap());
    db.execute_batch(
        "CREATE TABLE lot_history (
             id INTEGER PRIMARY KEY,
             lot_id TEXT NOT NULL,
             step TEXT,
             pressure REAL
         );
         INSERT INTO lot_history (lot_id, step, pressure) VALUES
             ('L-1001', 'etch', 2.4),
             ('L-1002', 'cvd', 3.1),
             ('L-1003', 'cmp', NULL);",
    )
    .unwrap();

    let state = AppState {
        agents: Arc::new(RwLock::new(AgentRegistry::new())),
        tools: Arc::new(RwLock::new(ToolRegistry::new())),
        provider_config: ProviderConfig::Vllm(VllmProviderConfig {
            host: url.to_string(),
            model: "test-model".to_string(),
            temperature: None,
            max_tokens: None,
            stop: None,
        }),
        vector: Arc::new(WeaviateClient::new(url, None).unwrap()),
        embeddings: Arc::new(EmbeddingClient::new(url, None, "BAAI/bge-m3").unwrap()),
        db,
        encoders: Arc::new(RwLock::new(HashMap::new())),
    };
    state.seed_builtin_tools("Knowledge", "BAAI/bge-m3").await;
    state
}

/// State whose external backends are all unreachable.
pub async fn test_state() -> AppState {
    state_with_backend_url("http://127.0.0.1:1").await
}

/// State with the inference server, vector store and embeddings endpoint all
/// pointed at one mock server.
pub async fn test_state_with_backend() -> (AppState, MockServer) {
    let server = MockServer::start().await;
    let state = state_with_backend_url(&server.uri()).await;
    (state, server)
}
