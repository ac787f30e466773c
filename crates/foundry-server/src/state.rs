use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use foundry::agents::AgentRegistry;
use foundry::data::SqlStore;
use foundry::providers::configs::ProviderConfig;
use foundry::tools::calculator::CalculatorTool;
use foundry::tools::database::DatabaseTool;
use foundry::tools::retrieval::RetrievalTool;
use foundry::tools::ToolRegistry;
use foundry::vector::{EmbeddingClient, WeaviateClient};

use crate::configuration::Settings;

/// Shared application state, cloned per handler.
#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<RwLock<AgentRegistry>>,
    pub tools: Arc<RwLock<ToolRegistry>>,
    pub provider_config: ProviderConfig,
    pub vector: Arc<WeaviateClient>,
    pub embeddings: Arc<EmbeddingClient>,
    pub db: Arc<SqlStore>,
    /// Encoder model recorded per vector class at index-creation time
    pub encoders: Arc<RwLock<HashMap<String, String>>>,
}

impl AppState {
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let db = Arc::new(SqlStore::open(&settings.database.path)?);
        let vector = Arc::new(WeaviateClient::new(
            settings.vector.url.clone(),
            settings.vector.api_key.clone(),
        )?);
        let embeddings = Arc::new(EmbeddingClient::new(
            settings.embedding.url.clone(),
            settings.embedding.api_key.clone(),
            settings.embedding.model.clone(),
        )?);

        let state = Self {
            agents: Arc::new(RwLock::new(AgentRegistry::new())),
            tools: Arc::new(RwLock::new(ToolRegistry::new())),
            provider_config: settings.provider.into_config(),
            vector,
            embeddings,
            db,
            encoders: Arc::new(RwLock::new(HashMap::new())),
        };

        state
            .seed_builtin_tools(&settings.vector.knowledge_class, &settings.embedding.model)
            .await;
        Ok(state)
    }

    /// Register the tools every deployment ships with.
    pub async fn seed_builtin_tools(&self, knowledge_class: &str, encoder_model: &str) {
        let mut tools = self.tools.write().await;
        let builtin: Vec<Arc<dyn foundry::tools::ToolExecutor>> = vec![
            Arc::new(CalculatorTool::new()),
            Arc::new(DatabaseTool::new(self.db.clone())),
            Arc::new(RetrievalTool::new(
                self.vector.clone(),
                self.embeddings.clone(),
                knowledge_class,
                encoder_model,
            )),
        ];
        for tool in builtin {
            if let Err(e) = tools.register(tool) {
                tracing::warn!("skipping builtin tool: {}", e);
            }
        }
    }

    /// Provider config for one request, with per-request generation options
    /// layered over the deployment defaults.
    pub fn provider_with_options(
        &self,
        temperature: Option<f32>,
        max_tokens: Option<i32>,
        stop: Option<Vec<String>>,
    ) -> ProviderConfig {
        let mut config = self.provider_config.clone();
        match &mut config {
            ProviderConfig::OpenAi(c) => {
                if temperature.is_some() {
                    c.temperature = temperature;
                }
                if max_tokens.is_some() {
                    c.max_tokens = max_tokens;
                }
                if stop.is_some() {
                    c.stop = stop;
                }
            }
            ProviderConfig::Vllm(c) => {
                if temperature.is_some() {
                    c.temperature = temperature;
                }
                if max_tokens.is_some() {
                    c.max_tokens = max_tokens;
                }
                if stop.is_some() {
                    c.stop = stop;
                }
            }
        }
        config
    }

    /// Encoder model for a class, falling back to the deployment default.
    pub async fn encoder_for_class(&self, class_name: &str) -> String {
        let encoders = self.encoders.read().await;
        encoders
            .get(class_name)
            .cloned()
            .unwrap_or_else(|| self.embeddings.default_model().to_string())
    }
}
