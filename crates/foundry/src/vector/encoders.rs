use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint. The inference
/// server that backs chat completions typically serves this too.
pub struct EmbeddingClient {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: Client,
}

impl EmbeddingClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            client,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Embed a batch of texts with the given model, preserving input order.
    pub async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut request = self.client.post(&url).json(&json!({
            "model": model,
            "input": texts,
        }));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "embedding request failed: {}",
                response.status()
            ));
        }

        let body: Value = response.json().await?;
        let mut items: Vec<(usize, Vec<f32>)> = body["data"]
            .as_array()
            .ok_or_else(|| anyhow!("embedding response missing data"))?
            .iter()
            .map(|item| {
                let index = item["index"].as_u64().unwrap_or(0) as usize;
                let embedding = item["embedding"]
                    .as_array()
                    .ok_or_else(|| anyhow!("embedding response missing vector"))?
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect();
                Ok((index, embedding))
            })
            .collect::<Result<Vec<_>>>()?;

        if items.len() != texts.len() {
            return Err(anyhow!(
                "embedding response returned {} vectors for {} inputs",
                items.len(),
                texts.len()
            ));
        }

        items.sort_by_key(|(index, _)| *index);
        Ok(items.into_iter().map(|(_, embedding)| embedding).collect())
    }

    pub async fn embed_one(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed(model, &[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow!("embedding response was empty"))
    }
}

/// The encoder catalog served by the recommended-encoders endpoint.
pub fn recommended_models() -> Value {
    json!({
        "multilingual-e5-base": {
            "model_id": "intfloat/multilingual-e5-base",
            "description": "General-purpose multilingual embedding model",
            "vector_dimension": 768,
            "languages": ["ko", "en", "zh", "ja"],
            "use_case": "General text embedding"
        },
        "bge-m3": {
            "model_id": "BAAI/bge-m3",
            "description": "High-accuracy multilingual embedding model",
            "vector_dimension": 1024,
            "languages": ["ko", "en", "zh", "ja"],
            "use_case": "High-quality retrieval and RAG"
        },
        "ko-sroberta-multitask": {
            "model_id": "jhgan/ko-sroberta-multitask",
            "description": "Korean-specialized sentence embedding model",
            "vector_dimension": 768,
            "languages": ["ko"],
            "use_case": "Korean text processing"
        },
        "openai-ada": {
            "model_id": "text-embedding-ada-002",
            "description": "OpenAI embedding model (API-based)",
            "vector_dimension": 1536,
            "languages": ["en", "ko"],
            "use_case": "High-quality embeddings over the API"
        }
    })
}
