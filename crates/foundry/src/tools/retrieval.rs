use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::executor::{ToolExecutor, ToolKind};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolCall;
use crate::vector::schemas::SearchQuery;
use crate::vector::{EmbeddingClient, WeaviateClient};

/// Built-in RAG tool: embeds the query, runs a similarity search against the
/// knowledge-base class and returns the scored passages for grounding.
pub struct RetrievalTool {
    vector: Arc<WeaviateClient>,
    embeddings: Arc<EmbeddingClient>,
    class_name: String,
    encoder_model: String,
    schema: Value,
}

impl RetrievalTool {
    pub fn new(
        vector: Arc<WeaviateClient>,
        embeddings: Arc<EmbeddingClient>,
        class_name: impl Into<String>,
        encoder_model: impl Into<String>,
    ) -> Self {
        Self {
            vector,
            embeddings,
            class_name: class_name.into(),
            encoder_model: encoder_model.into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Query to search the knowledge base for"
                    },
                    "limit": {
                        "type": "integer",
                        "default": 5,
                        "description": "Maximum number of passages to return"
                    },
                    "threshold": {
                        "type": "number",
                        "default": 0.7,
                        "description": "Minimum similarity score"
                    }
                },
                "required": ["query"]
            }),
        }
    }
}

#[async_trait]
impl ToolExecutor for RetrievalTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Searches the knowledge base for passages relevant to a query and returns \
         them with similarity scores."
    }

    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Retrieval
    }

    async fn execute(&self, call: ToolCall) -> AgentResult<Value> {
        let query_text = call
            .arguments
            .get("query")
            .and_then(|q| q.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("'query' must be a string".to_string()))?;
        let limit = call
            .arguments
            .get("limit")
            .and_then(|l| l.as_u64())
            .unwrap_or(5) as usize;
        let threshold = call
            .arguments
            .get("threshold")
            .and_then(|t| t.as_f64())
            .unwrap_or(0.7);

        let query_vector = self
            .embeddings
            .embed_one(&self.encoder_model, query_text)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("embedding failed: {}", e)))?;

        let search = SearchQuery {
            query: query_text.to_string(),
            limit,
            threshold,
            filters: Default::default(),
            include_vector: false,
        };

        let results = self
            .vector
            .search(&self.class_name, &search, Some(&query_vector))
            .await
            .map_err(|e| AgentError::ExecutionError(format!("search failed: {}", e)))?;

        let passages: Vec<Value> = results
            .iter()
            .map(|result| {
                json!({
                    "content": result.content,
                    "title": result.title,
                    "source": result.source,
                    "score": result.score,
                })
            })
            .collect();

        Ok(json!({
            "query": query_text,
            "count": passages.len(),
            "results": passages,
        }))
    }
}
