use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A document stored in the vector database. When no `vector` is supplied the
/// configured encoder embeds `content` at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub filters: Map<String, Value>,
    #[serde(default)]
    pub include_vector: bool,
}

fn default_limit() -> usize {
    10
}

fn default_threshold() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Settings for a new index (a Weaviate class). Vectors are supplied by the
/// gateway, so the class is created with `vectorizer: none`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub class_name: String,
    pub description: String,
    pub vector_dimension: usize,
    pub encoder_model: String,
    #[serde(default = "default_distance")]
    pub distance_metric: String,
}

fn default_distance() -> String {
    "cosine".to_string()
}

impl IndexConfig {
    /// Render the class schema in the shape the Weaviate schema endpoint expects
    pub fn weaviate_schema(&self) -> Value {
        json!({
            "class": self.class_name,
            "description": self.description,
            "vectorizer": "none",
            "properties": [
                {
                    "name": "content",
                    "dataType": ["text"],
                    "description": "Document content"
                },
                {
                    "name": "title",
                    "dataType": ["string"],
                    "description": "Document title"
                },
                {
                    "name": "source",
                    "dataType": ["string"],
                    "description": "Document source"
                },
                {
                    "name": "created_at",
                    "dataType": ["date"],
                    "description": "Creation timestamp"
                }
            ],
            "vectorIndexConfig": {
                "distance": self.distance_metric
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub connected: bool,
    #[serde(default)]
    pub total_objects: u64,
    #[serde(default)]
    pub classes: Vec<String>,
    pub health: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl StoreStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            total_objects: 0,
            classes: Vec::new(),
            health: "unreachable".to_string(),
            version: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_defaults() {
        let query: SearchQuery = serde_json::from_str(r#"{"query": "etch recipe"}"#).unwrap();
        assert_eq!(query.limit, 10);
        assert_eq!(query.threshold, 0.7);
        assert!(query.filters.is_empty());
        assert!(!query.include_vector);
    }

    #[test]
    fn test_weaviate_schema_shape() {
        let config = IndexConfig {
            class_name: "ProcessDocs".to_string(),
            description: "Process documentation".to_string(),
            vector_dimension: 768,
            encoder_model: "intfloat/multilingual-e5-base".to_string(),
            distance_metric: default_distance(),
        };

        let schema = config.weaviate_schema();
        assert_eq!(schema["class"], "ProcessDocs");
        assert_eq!(schema["vectorizer"], "none");
        assert_eq!(schema["vectorIndexConfig"]["distance"], "cosine");
        assert_eq!(schema["properties"][0]["name"], "content");
    }
}
