use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};
use std::time::Duration;
use uuid::Uuid;

use super::schemas::{Document, IndexConfig, SearchQuery, SearchResult, StoreStatus};

/// Client for the Weaviate vector database. Schema and object operations go
/// through the REST endpoints, searches through GraphQL.
pub struct WeaviateClient {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl WeaviateClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub async fn is_ready(&self) -> bool {
        let request = self
            .authed(self.client.get(self.endpoint("/v1/.well-known/ready")));
        matches!(request.send().await, Ok(resp) if resp.status().is_success())
    }

    pub async fn status(&self) -> StoreStatus {
        let meta = match self.get_json("/v1/meta").await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("failed to reach vector store: {}", e);
                return StoreStatus::disconnected();
            }
        };
        let version = meta
            .get("version")
            .and_then(|v| v.as_str())
            .map(String::from);

        let classes = match self.classes().await {
            Ok(classes) => classes,
            Err(e) => {
                tracing::warn!("failed to read schema: {}", e);
                return StoreStatus {
                    connected: true,
                    total_objects: 0,
                    classes: Vec::new(),
                    health: "error".to_string(),
                    version,
                };
            }
        };

        let mut total_objects = 0;
        for class in &classes {
            total_objects += self.count_objects(class).await.unwrap_or(0);
        }

        StoreStatus {
            connected: true,
            total_objects,
            classes,
            health: "healthy".to_string(),
            version,
        }
    }

    async fn classes(&self) -> Result<Vec<String>> {
        let schema = self.get_json("/v1/schema").await?;
        Ok(schema
            .get("classes")
            .and_then(|c| c.as_array())
            .map(|classes| {
                classes
                    .iter()
                    .filter_map(|c| c.get("class").and_then(|n| n.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_objects(&self, class_name: &str) -> Result<u64> {
        let query = format!(
            "{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}",
            class_name
        );
        let response = self.graphql(&query).await?;
        Ok(response["data"]["Aggregate"][class_name][0]["meta"]["count"]
            .as_u64()
            .unwrap_or(0))
    }

    /// Create a new index (class). Returns false when the class already exists.
    pub async fn create_index(&self, config: &IndexConfig) -> Result<bool> {
        if self.class_exists(&config.class_name).await? {
            tracing::warn!("class {} already exists", config.class_name);
            return Ok(false);
        }

        let response = self
            .authed(self.client.post(self.endpoint("/v1/schema")))
            .json(&config.weaviate_schema())
            .send()
            .await?;

        if response.status().is_success() {
            tracing::info!("created class {}", config.class_name);
            Ok(true)
        } else {
            Err(anyhow!(
                "failed to create class {}: {}",
                config.class_name,
                response.text().await.unwrap_or_default()
            ))
        }
    }

    /// Delete an index. Returns false when the class does not exist.
    pub async fn delete_index(&self, class_name: &str) -> Result<bool> {
        if !self.class_exists(class_name).await? {
            tracing::warn!("class {} does not exist", class_name);
            return Ok(false);
        }

        let url = self.endpoint(&format!("/v1/schema/{}", class_name));
        let response = self.authed(self.client.delete(&url)).send().await?;
        if response.status().is_success() {
            tracing::info!("deleted class {}", class_name);
            Ok(true)
        } else {
            Err(anyhow!(
                "failed to delete class {}: {}",
                class_name,
                response.status()
            ))
        }
    }

    async fn class_exists(&self, class_name: &str) -> Result<bool> {
        let url = self.endpoint(&format!("/v1/schema/{}", class_name));
        let response = self.authed(self.client.get(&url)).send().await?;
        Ok(response.status().is_success())
    }

    /// Add a single document, returning its id.
    pub async fn add_document(
        &self,
        class_name: &str,
        document: &Document,
        vector: Option<&[f32]>,
    ) -> Result<String> {
        let doc_id = document
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut object = json!({
            "class": class_name,
            "id": doc_id,
            "properties": document_properties(document),
        });
        let vector = vector.or(document.vector.as_deref());
        if let Some(vector) = vector {
            object["vector"] = json!(vector);
        }

        let response = self
            .authed(self.client.post(self.endpoint("/v1/objects")))
            .json(&object)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!("added document {} to {}", doc_id, class_name);
            Ok(doc_id)
        } else {
            Err(anyhow!(
                "failed to add document to {}: {}",
                class_name,
                response.text().await.unwrap_or_default()
            ))
        }
    }

    /// Add documents through the batch endpoint. Returns one id per input,
    /// None where the server reported a per-object error.
    pub async fn add_documents(
        &self,
        class_name: &str,
        documents: &[Document],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<Vec<Option<String>>> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut objects = Vec::with_capacity(documents.len());

        for (index, document) in documents.iter().enumerate() {
            let doc_id = document
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let mut object = json!({
                "class": class_name,
                "id": doc_id,
                "properties": document_properties(document),
            });
            let vector = vectors
                .and_then(|vs| vs.get(index))
                .map(|v| v.as_slice())
                .or(document.vector.as_deref());
            if let Some(vector) = vector {
                object["vector"] = json!(vector);
            }
            ids.push(doc_id);
            objects.push(object);
        }

        let response = self
            .authed(self.client.post(self.endpoint("/v1/batch/objects")))
            .json(&json!({ "objects": objects }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "batch insert into {} failed: {}",
                class_name,
                response.status()
            ));
        }

        let body: Value = response.json().await?;
        let results = match body.as_array() {
            Some(items) => ids
                .into_iter()
                .enumerate()
                .map(|(index, id)| {
                    let failed = items
                        .get(index)
                        .and_then(|item| item.pointer("/result/errors"))
                        .map(|errors| !errors.is_null())
                        .unwrap_or(false);
                    if failed {
                        None
                    } else {
                        Some(id)
                    }
                })
                .collect(),
            None => ids.into_iter().map(Some).collect(),
        };
        Ok(results)
    }

    /// Similarity search. With a query vector this is a nearVector search
    /// filtered by certainty; without one it falls back to BM25.
    pub async fn search(
        &self,
        class_name: &str,
        query: &SearchQuery,
        query_vector: Option<&[f32]>,
    ) -> Result<Vec<SearchResult>> {
        let mut arguments = vec![format!("limit: {}", query.limit)];

        match query_vector {
            Some(vector) => {
                let rendered: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
                arguments.push(format!(
                    "nearVector: {{vector: [{}], certainty: {}}}",
                    rendered.join(","),
                    query.threshold
                ));
            }
            None => {
                arguments.push(format!("bm25: {{query: {}}}", gql_string(&query.query)));
            }
        }

        if let Some(filter) = build_where_filter(&query.filters) {
            arguments.push(format!("where: {}", filter));
        }

        let mut additional = vec!["id", "certainty", "score"];
        if query.include_vector {
            additional.push("vector");
        }

        let gql = format!(
            "{{ Get {{ {class}({args}) {{ content title source created_at _additional {{ {additional} }} }} }} }}",
            class = class_name,
            args = arguments.join(", "),
            additional = additional.join(" "),
        );

        let response = self.graphql(&gql).await?;
        if let Some(errors) = response.get("errors") {
            return Err(anyhow!("search in {} failed: {}", class_name, errors));
        }

        let objects = response["data"]["Get"][class_name]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let results = objects
            .iter()
            .map(|object| {
                let additional = &object["_additional"];
                let score = additional["certainty"]
                    .as_f64()
                    .or_else(|| {
                        additional["score"]
                            .as_str()
                            .and_then(|s| s.parse::<f64>().ok())
                    })
                    .unwrap_or(0.0);

                let metadata: Map<String, Value> = object
                    .as_object()
                    .map(|entries| {
                        entries
                            .iter()
                            .filter(|(key, _)| {
                                !matches!(
                                    key.as_str(),
                                    "content" | "title" | "source" | "_additional"
                                )
                            })
                            .map(|(key, value)| (key.clone(), value.clone()))
                            .collect()
                    })
                    .unwrap_or_default();

                SearchResult {
                    id: additional["id"].as_str().unwrap_or_default().to_string(),
                    content: object["content"].as_str().unwrap_or_default().to_string(),
                    title: object["title"].as_str().map(String::from),
                    score,
                    metadata,
                    source: object["source"].as_str().map(String::from),
                    vector: if query.include_vector {
                        serde_json::from_value(additional["vector"].clone()).ok()
                    } else {
                        None
                    },
                }
            })
            .collect();

        Ok(results)
    }

    pub async fn delete_document(&self, class_name: &str, doc_id: &str) -> Result<bool> {
        let url = self.endpoint(&format!("/v1/objects/{}/{}", class_name, doc_id));
        let response = self.authed(self.client.delete(&url)).send().await?;
        Ok(response.status().is_success())
    }

    pub async fn delete_documents(
        &self,
        class_name: &str,
        doc_ids: &[String],
    ) -> Result<Vec<bool>> {
        let mut results = Vec::with_capacity(doc_ids.len());
        for doc_id in doc_ids {
            results.push(self.delete_document(class_name, doc_id).await.unwrap_or(false));
        }
        tracing::info!(
            "deleted {} out of {} documents from {}",
            results.iter().filter(|ok| **ok).count(),
            doc_ids.len(),
            class_name
        );
        Ok(results)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self
            .authed(self.client.get(self.endpoint(path)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("GET {} failed: {}", path, response.status()));
        }
        Ok(response.json().await?)
    }

    async fn graphql(&self, query: &str) -> Result<Value> {
        let response = self
            .authed(self.client.post(self.endpoint("/v1/graphql")))
            .json(&json!({ "query": query }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("GraphQL request failed: {}", response.status()));
        }
        Ok(response.json().await?)
    }
}

fn document_properties(document: &Document) -> Value {
    let mut properties = Map::new();
    properties.insert("content".to_string(), json!(document.content));
    properties.insert("title".to_string(), json!(document.title));
    properties.insert("source".to_string(), json!(document.source));
    let created_at = document.created_at.unwrap_or_else(Utc::now);
    properties.insert("created_at".to_string(), json!(created_at.to_rfc3339()));

    for (key, value) in &document.metadata {
        properties.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Value::Object(properties)
}

/// Render the filter map as a GraphQL `where` argument. A scalar value means
/// equality; an object value maps operator suffixes onto Weaviate operators,
/// e.g. `{"pressure": {"gt": 3.0}}`.
fn build_where_filter(filters: &Map<String, Value>) -> Option<String> {
    if filters.is_empty() {
        return None;
    }

    let mut conditions = Vec::new();
    for (field, value) in filters {
        match value {
            Value::Object(operators) => {
                for (op, operand) in operators {
                    conditions.push(render_condition(field, map_operator(op), operand));
                }
            }
            scalar => conditions.push(render_condition(field, "Equal", scalar)),
        }
    }

    match conditions.len() {
        0 => None,
        1 => Some(conditions.remove(0)),
        _ => Some(format!(
            "{{operator: And, operands: [{}]}}",
            conditions.join(", ")
        )),
    }
}

fn render_condition(field: &str, operator: &str, value: &Value) -> String {
    let (value_key, rendered) = match value {
        Value::String(s) => ("valueText", gql_string(s)),
        Value::Bool(b) => ("valueBoolean", b.to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => ("valueInt", n.to_string()),
        Value::Number(n) => ("valueNumber", n.to_string()),
        other => ("valueText", gql_string(&other.to_string())),
    };
    format!(
        "{{path: [\"{}\"], operator: {}, {}: {}}}",
        field, operator, value_key, rendered
    )
}

fn map_operator(op: &str) -> &'static str {
    match op.to_lowercase().as_str() {
        "eq" => "Equal",
        "ne" => "NotEqual",
        "gt" => "GreaterThan",
        "gte" => "GreaterThanEqual",
        "lt" => "LessThan",
        "lte" => "LessThanEqual",
        "like" => "Like",
        "contains" => "ContainsAny",
        _ => "Equal",
    }
}

fn gql_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
