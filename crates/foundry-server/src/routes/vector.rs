use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

use foundry::vector::encoders::recommended_models;
use foundry::vector::schemas::{Document, IndexConfig, SearchQuery, SearchResult, StoreStatus};

use crate::state::AppState;

/// Response envelope used across the vector-db routes. Operational failures
/// come back as `success: false` with a 200, matching the rest of the
/// vector surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
}

impl ApiEnvelope {
    fn ok(message: impl Into<String>, data: Option<Value>, start: Instant) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
            execution_time_ms: Some(elapsed_ms(start)),
        }
    }

    fn failed(message: impl Into<String>, error: Option<String>, start: Instant) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error,
            execution_time_ms: Some(elapsed_ms(start)),
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteBatchRequest {
    pub ids: Vec<String>,
}

async fn status(State(state): State<AppState>) -> Json<StoreStatus> {
    Json(state.vector.status().await)
}

async fn create_index(
    State(state): State<AppState>,
    Json(config): Json<IndexConfig>,
) -> Json<ApiEnvelope> {
    let start = Instant::now();
    let class_name = config.class_name.clone();

    match state.vector.create_index(&config).await {
        Ok(true) => {
            state
                .encoders
                .write()
                .await
                .insert(class_name.clone(), config.encoder_model.clone());
            Json(ApiEnvelope::ok(
                format!("Index '{}' created successfully", class_name),
                None,
                start,
            ))
        }
        Ok(false) => Json(ApiEnvelope::failed(
            format!("Failed to create index '{}'", class_name),
            None,
            start,
        )),
        Err(e) => {
            tracing::error!("failed to create index: {}", e);
            Json(ApiEnvelope::failed(
                "Failed to create index",
                Some(e.to_string()),
                start,
            ))
        }
    }
}

async fn delete_index(
    State(state): State<AppState>,
    Path(class_name): Path<String>,
) -> Json<ApiEnvelope> {
    let start = Instant::now();
    match state.vector.delete_index(&class_name).await {
        Ok(true) => {
            state.encoders.write().await.remove(&class_name);
            Json(ApiEnvelope::ok(
                format!("Index '{}' deleted successfully", class_name),
                None,
                start,
            ))
        }
        Ok(false) => Json(ApiEnvelope::failed(
            format!("Failed to delete index '{}'", class_name),
            None,
            start,
        )),
        Err(e) => {
            tracing::error!("failed to delete index: {}", e);
            Json(ApiEnvelope::failed(
                "Failed to delete index",
                Some(e.to_string()),
                start,
            ))
        }
    }
}

/// Embed a document's content unless the client supplied a vector.
async fn vector_for_document(
    state: &AppState,
    class_name: &str,
    document: &Document,
) -> Result<Option<Vec<f32>>, String> {
    if document.vector.is_some() {
        return Ok(None);
    }
    let model = state.encoder_for_class(class_name).await;
    state
        .embeddings
        .embed_one(&model, &document.content)
        .await
        .map(Some)
        .map_err(|e| e.to_string())
}

async fn add_document(
    State(state): State<AppState>,
    Path(class_name): Path<String>,
    Json(document): Json<Document>,
) -> Json<ApiEnvelope> {
    let start = Instant::now();

    let vector = match vector_for_document(&state, &class_name, &document).await {
        Ok(vector) => vector,
        Err(e) => {
            return Json(ApiEnvelope::failed("Failed to embed document", Some(e), start));
        }
    };

    match state
        .vector
        .add_document(&class_name, &document, vector.as_deref())
        .await
    {
        Ok(doc_id) => Json(ApiEnvelope::ok(
            format!("Document added to '{}'", class_name),
            Some(json!({ "id": doc_id })),
            start,
        )),
        Err(e) => {
            tracing::error!("failed to add document: {}", e);
            Json(ApiEnvelope::failed(
                "Failed to add document",
                Some(e.to_string()),
                start,
            ))
        }
    }
}

async fn add_documents_batch(
    State(state): State<AppState>,
    Path(class_name): Path<String>,
    Json(documents): Json<Vec<Document>>,
) -> Json<ApiEnvelope> {
    let start = Instant::now();

    // Embed everything that did not arrive with a vector, in one batch
    let to_embed: Vec<String> = documents
        .iter()
        .filter(|doc| doc.vector.is_none())
        .map(|doc| doc.content.clone())
        .collect();

    let mut embedded = Vec::new();
    if !to_embed.is_empty() {
        let model = state.encoder_for_class(&class_name).await;
        match state.embeddings.embed(&model, &to_embed).await {
            Ok(vectors) => embedded = vectors,
            Err(e) => {
                return Json(ApiEnvelope::failed(
                    "Failed to embed documents",
                    Some(e.to_string()),
                    start,
                ));
            }
        }
    }

    let mut embedded_iter = embedded.into_iter();
    let vectors: Vec<Vec<f32>> = documents
        .iter()
        .map(|doc| match &doc.vector {
            Some(vector) => vector.clone(),
            None => embedded_iter.next().unwrap_or_default(),
        })
        .collect();

    match state
        .vector
        .add_documents(&class_name, &documents, Some(&vectors))
        .await
    {
        Ok(ids) => {
            let added = ids.iter().filter(|id| id.is_some()).count();
            Json(ApiEnvelope::ok(
                format!("Added {}/{} documents to '{}'", added, ids.len(), class_name),
                Some(json!({ "ids": ids, "count": added })),
                start,
            ))
        }
        Err(e) => {
            tracing::error!("batch insert failed: {}", e);
            Json(ApiEnvelope::failed(
                "Failed to add documents",
                Some(e.to_string()),
                start,
            ))
        }
    }
}

async fn search_documents(
    State(state): State<AppState>,
    Path(class_name): Path<String>,
    Json(query): Json<SearchQuery>,
) -> Json<Vec<SearchResult>> {
    // Search degrades instead of failing: no embedding -> BM25, errors -> empty
    let model = state.encoder_for_class(&class_name).await;
    let query_vector = match state.embeddings.embed_one(&model, &query.query).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            tracing::warn!("query embedding failed, falling back to BM25: {}", e);
            None
        }
    };

    match state
        .vector
        .search(&class_name, &query, query_vector.as_deref())
        .await
    {
        Ok(results) => Json(results),
        Err(e) => {
            tracing::error!("search in '{}' failed: {}", class_name, e);
            Json(Vec::new())
        }
    }
}

async fn delete_document(
    State(state): State<AppState>,
    Path((class_name, doc_id)): Path<(String, String)>,
) -> Json<ApiEnvelope> {
    let start = Instant::now();
    match state.vector.delete_document(&class_name, &doc_id).await {
        Ok(true) => Json(ApiEnvelope::ok(
            format!("Document '{}' deleted from '{}'", doc_id, class_name),
            None,
            start,
        )),
        Ok(false) => Json(ApiEnvelope::failed(
            format!("Failed to delete document '{}'", doc_id),
            None,
            start,
        )),
        Err(e) => Json(ApiEnvelope::failed(
            "Failed to delete document",
            Some(e.to_string()),
            start,
        )),
    }
}

async fn delete_documents_batch(
    State(state): State<AppState>,
    Path(class_name): Path<String>,
    Json(request): Json<DeleteBatchRequest>,
) -> Json<ApiEnvelope> {
    let start = Instant::now();
    match state.vector.delete_documents(&class_name, &request.ids).await {
        Ok(results) => {
            let deleted = results.iter().filter(|ok| **ok).count();
            Json(ApiEnvelope::ok(
                format!(
                    "Deleted {}/{} documents from '{}'",
                    deleted,
                    request.ids.len(),
                    class_name
                ),
                Some(json!({ "deleted": deleted, "requested": request.ids.len() })),
                start,
            ))
        }
        Err(e) => Json(ApiEnvelope::failed(
            "Failed to delete documents",
            Some(e.to_string()),
            start,
        )),
    }
}

async fn recommended_encoders() -> Json<Value> {
    Json(recommended_models())
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/vector-db/status", get(status))
        .route("/api/vector-db/indices", post(create_index))
        .route("/api/vector-db/indices/:class_name", delete(delete_index))
        .route("/api/vector-db/documents/:class_name", post(add_document))
        .route(
            "/api/vector-db/documents/:class_name/batch",
            post(add_documents_batch),
        )
        .route(
            "/api/vector-db/documents/:class_name/delete-batch",
            post(delete_documents_batch),
        )
        .route(
            "/api/vector-db/documents/:class_name/:doc_id",
            delete(delete_document),
        )
        .route("/api/vector-db/search/:class_name", post(search_documents))
        .route("/api/vector-db/encoders/recommended", get(recommended_encoders))
        .with_state(state)
}
