use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use foundry::data::DataError;

use super::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct TableDataParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
}

fn default_limit() -> usize {
    10
}

fn error_status(error: &DataError) -> StatusCode {
    match error {
        DataError::TableNotFound(_) => StatusCode::NOT_FOUND,
        DataError::NotReadOnly
        | DataError::InvalidIdentifier(_)
        | DataError::InvalidFragment(_) => StatusCode::BAD_REQUEST,
        DataError::Sqlite(_) => StatusCode::BAD_REQUEST,
    }
}

async fn database_info(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.stats() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to get database info: {}", e))),
        )
            .into_response(),
    }
}

async fn list_tables(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.tables() {
        Ok(tables) => (StatusCode::OK, Json(json!({ "tables": tables }))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to list tables: {}", e))),
        )
            .into_response(),
    }
}

async fn table_schema(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> impl IntoResponse {
    match state.db.table_schema(&table_name) {
        Ok(schema) => (StatusCode::OK, Json(schema)).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse::new(format!("Table not found or error: {}", e))),
        )
            .into_response(),
    }
}

async fn table_data(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
    Query(params): Query<TableDataParams>,
) -> impl IntoResponse {
    match state.db.table_data(
        &table_name,
        params.limit,
        params.offset,
        params.where_clause.as_deref(),
        params.order_by.as_deref(),
    ) {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse::new(format!("Query failed: {}", e))),
        )
            .into_response(),
    }
}

async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let params = request.params.unwrap_or_default();
    match state.db.query(&request.query, &params) {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse::new(format!("Query execution failed: {}", e))),
        )
            .into_response(),
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/db", get(database_info))
        .route("/api/db/tables", get(list_tables))
        .route("/api/db/tables/:table_name/schema", get(table_schema))
        .route("/api/db/tables/:table_name/data", get(table_data))
        .route("/api/db/query", post(execute_query))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_database_info() {
        let state = test_state().await;
        let app = routes(state);

        let (status, info) = get_json(&app, "/api/db").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["total_tables"], 1);
        assert_eq!(info["connection_status"], "Connected");
    }

    #[tokio::test]
    async fn test_list_tables() {
        let state = test_state().await;
        let app = routes(state);

        let (status, body) = get_json(&app, "/api/db/tables").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"], json!(["lot_history"]));
    }

    #[tokio::test]
    async fn test_table_schema() {
        let state = test_state().await;
        let app = routes(state);

        let (status, schema) = get_json(&app, "/api/db/tables/lot_history/schema").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(schema["table_name"], "lot_history");
        assert_eq!(schema["columns"][1]["name"], "lot_id");

        let (status, _) = get_json(&app, "/api/db/tables/missing/schema").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_table_data_with_params() {
        let state = test_state().await;
        let app = routes(state);

        let (status, page) =
            get_json(&app, "/api/db/tables/lot_history/data?limit=2&offset=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["row_count"], 2);

        let (status, filtered) = get_json(
            &app,
            "/api/db/tables/lot_history/data?where_clause=pressure%20%3E%203.0",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filtered["row_count"], 1);
        assert_eq!(filtered["data"][0]["lot_id"], "L-1002");
    }

    #[tokio::test]
    async fn test_execute_query() {
        let state = test_state().await;
        let app = routes(state);

        let request = Request::builder()
            .uri("/api/db/query")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "query": "SELECT lot_id FROM lot_history WHERE step = ?1",
                    "params": ["cvd"]
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let output: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(output["row_count"], 1);
        assert_eq!(output["data"][0]["lot_id"], "L-1002");
    }

    #[tokio::test]
    async fn test_execute_query_rejects_writes() {
        let state = test_state().await;
        let app = routes(state);

        let request = Request::builder()
            .uri("/api/db/query")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"query": "DELETE FROM lot_history"}).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
