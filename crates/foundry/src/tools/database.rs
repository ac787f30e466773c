use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::executor::{ToolExecutor, ToolKind};
use crate::data::SqlStore;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolCall;

/// Built-in tool exposing the plant database to agents: SELECT queries,
/// catalog listing, table schemas and paged table reads.
pub struct DatabaseTool {
    store: Arc<SqlStore>,
    schema: Value,
}

impl DatabaseTool {
    pub fn new(store: Arc<SqlStore>) -> Self {
        Self {
            store,
            schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["query", "list_tables", "get_table_schema", "get_table_data"],
                        "description": "Action to perform on the database"
                    },
                    "query": {
                        "type": "string",
                        "description": "SQL query to execute (only SELECT statements allowed)"
                    },
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table for table-specific operations"
                    },
                    "limit": {
                        "type": "integer",
                        "default": 10,
                        "description": "Maximum number of rows to return for table data queries"
                    },
                    "offset": {
                        "type": "integer",
                        "default": 0,
                        "description": "Number of rows to skip for pagination"
                    },
                    "where_clause": {
                        "type": "string",
                        "description": "WHERE clause for filtering data"
                    },
                    "order_by": {
                        "type": "string",
                        "description": "ORDER BY clause for sorting data"
                    }
                },
                "required": ["action"]
            }),
        }
    }

    fn table_name<'a>(arguments: &'a Value) -> AgentResult<&'a str> {
        arguments
            .get("table_name")
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                AgentError::InvalidParameters(
                    "table_name is required for this action".to_string(),
                )
            })
    }
}

#[async_trait]
impl ToolExecutor for DatabaseTool {
    fn name(&self) -> &str {
        "database_tool"
    }

    fn description(&self) -> &str {
        "Tool for querying the industrial manufacturing database. Can execute SELECT \
         queries, list tables, get table schemas, and retrieve table data with filtering."
    }

    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Database
    }

    async fn execute(&self, call: ToolCall) -> AgentResult<Value> {
        let arguments = &call.arguments;
        let action = arguments
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| {
                AgentError::InvalidParameters("'action' must be a string".to_string())
            })?;

        let result = match action {
            "query" => {
                let sql = arguments.get("query").and_then(|q| q.as_str()).ok_or_else(
                    || {
                        AgentError::InvalidParameters(
                            "query parameter is required for query action".to_string(),
                        )
                    },
                )?;
                let output = self
                    .store
                    .query(sql, &[])
                    .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
                serde_json::to_value(output)
            }
            "list_tables" => {
                let tables = self
                    .store
                    .tables()
                    .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
                Ok(json!({ "tables": tables }))
            }
            "get_table_schema" => {
                let table = Self::table_name(arguments)?;
                let schema = self
                    .store
                    .table_schema(table)
                    .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
                serde_json::to_value(schema)
            }
            "get_table_data" => {
                let table = Self::table_name(arguments)?;
                let limit = arguments
                    .get("limit")
                    .and_then(|l| l.as_u64())
                    .unwrap_or(10) as usize;
                let offset = arguments
                    .get("offset")
                    .and_then(|o| o.as_u64())
                    .unwrap_or(0) as usize;
                let where_clause = arguments.get("where_clause").and_then(|w| w.as_str());
                let order_by = arguments.get("order_by").and_then(|o| o.as_str());
                let output = self
                    .store
                    .table_data(table, limit, offset, where_clause, order_by)
                    .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
                serde_json::to_value(output)
            }
            other => {
                return Err(AgentError::InvalidParameters(format!(
                    "Unknown action: {}",
                    other
                )))
            }
        };

        result.map_err(|e| AgentError::Internal(e.to_string()))
    }
}
