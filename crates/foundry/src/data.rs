//! Read-only access to the plant-floor relational database.
//!
//! The gateway exposes catalog inspection (tables, schemas, stats), paged
//! table reads and ad-hoc SELECT queries. Everything returns rows as JSON
//! objects keyed by column name so results can be handed straight to the
//! model or to API clients.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Only SELECT queries are allowed for security reasons")]
    NotReadOnly,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Invalid statement fragment: {0}")]
    InvalidFragment(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    pub data: Vec<Value>,
    pub row_count: usize,
    pub execution_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_tables: usize,
    pub database_size: String,
    pub connection_status: String,
}

pub struct SqlStore {
    conn: Mutex<Connection>,
}

impl SqlStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        Ok(Self {
            conn: Mutex::new(Connection::open(path)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, DataError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Run arbitrary DDL/DML, for bootstrap scripts and tests. Not reachable
    /// from the HTTP surface.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DataError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Execute an ad-hoc read query with optional positional parameters.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<QueryOutput, DataError> {
        check_read_only(sql)?;
        let start = Instant::now();
        let conn = self.conn.lock().unwrap();
        let data = run_select(&conn, sql, params)?;
        Ok(QueryOutput {
            row_count: data.len(),
            data,
            execution_time_ms: elapsed_ms(start),
        })
    }

    /// All user tables, sorted by name.
    pub fn tables(&self) -> Result<Vec<String>, DataError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn table_schema(&self, table_name: &str) -> Result<TableSchema, DataError> {
        check_identifier(table_name)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table_name], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    column_type: row.get(1)?,
                    nullable: row.get::<_, i64>(2)? == 0,
                    default: row.get(3)?,
                    primary_key: row.get::<_, i64>(4)? > 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(DataError::TableNotFound(table_name.to_string()));
        }

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
        })
    }

    /// Page through a table with optional filtering and ordering. Defaults to
    /// ordering by the first column so pagination is stable.
    pub fn table_data(
        &self,
        table_name: &str,
        limit: usize,
        offset: usize,
        where_clause: Option<&str>,
        order_by: Option<&str>,
    ) -> Result<QueryOutput, DataError> {
        check_identifier(table_name)?;

        let mut sql = format!("SELECT * FROM \"{}\"", table_name);
        if let Some(filter) = where_clause {
            check_fragment(filter)?;
            sql.push_str(&format!(" WHERE {}", filter));
        }
        match order_by {
            Some(order) => {
                check_fragment(order)?;
                sql.push_str(&format!(" ORDER BY {}", order));
            }
            None => sql.push_str(" ORDER BY 1"),
        }
        let limit = limit.clamp(1, 1000);
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

        let start = Instant::now();
        let conn = self.conn.lock().unwrap();
        let data = run_select(&conn, &sql, &[])?;
        Ok(QueryOutput {
            row_count: data.len(),
            data,
            execution_time_ms: elapsed_ms(start),
        })
    }

    pub fn stats(&self) -> Result<StoreStats, DataError> {
        let total_tables = self.tables()?.len();
        let conn = self.conn.lock().unwrap();
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(StoreStats {
            total_tables,
            database_size: format_size((page_count * page_size) as u64),
            connection_status: "Connected".to_string(),
        })
    }
}

fn run_select(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let bound = params.iter().map(json_to_sql).collect::<Vec<_>>();
    let mut rows = stmt.query(rusqlite::params_from_iter(bound))?;

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (index, name) in columns.iter().enumerate() {
            object.insert(name.clone(), cell_to_json(row.get_ref(index)?));
        }
        data.push(Value::Object(object));
    }
    Ok(data)
}

fn json_to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn check_read_only(sql: &str) -> Result<(), DataError> {
    let trimmed = sql.trim().trim_end_matches(';');
    if trimmed.contains(';') {
        return Err(DataError::NotReadOnly);
    }
    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err(DataError::NotReadOnly);
    }
    Ok(())
}

fn check_identifier(name: &str) -> Result<(), DataError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DataError::InvalidIdentifier(name.to_string()))
    }
}

fn check_fragment(fragment: &str) -> Result<(), DataError> {
    if fragment.contains(';') {
        return Err(DataError::InvalidFragment(fragment.to_string()));
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}
