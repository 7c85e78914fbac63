//! Read-only query construction and execution against a SQLite file
//!
//! Two mutually exclusive modes, selected by whether a raw query string is
//! supplied. Raw queries are shape-checked and wrapped in a derived table so
//! the outer projection and row ceiling always apply; structured queries are
//! built only from allow-listed identifiers. Values are never interpolated
//! into SQL text; dates and the row ceiling are always bound parameters.
//! Identifiers cannot be bound by the driver, so the allow-list is the sole
//! defense on that axis.

use crate::error::ForecastError;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

/// Row ceiling applied when the caller does not supply one.
pub const DEFAULT_ROW_LIMIT: u32 = 5_000;

/// Hard upper bound on the row ceiling.
pub const MAX_ROW_LIMIT: u32 = 50_000;

/// Ingestion request against a SQLite source. `sql` selects raw mode;
/// otherwise `table` (with optional column overrides and date bounds)
/// selects structured mode.
#[derive(Debug, Clone, Default)]
pub struct SourceQuery {
    pub table: Option<String>,
    pub date_column: Option<String>,
    pub value_column: Option<String>,
    pub sql: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
}

/// A fully built query: SQL text plus its bound parameters, in order.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One raw pair as read from the driver, before validation. Textual forms
/// are preserved so the precision inferencer can inspect the original
/// representation of each value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: String,
    pub value: String,
}

fn is_safe_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Build the query for a request without touching any database.
pub fn build_plan(request: &SourceQuery) -> Result<QueryPlan, ForecastError> {
    let limit = request
        .limit
        .unwrap_or(DEFAULT_ROW_LIMIT)
        .clamp(1, MAX_ROW_LIMIT);

    let raw_sql = request
        .sql
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(raw) = raw_sql {
        return build_raw_plan(raw, limit);
    }
    build_structured_plan(request, limit)
}

fn build_raw_plan(raw: &str, limit: u32) -> Result<QueryPlan, ForecastError> {
    if !raw.to_ascii_lowercase().starts_with("select") {
        return Err(ForecastError::InvalidQuery("only SELECT queries are allowed"));
    }
    if raw.contains(';') {
        return Err(ForecastError::InvalidQuery("semicolons are not allowed"));
    }
    // A caller-supplied placeholder would shift the numbering of the bound
    // row ceiling below.
    if raw.contains('?') {
        return Err(ForecastError::InvalidQuery(
            "parameter placeholders are not allowed",
        ));
    }

    // The trusted text becomes a derived table; the outer query fixes the
    // projection to exactly (date, value) and binds the row ceiling.
    Ok(QueryPlan {
        sql: format!(
            "SELECT \"date\" AS \"date\", \"value\" AS \"value\" FROM ({raw}) AS src LIMIT ?1"
        ),
        params: vec![Value::from(i64::from(limit))],
    })
}

fn build_structured_plan(request: &SourceQuery, limit: u32) -> Result<QueryPlan, ForecastError> {
    let table = request
        .table
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ForecastError::MissingSource)?;
    let date_column = request.date_column.as_deref().unwrap_or("date");
    let value_column = request.value_column.as_deref().unwrap_or("value");

    // All identifiers are checked before any query text is assembled.
    for identifier in [table, date_column, value_column] {
        if !is_safe_identifier(identifier) {
            return Err(ForecastError::InvalidIdentifier(identifier.to_string()));
        }
    }

    let mut params: Vec<Value> = Vec::new();
    let mut clauses: Vec<String> = Vec::new();
    if let Some(start) = request.start_date.as_deref().filter(|s| !s.is_empty()) {
        params.push(Value::from(start.to_string()));
        clauses.push(format!("\"{date_column}\" >= ?{}", params.len()));
    }
    if let Some(end) = request.end_date.as_deref().filter(|s| !s.is_empty()) {
        params.push(Value::from(end.to_string()));
        clauses.push(format!("\"{date_column}\" <= ?{}", params.len()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    params.push(Value::from(i64::from(limit)));
    let sql = format!(
        "SELECT \"{date_column}\" AS \"date\", \"{value_column}\" AS \"value\" \
         FROM \"{table}\"{where_sql} ORDER BY \"{date_column}\" ASC LIMIT ?{}",
        params.len()
    );

    Ok(QueryPlan { sql, params })
}

/// Execute a plan against the database file, read-only, returning raw pairs.
pub fn read_rows(db_path: &str, plan: &QueryPlan) -> Result<Vec<RawRow>, ForecastError> {
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(&plan.sql)?;
    let mut rows = stmt.query(params_from_iter(plan.params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(RawRow {
            date: text_of(row.get_ref(0)?),
            value: text_of(row.get_ref(1)?),
        });
    }
    Ok(out)
}

/// Textual form of a driver value. NULLs and blobs become empty strings and
/// are dropped downstream by validation.
fn text_of(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
    }
}
