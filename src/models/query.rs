//! Query-related data models.
//!
//! This module defines SQL parameter values and statement outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Default number of result rows written to the log per statement.
pub const DEFAULT_RESULT_LOG_ROWS: usize = 10;

/// A parameter value for `%(name)s` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    /// Lists (sent as `ARRAY[...]`) and objects (sent as JSON text)
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Named SQL parameters, keyed by placeholder name.
pub type SqlParams = BTreeMap<String, QueryParam>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// PostgreSQL type name (e.g., "INT4", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// What a single keyword execution produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementOutcome {
    /// Row-returning statement. Rows are positional, in column order.
    Rows {
        columns: Vec<ColumnMetadata>,
        rows: Vec<Vec<JsonValue>>,
    },
    RowsAffected(u64),
}

impl StatementOutcome {
    /// Number of rows fetched, or affected for non-row statements.
    pub fn row_count(&self) -> u64 {
        match self {
            Self::Rows { rows, .. } => rows.len() as u64,
            Self::RowsAffected(n) => *n,
        }
    }

    pub fn is_rows(&self) -> bool {
        matches!(self, Self::Rows { .. })
    }

    /// Value handed back to the test runner: a list of row lists, or the
    /// affected-row count.
    pub fn into_return_value(self) -> JsonValue {
        match self {
            Self::Rows { rows, .. } => {
                JsonValue::Array(rows.into_iter().map(JsonValue::Array).collect())
            }
            Self::RowsAffected(n) => JsonValue::from(n),
        }
    }

    /// Rows keyed by column name. Affected-count outcomes have no rows.
    pub fn into_mapped_rows(self) -> Vec<serde_json::Map<String, JsonValue>> {
        match self {
            Self::Rows { columns, rows } => rows
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| c.name.clone())
                        .zip(row)
                        .collect::<serde_json::Map<_, _>>()
                })
                .collect(),
            Self::RowsAffected(_) => Vec::new(),
        }
    }
}
