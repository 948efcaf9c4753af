//! PostgreSQL type mappings.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the column's type name
//! 2. A per-category decoder extracts the value into JSON
//!
//! One-dimensional arrays of the common scalar types become JSON arrays.
//! Other types are returned in PostgreSQL's own text form. A value that
//! arrives in binary form with no decoder here is returned as NULL with a
//! warning, never as raw bytes.

use crate::models::ColumnMetadata;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgRow, PgValueFormat};
use sqlx::types::BigDecimal;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Logical category for column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Oid,
    /// Element category comes from the type name without its `[]` suffix.
    Array,
    Unknown,
}

/// Classify a PostgreSQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    if type_name.ends_with("[]") {
        return TypeCategory::Array;
    }
    match type_name.to_ascii_uppercase().as_str() {
        "INT2" | "SMALLINT" => TypeCategory::SmallInt,
        "INT4" | "INTEGER" | "INT" | "SERIAL" => TypeCategory::Integer,
        "INT8" | "BIGINT" | "BIGSERIAL" => TypeCategory::BigInt,
        "FLOAT4" | "REAL" => TypeCategory::Real,
        "FLOAT8" | "DOUBLE PRECISION" => TypeCategory::Double,
        "NUMERIC" | "DECIMAL" => TypeCategory::Decimal,
        "BOOL" | "BOOLEAN" => TypeCategory::Boolean,
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => TypeCategory::Text,
        "BYTEA" => TypeCategory::Binary,
        "JSON" | "JSONB" => TypeCategory::Json,
        "UUID" => TypeCategory::Uuid,
        "DATE" => TypeCategory::Date,
        "TIME" => TypeCategory::Time,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "TIMESTAMPTZ" => TypeCategory::TimestampTz,
        "OID" => TypeCategory::Oid,
        _ => TypeCategory::Unknown,
    }
}

/// Encode binary data as a base64 JSON string.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

/// Trait for converting driver rows to JSON values.
pub trait RowToJson {
    /// Column values in column order.
    fn to_json_values(&self) -> Vec<JsonValue>;
    fn get_column_metadata(&self) -> Vec<ColumnMetadata>;
}

impl RowToJson for PgRow {
    fn to_json_values(&self) -> Vec<JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| decode_column(self, idx, col.type_info().name()))
            .collect()
    }

    fn get_column_metadata(&self) -> Vec<ColumnMetadata> {
        self.columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
            .collect()
    }
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
    match categorize_type(type_name) {
        TypeCategory::SmallInt => decode_as::<i16>(row, idx, |v| v.into()),
        TypeCategory::Integer => decode_as::<i32>(row, idx, |v| v.into()),
        TypeCategory::BigInt => decode_as::<i64>(row, idx, |v| v.into()),
        TypeCategory::Real => decode_as::<f32>(row, idx, |v| float_value(f64::from(v))),
        TypeCategory::Double => decode_as::<f64>(row, idx, float_value),
        TypeCategory::Decimal => decode_as::<BigDecimal>(row, idx, |v| JsonValue::String(v.to_string())),
        TypeCategory::Boolean => decode_as::<bool>(row, idx, JsonValue::Bool),
        TypeCategory::Text => decode_as::<String>(row, idx, JsonValue::String),
        TypeCategory::Binary => decode_as::<Vec<u8>>(row, idx, |v| encode_binary_value(&v)),
        TypeCategory::Json => decode_as::<JsonValue>(row, idx, |v| v),
        TypeCategory::Uuid => decode_as::<uuid::Uuid>(row, idx, |v| JsonValue::String(v.to_string())),
        TypeCategory::Date => decode_as::<NaiveDate>(row, idx, |v| JsonValue::String(v.to_string())),
        TypeCategory::Time => decode_as::<NaiveTime>(row, idx, |v| JsonValue::String(v.to_string())),
        TypeCategory::Timestamp => decode_as::<NaiveDateTime>(row, idx, |v| {
            JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        TypeCategory::TimestampTz => {
            decode_as::<DateTime<Utc>>(row, idx, |v| JsonValue::String(v.to_rfc3339()))
        }
        TypeCategory::Oid => decode_as::<Oid>(row, idx, |v| v.0.into()),
        TypeCategory::Array => decode_array(row, idx, categorize_type(type_name.trim_end_matches("[]"))),
        TypeCategory::Unknown => decode_fallback(row, idx),
    }
}

/// One-dimensional arrays of scalar elements. Anything else (nested
/// arrays, exotic element types) falls back to the text form.
fn decode_array(row: &PgRow, idx: usize, element: TypeCategory) -> JsonValue {
    match element {
        TypeCategory::SmallInt => decode_as::<Vec<Option<i16>>>(row, idx, |v| json_list(v, JsonValue::from)),
        TypeCategory::Integer => decode_as::<Vec<Option<i32>>>(row, idx, |v| json_list(v, JsonValue::from)),
        TypeCategory::BigInt => decode_as::<Vec<Option<i64>>>(row, idx, |v| json_list(v, JsonValue::from)),
        TypeCategory::Real => {
            decode_as::<Vec<Option<f32>>>(row, idx, |v| json_list(v, |f| float_value(f64::from(f))))
        }
        TypeCategory::Double => decode_as::<Vec<Option<f64>>>(row, idx, |v| json_list(v, float_value)),
        TypeCategory::Decimal => decode_as::<Vec<Option<BigDecimal>>>(row, idx, |v| {
            json_list(v, |d| JsonValue::String(d.to_string()))
        }),
        TypeCategory::Boolean => decode_as::<Vec<Option<bool>>>(row, idx, |v| json_list(v, JsonValue::Bool)),
        TypeCategory::Text => decode_as::<Vec<Option<String>>>(row, idx, |v| json_list(v, JsonValue::String)),
        _ => decode_fallback(row, idx),
    }
}

fn json_list<T>(items: Vec<Option<T>>, convert: impl Fn(T) -> JsonValue) -> JsonValue {
    JsonValue::Array(
        items
            .into_iter()
            .map(|item| item.map_or(JsonValue::Null, &convert))
            .collect(),
    )
}

fn decode_as<T>(row: &PgRow, idx: usize, convert: impl FnOnce(T) -> JsonValue) -> JsonValue
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => convert(v),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::debug!(column = idx, error = %e, "Typed decode failed, using fallback");
            decode_fallback(row, idx)
        }
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Value of a column whose type has no dedicated decoder.
///
/// Text-format values (every simple-protocol result) are returned as the
/// server wrote them. Binary values are decoded for the few types that
/// have a driver type here; any other binary value is NULL with a warning.
fn decode_fallback(row: &PgRow, idx: usize) -> JsonValue {
    let Ok(raw) = row.try_get_raw(idx) else {
        return JsonValue::Null;
    };
    if raw.is_null() {
        return JsonValue::Null;
    }
    match raw.format() {
        PgValueFormat::Text => raw
            .as_str()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        PgValueFormat::Binary => {
            let type_name = raw.type_info().name().to_string();
            decode_binary(row, idx, &type_name).unwrap_or_else(|| {
                tracing::warn!(
                    column = idx,
                    type_name = %type_name,
                    "No decoder for binary value, returning NULL"
                );
                JsonValue::Null
            })
        }
    }
}

fn decode_binary(row: &PgRow, idx: usize, type_name: &str) -> Option<JsonValue> {
    match type_name {
        "INTERVAL" => row
            .try_get::<PgInterval, _>(idx)
            .ok()
            .map(|v| JsonValue::String(format_interval(&v))),
        "MONEY" => row
            .try_get::<PgMoney, _>(idx)
            .ok()
            .map(|v| JsonValue::String(v.to_bigdecimal(2).to_string())),
        _ => None,
    }
}

/// Interval in PostgreSQL's default output style, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, name: &str) -> String {
        if n == 1 || n == -1 {
            format!("{n} {name}")
        } else {
            format!("{n} {name}s")
        }
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{frac:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}
