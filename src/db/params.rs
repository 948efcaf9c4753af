//! Parameter values as SQL literals.
//!
//! Strings become untyped string literals (`'...'`), which the server
//! coerces to whatever type the surrounding expression needs, so `"1"`
//! compares against an `INT` column and `"2024-01-31"` against a `DATE`.
//! Numbers and booleans are written bare, lists become `ARRAY[...]` and
//! objects become JSON text.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use serde_json::Value as JsonValue;

/// Render a parameter as a SQL literal.
///
/// The result is independent of `standard_conforming_strings`: text with a
/// backslash is written as an escape string (`E'...'`). Text containing a
/// NUL byte fails with `InvalidInput` since PostgreSQL cannot store it.
pub(crate) fn sql_literal(param: &QueryParam) -> DbResult<String> {
    match param {
        QueryParam::Null => Ok("NULL".to_string()),
        QueryParam::Bool(b) => Ok(b.to_string()),
        QueryParam::Int(i) => Ok(signed(i.to_string())),
        QueryParam::Float(f) => Ok(float_literal(*f)),
        QueryParam::String(s) => quote_text(s),
        QueryParam::Json(v) => json_literal(v),
    }
}

/// Negative numbers get a leading space so `5-%(x)s` never becomes a `--` comment.
fn signed(text: String) -> String {
    if text.starts_with('-') {
        format!(" {text}")
    } else {
        text
    }
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        "'NaN'::float8".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "'Infinity'::float8".to_string()
        } else {
            "'-Infinity'::float8".to_string()
        }
    } else {
        // Debug keeps a decimal point or exponent, so the value stays numeric
        signed(format!("{f:?}"))
    }
}

pub(crate) fn quote_text(s: &str) -> DbResult<String> {
    if s.contains('\0') {
        return Err(DbError::invalid_input(
            "String parameters cannot contain NUL (0x00) characters",
        ));
    }
    let quoted = s.replace('\'', "''");
    if quoted.contains('\\') {
        Ok(format!("E'{}'", quoted.replace('\\', "\\\\")))
    } else {
        Ok(format!("'{quoted}'"))
    }
}

fn json_literal(value: &JsonValue) -> DbResult<String> {
    match value {
        JsonValue::Array(items) if items.is_empty() => Ok("'{}'".to_string()),
        JsonValue::Array(items) => {
            let elements = items
                .iter()
                .map(|item| sql_literal(&QueryParam::from(item.clone())))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(format!("ARRAY[{}]", elements.join(",")))
        }
        other => quote_text(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn literal(param: QueryParam) -> String {
        sql_literal(&param).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(literal(QueryParam::Null), "NULL");
        assert_eq!(literal(QueryParam::Bool(true)), "true");
        assert_eq!(literal(QueryParam::Int(42)), "42");
        assert_eq!(literal(QueryParam::Int(-3)), " -3");
        assert_eq!(literal(QueryParam::Float(1.5)), "1.5");
        assert_eq!(literal(QueryParam::Float(-0.25)), " -0.25");
        assert_eq!(literal(QueryParam::Float(f64::NAN)), "'NaN'::float8");
        assert_eq!(
            literal(QueryParam::Float(f64::NEG_INFINITY)),
            "'-Infinity'::float8"
        );
    }

    #[test]
    fn test_strings_are_untyped_literals() {
        assert_eq!(literal(QueryParam::String("1".into())), "'1'");
        assert_eq!(literal(QueryParam::String("".into())), "''");
        assert_eq!(
            literal(QueryParam::String("it's".into())),
            "'it''s'"
        );
    }

    #[test]
    fn test_backslash_uses_escape_string() {
        assert_eq!(
            literal(QueryParam::String(r"C:\temp\'x".into())),
            r"E'C:\\temp\\''x'"
        );
    }

    #[test]
    fn test_nul_rejected() {
        let err = sql_literal(&QueryParam::String("a\0b".into())).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_lists_and_objects() {
        assert_eq!(
            literal(QueryParam::Json(json!([1, "b", null]))),
            "ARRAY[1,'b',NULL]"
        );
        assert_eq!(literal(QueryParam::Json(json!([]))), "'{}'");
        assert_eq!(
            literal(QueryParam::Json(json!({"k": "it's"}))),
            r#"'{"k":"it''s"}'"#
        );
    }
}
