//! `%(name)s` placeholder handling.
//!
//! Statements are written with named placeholders (`%(name)s`) and `%%` for
//! a literal percent sign. When parameters are given, every placeholder is
//! replaced by the parameter's SQL literal and the result is sent as plain
//! text, so the server types each value from its context the way it types a
//! literal written by hand.
//!
//! A small state machine skips quoted strings, quoted identifiers and
//! comments, so `'%(x)s'` inside a literal is left alone. Dollar-quoted
//! bodies (`DO $$ ... $$`, function bodies) are substituted.

use crate::db::params::sql_literal;
use crate::error::{DbError, DbResult};
use crate::models::SqlParams;
use std::borrow::Cow;

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Replace `%(name)s` placeholders with parameter literals.
///
/// Without parameters the statement is returned untouched, `%%` included.
/// A name missing from `params` fails with `InvalidInput`; extra params are
/// ignored.
pub fn interpolate<'a>(sql: &'a str, params: &SqlParams) -> DbResult<Cow<'a, str>> {
    if params.is_empty() {
        return Ok(Cow::Borrowed(sql));
    }

    let mut used: Vec<&str> = Vec::new();
    let rendered = rewrite(sql, |name, dollar_tag| {
        let param = params.get(name).ok_or_else(|| {
            DbError::invalid_input(format!(
                "Parameter '{name}' is referenced in the statement but was not supplied"
            ))
        })?;
        let literal = sql_literal(param)?;
        if let Some(tag) = dollar_tag {
            if literal.contains(&format!("${tag}$")) {
                return Err(DbError::invalid_input(format!(
                    "Parameter '{name}' contains the closing quote ${tag}$ of the body it is placed in"
                )));
            }
        }
        if let Some((key, _)) = params.get_key_value(name) {
            if !used.contains(&key.as_str()) {
                used.push(key.as_str());
            }
        }
        Ok(literal)
    })?;

    for key in params.keys() {
        if !used.contains(&key.as_str()) {
            tracing::debug!(param = %key, "Supplied parameter not referenced by statement");
        }
    }

    Ok(rendered)
}

/// Core scanner. Calls `on_placeholder` for every `%(name)s` in plain SQL
/// or a dollar-quoted body (with that body's tag), and collapses `%%` to
/// `%` everywhere. Returns a borrowed `Cow` when nothing changed.
fn rewrite<'a>(
    sql: &'a str,
    mut on_placeholder: impl FnMut(&str, Option<&str>) -> DbResult<String>,
) -> DbResult<Cow<'a, str>> {
    let mut out: Option<String> = None;
    let mut state = State::Normal;
    let mut idx = 0;
    let bytes = sql.as_bytes();
    // Start of the not-yet-copied input.
    let mut copied = 0;

    while idx < bytes.len() {
        let b = bytes[idx];

        if b == b'%' && bytes.get(idx + 1) == Some(&b'%') {
            let buf = out.get_or_insert_with(String::new);
            buf.push_str(&sql[copied..idx]);
            buf.push('%');
            idx += 2;
            copied = idx;
            continue;
        }

        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b'%' => {
                    if let Some((name, end)) = scan_named_placeholder(sql, idx) {
                        let replacement = on_placeholder(name, None)?;
                        let buf = out.get_or_insert_with(String::new);
                        buf.push_str(&sql[copied..idx]);
                        buf.push_str(&replacement);
                        copied = end;
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                } else if b == b'%' {
                    if let Some((name, end)) = scan_named_placeholder(sql, idx) {
                        let replacement = on_placeholder(name, Some(tag))?;
                        let buf = out.get_or_insert_with(String::new);
                        buf.push_str(&sql[copied..idx]);
                        buf.push_str(&replacement);
                        copied = end;
                        idx = end - 1;
                    }
                }
            }
        }
        idx += 1;
    }

    Ok(match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied.min(sql.len())..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    })
}

/// Match `%(name)s` at `start`; returns the name and the index just past `s`.
fn scan_named_placeholder(sql: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = sql.as_bytes();
    if bytes.get(start + 1) != Some(&b'(') {
        return None;
    }
    let name_start = start + 2;
    let close = name_start + sql[name_start..].find(')')?;
    if close == name_start || bytes.get(close + 1) != Some(&b's') {
        return None;
    }
    let name = &sql[name_start..close];
    if name.contains(['(', '\n']) {
        return None;
    }
    Some((name, close + 2))
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Recognize `$tag$` (or `$$`) at `start`. Returns the tag and the index of
/// the closing `$`.
fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        // $1 is a positional parameter, not a tag
        if !(b.is_ascii_alphabetic() || b == b'_' || (idx > start + 1 && b.is_ascii_digit())) {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len() && bytes[idx + 1..end] == *tag.as_bytes() && bytes[end] == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryParam;

    fn params(pairs: &[(&str, QueryParam)]) -> SqlParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_placeholders_become_literals() {
        let p = params(&[
            ("id", QueryParam::String("1".into())),
            ("name", QueryParam::String("O'Brien".into())),
            ("limit", QueryParam::Int(5)),
        ]);
        let out = interpolate(
            "SELECT * FROM t WHERE id = %(id)s AND name = %(name)s LIMIT %(limit)s",
            &p,
        )
        .unwrap();
        assert_eq!(
            out,
            "SELECT * FROM t WHERE id = '1' AND name = 'O''Brien' LIMIT 5"
        );
    }

    #[test]
    fn test_repeated_name_repeats_literal() {
        let p = params(&[("v", QueryParam::Int(5))]);
        let out = interpolate("SELECT %(v)s, %(v)s + 1", &p).unwrap();
        assert_eq!(out, "SELECT 5, 5 + 1");
    }

    #[test]
    fn test_unknown_name_is_invalid_input() {
        let p = params(&[("a", QueryParam::Int(1))]);
        let err = interpolate("SELECT %(b)s", &p).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_double_percent_is_literal() {
        let p = params(&[("pat", QueryParam::String("a".into()))]);
        let out = interpolate("SELECT 10 %% 3, name LIKE %(pat)s || '%%'", &p).unwrap();
        assert_eq!(out, "SELECT 10 % 3, name LIKE 'a' || '%'");
    }

    #[test]
    fn test_no_params_leaves_statement_untouched() {
        let out = interpolate("SELECT 10 %% 3, '%(x)s'", &SqlParams::new()).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, "SELECT 10 %% 3, '%(x)s'");
    }

    #[test]
    fn test_quoted_text_and_comments_skipped() {
        let p = params(&[("x", QueryParam::Int(1))]);
        let sql = "SELECT '%(x)s', \"%(x)s\" -- %(x)s\n, %(x)s /* %(x)s /* nested */ %(x)s */";
        let out = interpolate(sql, &p).unwrap();
        assert_eq!(
            out,
            "SELECT '%(x)s', \"%(x)s\" -- %(x)s\n, 1 /* %(x)s /* nested */ %(x)s */"
        );
    }

    #[test]
    fn test_dollar_quoted_body_substituted() {
        let p = params(&[
            ("flag", QueryParam::Bool(true)),
            ("name", QueryParam::String("it's".into())),
        ]);
        let sql = "DO $$ BEGIN IF %(flag)s THEN INSERT INTO t VALUES (%(name)s); END IF; END $$";
        let out = interpolate(sql, &p).unwrap();
        assert_eq!(
            out,
            "DO $$ BEGIN IF true THEN INSERT INTO t VALUES ('it''s'); END IF; END $$"
        );

        let out = interpolate("SELECT $fn$ 'a' || %(name)s $fn$, %(flag)s", &p).unwrap();
        assert_eq!(out, "SELECT $fn$ 'a' || 'it''s' $fn$, true");
    }

    #[test]
    fn test_value_closing_dollar_quote_rejected() {
        let p = params(&[("v", QueryParam::String("x $$; DROP TABLE t; --".into()))]);
        let err = interpolate("DO $$ BEGIN PERFORM %(v)s; END $$", &p).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));

        // Outside a body the same value is just a string literal
        let out = interpolate("SELECT %(v)s", &p).unwrap();
        assert_eq!(out, "SELECT 'x $$; DROP TABLE t; --'");
    }

    #[test]
    fn test_multiple_statements() {
        let p = params(&[("a", QueryParam::Int(1)), ("b", QueryParam::Int(2))]);
        let out = interpolate(
            "CREATE TEMP TABLE t (id int); INSERT INTO t VALUES (%(a)s), (%(b)s);",
            &p,
        )
        .unwrap();
        assert_eq!(
            out,
            "CREATE TEMP TABLE t (id int); INSERT INTO t VALUES (1), (2);"
        );
    }

    #[test]
    fn test_dollar_digit_is_not_a_quote_tag() {
        let p = params(&[("x", QueryParam::Int(1))]);
        let out = interpolate("SELECT $1::int, %(x)s", &p).unwrap();
        assert_eq!(out, "SELECT $1::int, 1");
    }

    #[test]
    fn test_incomplete_placeholder_left_alone() {
        let p = params(&[("x", QueryParam::Int(1))]);
        let out = interpolate("SELECT 5 % 2, %(x", &p).unwrap();
        assert_eq!(out, "SELECT 5 % 2, %(x");
    }
}
