//! Statement shape detection.
//!
//! The driver reports `SELECT 0` and `UPDATE 0` the same way (a completed
//! command with zero rows), so when a statement produces no rows we inspect
//! the SQL to decide whether the caller should get an empty row set or an
//! affected-row count.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the PostgreSQL dialect.
//! Statements the parser does not understand (PL/pgSQL `DO` blocks, some
//! utility commands) fall back to a token scan.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Whether the last statement in `sql` returns rows.
pub fn returns_rows(sql: &str) -> bool {
    let dialect = PostgreSqlDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => match statements.last() {
            Some(stmt) => {
                is_row_returning(stmt) || has_returning_clause(&dialect, &stmt.to_string())
            }
            None => false,
        },
        Err(e) => {
            tracing::trace!(error = %e, "Statement not parseable, falling back to token scan");
            token_scan(&dialect, sql)
        }
    }
}

/// Whether `sql` may change the session's transaction status itself
/// (`BEGIN`, `START TRANSACTION`, `COMMIT`, `END`, `ROLLBACK`, `ABORT`).
///
/// A keyword anywhere outside quotes counts, so `CASE ... END` also
/// matches. SQL that does not tokenize is assumed to.
pub fn controls_transaction(sql: &str) -> bool {
    let dialect = PostgreSqlDialect {};
    match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => keyword_tokens(&tokens).any(|k| {
            matches!(
                k,
                Keyword::BEGIN
                    | Keyword::START
                    | Keyword::COMMIT
                    | Keyword::END
                    | Keyword::ROLLBACK
                    | Keyword::ABORT
            )
        }),
        Err(_) => true,
    }
}

fn is_row_returning(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::Query(_)
            | Statement::Explain { .. }
            | Statement::ExplainTable { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowVariables { .. }
            | Statement::Fetch { .. }
    )
}

/// Leading keyword check for SQL the parser rejects.
///
/// Only the last `;`-separated statement is considered. Dollar-quoted
/// bodies tokenize as single string tokens, so their contents never count.
fn token_scan(dialect: &PostgreSqlDialect, sql: &str) -> bool {
    let tokens = Tokenizer::new(dialect, sql).tokenize().unwrap_or_default();
    let last = tokens
        .split(|t| matches!(t, Token::SemiColon))
        .filter(|segment| segment.iter().any(|t| !matches!(t, Token::Whitespace(_))))
        .last()
        .unwrap_or(&[]);

    let mut words = keyword_tokens(last).peekable();
    let leading = match words.peek() {
        Some(k) => *k,
        None => return false,
    };
    if matches!(
        leading,
        Keyword::SELECT
            | Keyword::WITH
            | Keyword::VALUES
            | Keyword::SHOW
            | Keyword::EXPLAIN
            | Keyword::TABLE
            | Keyword::FETCH
    ) {
        return true;
    }
    words.any(|k| k == Keyword::RETURNING)
}

fn has_returning_clause(dialect: &PostgreSqlDialect, sql: &str) -> bool {
    let tokens = Tokenizer::new(dialect, sql).tokenize().unwrap_or_default();
    keyword_tokens(&tokens).any(|k| k == Keyword::RETURNING)
}

fn keyword_tokens(tokens: &[Token]) -> impl Iterator<Item = Keyword> + '_ {
    tokens.iter().filter_map(|token| match token {
        Token::Word(w) if w.quote_style.is_none() && w.keyword != Keyword::NoKeyword => {
            Some(w.keyword)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_like_statements_return_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("select * from person where id = 0"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("VALUES (1), (2)"));
        assert!(returns_rows("EXPLAIN SELECT 1"));
        assert!(returns_rows("SHOW search_path"));
    }

    #[test]
    fn test_dml_without_returning_is_a_count() {
        assert!(!returns_rows("INSERT INTO person (name) VALUES ('a')"));
        assert!(!returns_rows("UPDATE person SET name = 'b' WHERE id = 3"));
        assert!(!returns_rows("DELETE FROM person WHERE id = 3"));
    }

    #[test]
    fn test_dml_with_returning_returns_rows() {
        assert!(returns_rows("INSERT INTO person (name) VALUES ('a') RETURNING id"));
        assert!(returns_rows("UPDATE person SET name = 'b' RETURNING *"));
        assert!(returns_rows("DELETE FROM person WHERE id = $1 RETURNING id, name"));
    }

    #[test]
    fn test_ddl_is_a_count() {
        assert!(!returns_rows("CREATE TABLE person (id serial primary key, name text)"));
        assert!(!returns_rows("DROP TABLE person"));
    }

    #[test]
    fn test_last_statement_decides() {
        assert!(returns_rows("CREATE TEMP TABLE t (id int); SELECT * FROM t;"));
        assert!(!returns_rows("SELECT 1; DELETE FROM t"));
    }

    #[test]
    fn test_do_block_is_a_count() {
        assert!(!returns_rows(
            "DO $$ BEGIN PERFORM 1; RETURN; END $$ LANGUAGE plpgsql"
        ));
    }

    #[test]
    fn test_returning_inside_string_literal_ignored() {
        assert!(!returns_rows("UPDATE person SET note = 'RETURNING soon'"));
    }

    #[test]
    fn test_empty_statement() {
        assert!(!returns_rows(""));
        assert!(!returns_rows("   "));
    }

    #[test]
    fn test_transaction_control_detection() {
        assert!(controls_transaction("INSERT INTO t VALUES (1); COMMIT"));
        assert!(controls_transaction("begin; insert into t values (1)"));
        assert!(controls_transaction("START TRANSACTION ISOLATION LEVEL SERIALIZABLE"));
        assert!(controls_transaction("ROLLBACK"));
        assert!(controls_transaction("abort"));
        assert!(!controls_transaction("SELECT 1"));
        assert!(!controls_transaction("UPDATE t SET c = 'COMMIT'"));
        assert!(!controls_transaction(
            "DO $$ BEGIN INSERT INTO t VALUES (1); END $$"
        ));
    }
}
