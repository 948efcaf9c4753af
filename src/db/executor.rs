//! Statement execution.
//!
//! Statements go through the simple query protocol, so a script may hold
//! several `;`-separated statements and `DO` blocks, and every value comes
//! back in text form. Parameters are already inlined as literals by
//! [`crate::db::placeholders::interpolate`]. The outcome reflects the last
//! statement: its rows if it returned any (or is a row-returning statement
//! that matched nothing), otherwise its affected-row count.

use crate::db::statement::returns_rows;
use crate::db::types::RowToJson;
use crate::error::DbResult;
use crate::models::{ColumnMetadata, StatementOutcome};
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgConnection, PgQueryResult, PgRow};
use sqlx::{Either, Executor};
use std::time::Instant;
use tracing::debug;

type ResultStream<'e> = BoxStream<'e, Result<Either<PgQueryResult, PgRow>, sqlx::Error>>;

/// Run `sql` on `conn`.
pub async fn execute_statement(conn: &mut PgConnection, sql: &str) -> DbResult<StatementOutcome> {
    let start = Instant::now();

    debug!(sql = %sql, "Executing statement");
    let stream = conn.fetch_many(sqlx::raw_sql(sql));
    let outcome = collect_outcome(stream, sql).await?;

    debug!(
        rows = outcome.row_count(),
        returns_rows = outcome.is_rows(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Statement finished"
    );
    Ok(outcome)
}

/// Fold the driver's result stream into the last statement's outcome.
async fn collect_outcome(mut stream: ResultStream<'_>, sql: &str) -> DbResult<StatementOutcome> {
    let mut columns: Vec<ColumnMetadata> = Vec::new();
    let mut rows: Vec<Vec<JsonValue>> = Vec::new();
    let mut last: Option<StatementOutcome> = None;

    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Right(row) => {
                if rows.is_empty() {
                    columns = row.get_column_metadata();
                }
                rows.push(row.to_json_values());
            }
            Either::Left(result) => {
                last = Some(if rows.is_empty() {
                    StatementOutcome::RowsAffected(result.rows_affected())
                } else {
                    StatementOutcome::Rows {
                        columns: std::mem::take(&mut columns),
                        rows: std::mem::take(&mut rows),
                    }
                });
            }
        }
    }

    // Rows with no trailing completion only happen if the stream was cut short.
    if !rows.is_empty() {
        return Ok(StatementOutcome::Rows { columns, rows });
    }

    Ok(match last {
        Some(StatementOutcome::RowsAffected(_)) | None if returns_rows(sql) => {
            StatementOutcome::Rows {
                columns: Vec::new(),
                rows: Vec::new(),
            }
        }
        Some(outcome) => outcome,
        None => StatementOutcome::RowsAffected(0),
    })
}
