//! One open PostgreSQL connection and its transaction state.
//!
//! With autocommit off, the first statement opens a transaction that stays
//! open until [`PgSession::commit`] or [`PgSession::rollback`]. With
//! autocommit on, every statement commits on its own.

use crate::db::executor::execute_statement;
use crate::db::statement::controls_transaction;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, ConnectionInfo, StatementOutcome};
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor, Row};
use tracing::{debug, info, warn};

pub struct PgSession {
    conn: PgConnection,
    host: String,
    port: u16,
    database: String,
    user: String,
    server_version: Option<String>,
    autocommit: bool,
    in_transaction: bool,
}

impl std::fmt::Debug for PgSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSession")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("autocommit", &self.autocommit)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl PgSession {
    /// Open a connection. Driver errors come back as `DbError::Connection`
    /// with the driver's message.
    pub async fn open(config: &ConnectionConfig) -> DbResult<Self> {
        let options = config.to_connect_options()?;
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| match DbError::from(e) {
                // Authentication and missing-database failures arrive as
                // server errors but are connection failures to the caller.
                DbError::Database { message, .. } => DbError::connection(message),
                other => other,
            })?;

        let server_version = fetch_server_version(&mut conn).await;
        Ok(Self {
            conn,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            user: config.user.clone(),
            server_version,
            autocommit: config.autocommit,
            in_transaction: false,
        })
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Run one statement (or script) inside the session's transaction mode.
    ///
    /// On failure the open transaction is rolled back, so the connection is
    /// usable again and uncommitted work is discarded. SQL that issues its
    /// own `BEGIN`/`COMMIT`/`ROLLBACK` is followed by a check of the
    /// server's transaction status.
    pub async fn execute(&mut self, sql: &str) -> DbResult<StatementOutcome> {
        self.begin_if_needed().await?;
        let controls_transaction = controls_transaction(sql);

        match execute_statement(&mut self.conn, sql).await {
            Ok(outcome) => {
                if controls_transaction {
                    self.sync_transaction_state().await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                if self.in_transaction || controls_transaction {
                    self.rollback_after_error().await;
                }
                Err(e)
            }
        }
    }

    /// Run `sql` and commit. On failure the open transaction is rolled back
    /// and the original error returned.
    pub async fn execute_and_commit(&mut self, sql: &str) -> DbResult<()> {
        self.execute(sql).await?;
        self.commit().await?;
        Ok(())
    }

    /// Commit the open transaction. Returns false when none was open.
    pub async fn commit(&mut self) -> DbResult<bool> {
        if !self.in_transaction {
            debug!("Commit requested with no open transaction");
            return Ok(false);
        }
        self.in_transaction = false;
        (&mut self.conn).execute(sqlx::raw_sql("COMMIT")).await?;
        Ok(true)
    }

    /// Roll back the open transaction. Returns false when none was open.
    pub async fn rollback(&mut self) -> DbResult<bool> {
        if !self.in_transaction {
            debug!("Rollback requested with no open transaction");
            return Ok(false);
        }
        self.in_transaction = false;
        (&mut self.conn).execute(sqlx::raw_sql("ROLLBACK")).await?;
        Ok(true)
    }

    /// Change autocommit mode. Returns the previous value.
    ///
    /// Turning autocommit on while a transaction is open is refused; the
    /// caller must commit or roll back first.
    pub fn set_autocommit(&mut self, autocommit: bool) -> DbResult<bool> {
        if autocommit && self.in_transaction {
            return Err(DbError::invalid_input(
                "Cannot enable autocommit inside an open transaction. Commit or roll back first",
            ));
        }
        Ok(std::mem::replace(&mut self.autocommit, autocommit))
    }

    /// Close the connection, rolling back anything uncommitted.
    pub async fn close(mut self) -> DbResult<()> {
        if self.in_transaction {
            info!(database = %self.database, "Rolling back uncommitted transaction on close");
            if let Err(e) = self.rollback().await {
                warn!(error = %e, "Rollback on close failed");
            }
        }
        self.conn.close().await.map_err(DbError::from)
    }

    pub fn info(&self, index: usize, alias: Option<&str>, current: bool) -> ConnectionInfo {
        ConnectionInfo {
            index,
            alias: alias.map(str::to_string),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            server_version: self.server_version.clone(),
            autocommit: self.autocommit,
            in_transaction: self.in_transaction,
            current,
        }
    }

    /// Take the transaction status from the server.
    ///
    /// Inside a transaction block `now()` is fixed at the block's start, so
    /// it only equals `statement_timestamp()` when no block is open. Sent as
    /// a single simple-protocol message so both timestamps come from it.
    async fn sync_transaction_state(&mut self) -> DbResult<()> {
        let row = (&mut self.conn)
            .fetch_one(sqlx::raw_sql("SELECT now() = statement_timestamp()"))
            .await?;
        let idle: bool = row.try_get(0)?;
        if self.in_transaction == idle {
            debug!(in_transaction = !idle, "Transaction status changed by statement");
        }
        self.in_transaction = !idle;
        Ok(())
    }

    /// Unconditional `ROLLBACK`; harmless when no block is open.
    async fn rollback_after_error(&mut self) {
        self.in_transaction = false;
        if let Err(e) = (&mut self.conn).execute(sqlx::raw_sql("ROLLBACK")).await {
            warn!(error = %e, "Rollback after failed statement also failed");
        }
    }

    async fn begin_if_needed(&mut self) -> DbResult<()> {
        if self.autocommit || self.in_transaction {
            return Ok(());
        }
        (&mut self.conn).execute(sqlx::raw_sql("BEGIN")).await?;
        self.in_transaction = true;
        Ok(())
    }
}

async fn fetch_server_version(conn: &mut PgConnection) -> Option<String> {
    match sqlx::query_scalar::<_, String>("SHOW server_version")
        .fetch_one(conn)
        .await
    {
        Ok(version) => {
            debug!(version = %version, "Got server version");
            Some(version)
        }
        Err(e) => {
            warn!(error = %e, "Failed to get server version");
            None
        }
    }
}
