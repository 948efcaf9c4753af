//! Typed keyword implementations.
//!
//! [`PostgresKeywords`] owns the connection registry. Each public method is
//! one keyword; [`crate::keywords::dispatch`] maps runner calls onto them.

use crate::db::placeholders::interpolate;
use crate::db::{ConnectionRegistry, PgSession};
use crate::error::{DbError, DbResult};
use crate::keywords::format::format_outcome;
use crate::models::{
    ConnectionConfig, ConnectionInfo, DEFAULT_RESULT_LOG_ROWS, SqlParams, StatementOutcome,
};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Library-wide defaults.
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    /// Autocommit for connections whose keyword call does not set it.
    pub default_autocommit: bool,
    /// Rows of each result written to the log.
    pub result_log_rows: usize,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            default_autocommit: false,
            result_log_rows: DEFAULT_RESULT_LOG_ROWS,
        }
    }
}

pub struct PostgresKeywords {
    registry: Mutex<ConnectionRegistry<PgSession>>,
    settings: LibrarySettings,
}

impl PostgresKeywords {
    pub fn new(settings: LibrarySettings) -> Self {
        Self {
            registry: Mutex::new(ConnectionRegistry::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Open a connection, register it and make it current. Returns its index.
    pub async fn connect(&self, config: ConnectionConfig) -> DbResult<usize> {
        let alias = config.alias.clone();

        // Early check so a taken alias fails before any network work
        self.registry
            .lock()
            .await
            .ensure_alias_free(alias.as_deref())?;

        info!(
            alias = ?alias,
            connection = %config.masked_description(),
            autocommit = config.autocommit,
            "Connecting to PostgreSQL"
        );

        let session = PgSession::open(&config).await?;
        let server_version = session.server_version().map(str::to_string);

        // Re-check under the lock; another caller may have taken the alias
        let registered = {
            let mut registry = self.registry.lock().await;
            match registry.ensure_alias_free(alias.as_deref()) {
                Ok(()) => Ok(registry.register(session, alias.as_deref())?),
                Err(e) => Err((e, session)),
            }
        };

        match registered {
            Ok(index) => {
                info!(
                    index,
                    alias = ?alias,
                    server_version = ?server_version,
                    "Connected successfully"
                );
                Ok(index)
            }
            Err((e, session)) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to close duplicate connection");
                }
                Err(e)
            }
        }
    }

    /// Open a connection from a `postgres://` URL.
    pub async fn connect_url(
        &self,
        url: &str,
        alias: Option<String>,
        autocommit: Option<bool>,
    ) -> DbResult<usize> {
        let mut config = ConnectionConfig::from_url(url)?;
        config.alias = alias;
        config.autocommit = autocommit.unwrap_or(self.settings.default_autocommit);
        self.connect(config).await
    }

    /// Close one connection: the one named by `target`, or the current one.
    pub async fn disconnect(&self, target: Option<&str>) -> DbResult<()> {
        let (index, session) = self.registry.lock().await.remove(target)?;
        info!(index, target = ?target, "Disconnecting from PostgreSQL");
        session.close().await
    }

    /// Close every connection and restart index numbering.
    ///
    /// Every connection is closed even if some fail; the first failure is
    /// returned.
    pub async fn close_all(&self) -> DbResult<()> {
        let drained = self.registry.lock().await.drain();
        let mut first_error = None;
        for (index, session) in drained {
            info!(index, "Closing connection");
            if let Err(e) = session.close().await {
                warn!(index, error = %e, "Failed to close connection");
                first_error.get_or_insert(e);
            }
        }
        info!("All connections closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Make another connection current. Returns the previous index.
    pub async fn switch(&self, index_or_alias: &str) -> DbResult<Option<usize>> {
        let mut registry = self.registry.lock().await;
        let previous = registry.switch(index_or_alias)?;
        info!(
            target = %index_or_alias,
            previous = ?previous,
            current = ?registry.current_index(),
            "Switched connection"
        );
        Ok(previous)
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.registry
            .lock()
            .await
            .iter()
            .map(|e| e.conn.info(e.index, e.alias, e.current))
            .collect()
    }

    // =========================================================================
    // SQL execution
    // =========================================================================

    /// Execute SQL on the target connection.
    ///
    /// A failed statement rolls back the open transaction, discarding any
    /// uncommitted work on that connection.
    pub async fn execute_sql_string(
        &self,
        sql: &str,
        params: &SqlParams,
        target: Option<&str>,
    ) -> DbResult<StatementOutcome> {
        let mut registry = self.registry.lock().await;
        let index = registry.resolve(target)?;
        let session = registry.get_mut(target)?;

        let statement = interpolate(sql, params)?;

        info!(connection = index, sql = %statement, "Executing SQL");
        let outcome = session.execute(&statement).await?;
        info!(
            connection = index,
            "Result:\n{}",
            format_outcome(&outcome, self.settings.result_log_rows)
        );
        Ok(outcome)
    }

    /// Execute SQL and return rows keyed by column name.
    pub async fn execute_sql_string_mapped(
        &self,
        sql: &str,
        params: &SqlParams,
        target: Option<&str>,
    ) -> DbResult<Vec<Map<String, JsonValue>>> {
        Ok(self
            .execute_sql_string(sql, params, target)
            .await?
            .into_mapped_rows())
    }

    /// Execute SQL and commit; roll back and fail if execution fails.
    pub async fn execute_plpgsql_block(
        &self,
        sql: &str,
        params: &SqlParams,
        target: Option<&str>,
    ) -> DbResult<()> {
        let mut registry = self.registry.lock().await;
        let index = registry.resolve(target)?;
        let session = registry.get_mut(target)?;

        let statement = interpolate(sql, params)?;

        info!(connection = index, sql = %statement, "Executing PL/pgSQL block");
        session.execute_and_commit(&statement).await
    }

    /// Read a SQL file and execute it as a block.
    ///
    /// An unreadable file fails before any SQL is sent.
    pub async fn execute_plpgsql_script(
        &self,
        path: impl AsRef<Path>,
        params: &SqlParams,
        target: Option<&str>,
    ) -> DbResult<()> {
        let path = path.as_ref();
        let sql = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DbError::io(path.display().to_string(), &e))?;
        info!(path = %path.display(), bytes = sql.len(), "Loaded SQL script");
        self.execute_plpgsql_block(&sql, params, target).await
    }

    pub async fn commit(&self, target: Option<&str>) -> DbResult<()> {
        let mut registry = self.registry.lock().await;
        let committed = registry.get_mut(target)?.commit().await?;
        info!(target = ?target, committed, "Commit");
        Ok(())
    }

    pub async fn rollback(&self, target: Option<&str>) -> DbResult<()> {
        let mut registry = self.registry.lock().await;
        let rolled_back = registry.get_mut(target)?.rollback().await?;
        info!(target = ?target, rolled_back, "Rollback");
        Ok(())
    }

    /// Change autocommit mode. Returns the previous value.
    pub async fn set_autocommit(&self, autocommit: bool, target: Option<&str>) -> DbResult<bool> {
        let mut registry = self.registry.lock().await;
        let previous = registry.get_mut(target)?.set_autocommit(autocommit)?;
        info!(target = ?target, autocommit, previous, "Autocommit changed");
        Ok(previous)
    }
}

impl Default for PostgresKeywords {
    fn default() -> Self {
        Self::new(LibrarySettings::default())
    }
}
