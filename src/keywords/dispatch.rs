//! Runner-facing keyword calls.
//!
//! A call names a keyword and carries positional and named arguments as
//! JSON. The result always comes back as a value: failures are reported as
//! `FAIL` with the error's message and kind rather than as a transport error.

use crate::error::{DbError, DbResult};
use crate::keywords::args::{BoundArgs, value_to_string};
use crate::keywords::catalog::{self, KeywordId, KeywordSpec};
use crate::keywords::library::PostgresKeywords;
use crate::models::{ConnectionConfig, QueryParam, SqlParams};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCall {
    pub keyword: String,
    #[serde(default)]
    pub args: Vec<JsonValue>,
    #[serde(default)]
    pub kwargs: Map<String, JsonValue>,
}

impl KeywordCall {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<JsonValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeywordStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordResult {
    pub status: KeywordStatus,
    #[serde(rename = "return")]
    pub return_value: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl KeywordResult {
    pub fn pass(return_value: JsonValue) -> Self {
        Self {
            status: KeywordStatus::Pass,
            return_value,
            error: None,
            error_type: None,
        }
    }

    pub fn fail(err: &DbError) -> Self {
        Self {
            status: KeywordStatus::Fail,
            return_value: JsonValue::Null,
            error: Some(err.to_string()),
            error_type: Some(err.kind().to_string()),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == KeywordStatus::Pass
    }
}

/// Description of one keyword for runners that introspect the library.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordDescription {
    pub name: &'static str,
    pub args: Vec<String>,
    pub doc: &'static str,
}

impl From<&KeywordSpec> for KeywordDescription {
    fn from(spec: &KeywordSpec) -> Self {
        Self {
            name: spec.name,
            args: spec.signature(),
            doc: spec.doc,
        }
    }
}

impl PostgresKeywords {
    pub fn keyword_names(&self) -> Vec<&'static str> {
        catalog::names()
    }

    pub fn keyword_description(&self, name: &str) -> DbResult<KeywordDescription> {
        catalog::find(name)
            .map(KeywordDescription::from)
            .ok_or_else(|| DbError::unknown_keyword(name))
    }

    /// Run one keyword call. Never fails; errors become `FAIL` results.
    pub async fn run_keyword(&self, call: KeywordCall) -> KeywordResult {
        let start = Instant::now();
        let keyword = call.keyword.clone();
        let result = self.dispatch(call).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(value) => {
                debug!(keyword = %keyword, elapsed_ms, "Keyword passed");
                KeywordResult::pass(value)
            }
            Err(e) => {
                info!(keyword = %keyword, error = %e, kind = e.kind(), elapsed_ms, "Keyword failed");
                KeywordResult::fail(&e)
            }
        }
    }

    async fn dispatch(&self, call: KeywordCall) -> DbResult<JsonValue> {
        let spec =
            catalog::find(&call.keyword).ok_or_else(|| DbError::unknown_keyword(&call.keyword))?;
        let mut args = BoundArgs::bind(spec, call.args, call.kwargs)?;

        match spec.id {
            KeywordId::ConnectToPostgresql => {
                let mut config = ConnectionConfig::new(
                    args.required_str("dbname")?,
                    args.required_str("dbusername")?,
                    args.required_str("dbpassword")?,
                );
                if let Some(host) = args.optional_str("dbhost")? {
                    config.host = host;
                }
                if let Some(port) = args.optional_port("dbport")? {
                    config.port = port;
                }
                config.alias = args.optional_str("alias")?;
                config.autocommit = args
                    .optional_bool("autocommit")?
                    .unwrap_or(self.settings().default_autocommit);
                for (key, value) in std::mem::take(&mut args.extra) {
                    config.options.insert(key, value_to_string(&value));
                }
                Ok(JsonValue::from(self.connect(config).await?))
            }
            KeywordId::ConnectToPostgresqlUsingUrl => {
                let index = self
                    .connect_url(
                        &args.required_str("url")?,
                        args.optional_str("alias")?,
                        args.optional_bool("autocommit")?,
                    )
                    .await?;
                Ok(JsonValue::from(index))
            }
            KeywordId::DisconnectFromPostgresql => {
                self.disconnect(args.optional_str("alias")?.as_deref())
                    .await?;
                Ok(JsonValue::Null)
            }
            KeywordId::CloseAllPostgresqlConnections => {
                self.close_all().await?;
                Ok(JsonValue::Null)
            }
            KeywordId::SwitchPostgresqlConnection => {
                let previous = self.switch(&args.required_str("index_or_alias")?).await?;
                Ok(previous.map_or(JsonValue::Null, JsonValue::from))
            }
            KeywordId::GetPostgresqlConnections => {
                serde_json::to_value(self.connections().await)
                    .map_err(|e| DbError::internal(e.to_string()))
            }
            KeywordId::ExecuteSqlString => {
                let (target, params) = sql_params(&mut args);
                let sql = args.required_str("plpgsqlstatement")?;
                let outcome = self
                    .execute_sql_string(&sql, &params, target.as_deref())
                    .await?;
                Ok(outcome.into_return_value())
            }
            KeywordId::ExecuteSqlStringMapped => {
                let (target, params) = sql_params(&mut args);
                let sql = args.required_str("plpgsqlstatement")?;
                let rows = self
                    .execute_sql_string_mapped(&sql, &params, target.as_deref())
                    .await?;
                Ok(JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect()))
            }
            KeywordId::ExecutePlpgsqlBlock => {
                let (target, params) = sql_params(&mut args);
                let sql = args.required_str("plpgsqlstatement")?;
                self.execute_plpgsql_block(&sql, &params, target.as_deref())
                    .await?;
                Ok(JsonValue::Null)
            }
            KeywordId::ExecutePlpgsqlScript => {
                let (target, params) = sql_params(&mut args);
                let path = args.required_str("file_path")?;
                self.execute_plpgsql_script(&path, &params, target.as_deref())
                    .await?;
                Ok(JsonValue::Null)
            }
            KeywordId::CommitPostgresqlTransaction => {
                self.commit(args.optional_str("alias")?.as_deref()).await?;
                Ok(JsonValue::Null)
            }
            KeywordId::RollbackPostgresqlTransaction => {
                self.rollback(args.optional_str("alias")?.as_deref())
                    .await?;
                Ok(JsonValue::Null)
            }
            KeywordId::SetPostgresqlAutocommit => {
                let previous = self
                    .set_autocommit(
                        args.required_bool("autocommit")?,
                        args.optional_str("alias")?.as_deref(),
                    )
                    .await?;
                Ok(JsonValue::Bool(previous))
            }
        }
    }
}

/// Split an execution keyword's named arguments into the target connection
/// and the SQL parameters.
fn sql_params(args: &mut BoundArgs) -> (Option<String>, SqlParams) {
    let target = args.take_alias_from_extra();
    let params = std::mem::take(&mut args.extra)
        .into_iter()
        .map(|(name, value)| (name, QueryParam::from(value)))
        .collect();
    (target, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_keyword_fails() {
        let lib = PostgresKeywords::default();
        let result = lib.run_keyword(KeywordCall::new("Drop All Tables")).await;
        assert_eq!(result.status, KeywordStatus::Fail);
        assert_eq!(result.error_type.as_deref(), Some("UnknownKeyword"));
    }

    #[tokio::test]
    async fn test_execute_without_connection_fails() {
        let lib = PostgresKeywords::default();
        let result = lib
            .run_keyword(KeywordCall::new("execute_sql_string").arg("SELECT 1"))
            .await;
        assert!(!result.is_pass());
        assert_eq!(result.error_type.as_deref(), Some("NoActiveConnection"));
        assert_eq!(
            result.error.as_deref(),
            Some("There is no open connection to PostgreSQL database")
        );
    }

    #[tokio::test]
    async fn test_close_all_passes_with_no_connections() {
        let lib = PostgresKeywords::default();
        let result = lib
            .run_keyword(KeywordCall::new("Close All Postgresql Connections"))
            .await;
        assert!(result.is_pass());
        assert_eq!(result.return_value, JsonValue::Null);
    }

    #[tokio::test]
    async fn test_get_connections_empty_list() {
        let lib = PostgresKeywords::default();
        let result = lib
            .run_keyword(KeywordCall::new("Get Postgresql Connections"))
            .await;
        assert!(result.is_pass());
        assert_eq!(result.return_value, json!([]));
    }

    #[tokio::test]
    async fn test_argument_errors_are_invalid_input() {
        let lib = PostgresKeywords::default();
        let result = lib
            .run_keyword(KeywordCall::new("Connect To Postgresql").arg("app"))
            .await;
        assert_eq!(result.error_type.as_deref(), Some("InvalidInput"));
    }

    #[test]
    fn test_sql_params_reserve_alias() {
        let spec = catalog::find("Execute Sql String").unwrap();
        let mut kwargs = Map::new();
        kwargs.insert("alias".into(), json!("other"));
        kwargs.insert("id".into(), json!(5));
        kwargs.insert("name".into(), json!("x"));
        let mut args = BoundArgs::bind(spec, vec![json!("SELECT 1")], kwargs).unwrap();
        let (target, params) = sql_params(&mut args);
        assert_eq!(target.as_deref(), Some("other"));
        assert_eq!(params.len(), 2);
        assert_eq!(params["id"], QueryParam::Int(5));
        assert_eq!(params["name"], QueryParam::String("x".into()));
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(KeywordResult::pass(json!(3))).unwrap();
        assert_eq!(json, json!({"status": "PASS", "return": 3}));

        let err = DbError::connection_not_found("nope");
        let json = serde_json::to_value(KeywordResult::fail(&err)).unwrap();
        assert_eq!(json["status"], "FAIL");
        assert_eq!(json["error_type"], "ConnectionNotFound");
        assert_eq!(json["return"], JsonValue::Null);
    }

    #[test]
    fn test_call_deserialization_defaults() {
        let call: KeywordCall =
            serde_json::from_value(json!({"keyword": "Close All Postgresql Connections"}))
                .unwrap();
        assert!(call.args.is_empty());
        assert!(call.kwargs.is_empty());
    }

    #[test]
    fn test_keyword_description() {
        let lib = PostgresKeywords::default();
        let description = lib.keyword_description("switch postgresql connection").unwrap();
        assert_eq!(description.name, "Switch Postgresql Connection");
        assert_eq!(description.args, vec!["index_or_alias"]);
        assert!(matches!(
            lib.keyword_description("nope"),
            Err(DbError::UnknownKeyword { .. })
        ));
    }
}
