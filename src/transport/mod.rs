//! Transport layer for the keyword library.
//!
//! This module provides the ways a test runner reaches the library:
//! - Stdio: newline-delimited JSON requests and responses
//! - HTTP: JSON endpoints for remote runners

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::error::DbResult;
use crate::keywords::{KeywordCall, KeywordResult, PostgresKeywords};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use tokio::signal;
use tracing::{info, warn};

/// Trait for keyword transport implementations.
///
/// Transports carry runner requests to [`PostgresKeywords`] and results back.
pub trait Transport: Send + Sync {
    /// Start the transport and begin handling requests.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}

/// One runner request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    GetKeywordNames,
    GetKeywordDocumentation { name: String },
    RunKeyword(KeywordCall),
}

impl Request {
    /// Handle a request. Introspection failures are reported like keyword failures.
    pub async fn handle(self, library: &PostgresKeywords) -> KeywordResult {
        match self {
            Self::GetKeywordNames => KeywordResult::pass(JsonValue::from(library.keyword_names())),
            Self::GetKeywordDocumentation { name } => match library.keyword_description(&name) {
                Ok(description) => match serde_json::to_value(description) {
                    Ok(value) => KeywordResult::pass(value),
                    Err(e) => KeywordResult::fail(&crate::error::DbError::internal(e.to_string())),
                },
                Err(e) => KeywordResult::fail(&e),
            },
            Self::RunKeyword(call) => library.run_keyword(call).await,
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// A handler that cannot be installed is logged and never fires.
pub(crate) async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let req: Request = serde_json::from_value(json!({"method": "get_keyword_names"})).unwrap();
        assert!(matches!(req, Request::GetKeywordNames));

        let req: Request = serde_json::from_value(json!({
            "method": "run_keyword",
            "keyword": "Execute Sql String",
            "args": ["SELECT 1"],
            "kwargs": {"alias": "main"}
        }))
        .unwrap();
        match req {
            Request::RunKeyword(call) => {
                assert_eq!(call.keyword, "Execute Sql String");
                assert_eq!(call.args, vec![json!("SELECT 1")]);
                assert_eq!(call.kwargs["alias"], json!("main"));
            }
            other => panic!("unexpected request: {other:?}"),
        }

        assert!(serde_json::from_value::<Request>(json!({"method": "shutdown"})).is_err());
    }

    #[tokio::test]
    async fn test_handle_introspection() {
        let library = PostgresKeywords::default();

        let result = Request::GetKeywordNames.handle(&library).await;
        assert!(result.is_pass());
        assert_eq!(result.return_value.as_array().map(Vec::len), Some(13));

        let result = Request::GetKeywordDocumentation {
            name: "Execute_Sql_String".into(),
        }
        .handle(&library)
        .await;
        assert!(result.is_pass());
        assert_eq!(result.return_value["name"], "Execute Sql String");

        let result = Request::GetKeywordDocumentation {
            name: "Nope".into(),
        }
        .handle(&library)
        .await;
        assert_eq!(result.error_type.as_deref(), Some("UnknownKeyword"));
    }
}
