//! HTTP transport for the keyword library.
//!
//! Endpoints:
//! - `GET /keywords` lists keyword names
//! - `GET /keywords/{name}` describes one keyword
//! - `POST /run` runs a keyword call and returns its PASS/FAIL result

use crate::error::{DbError, DbResult};
use crate::keywords::{KeywordCall, KeywordDescription, KeywordResult, PostgresKeywords};
use crate::transport::{Transport, wait_for_signal};
use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// HTTP transport implementation.
pub struct HttpTransport {
    library: Arc<PostgresKeywords>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
}

impl HttpTransport {
    pub fn new(library: Arc<PostgresKeywords>, host: impl Into<String>, port: u16) -> Self {
        Self {
            library,
            host: host.into(),
            port,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn router(&self) -> Router {
        router(self.library.clone())
    }
}

pub fn router(library: Arc<PostgresKeywords>) -> Router {
    Router::new()
        .route("/keywords", get(list_keywords))
        .route("/keywords/{name}", get(describe_keyword))
        .route("/run", post(run_keyword))
        .with_state(library)
}

async fn list_keywords(State(library): State<Arc<PostgresKeywords>>) -> Json<Vec<&'static str>> {
    Json(library.keyword_names())
}

async fn describe_keyword(
    State(library): State<Arc<PostgresKeywords>>,
    Path(name): Path<String>,
) -> Result<Json<KeywordDescription>, (StatusCode, Json<KeywordResult>)> {
    library
        .keyword_description(&name)
        .map(Json)
        .map_err(|e| (StatusCode::NOT_FOUND, Json(KeywordResult::fail(&e))))
}

/// Keyword failures are still `200 OK`; the status lives in the body.
async fn run_keyword(
    State(library): State<Arc<PostgresKeywords>>,
    Json(call): Json<KeywordCall>,
) -> Json<KeywordResult> {
    Json(library.run_keyword(call).await)
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting keyword server with HTTP transport on {}", bind_addr);

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(format!(
                "Failed to bind to {bind_addr}: {e}. Check that the port is available"
            ))
        })?;

        // In-flight keywords may hold a database round trip open
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, self.router()).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.library.close_all().await.ok();
                        return Err(DbError::internal(format!("HTTP server error: {e}")));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for requests to finish (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database connections");
        if let Err(e) = self.library.close_all().await {
            warn!(error = %e, "Error while closing connections");
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library() -> Arc<PostgresKeywords> {
        Arc::new(PostgresKeywords::default())
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(library(), "127.0.0.1", 8270);
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "127.0.0.1:8270");
    }

    #[test]
    fn test_router_builds() {
        let transport = HttpTransport::new(library(), "0.0.0.0", 3000);
        let _router = transport.router();
    }

    #[tokio::test]
    async fn test_list_keywords_handler() {
        let Json(names) = list_keywords(State(library())).await;
        assert!(names.contains(&"Execute Plpgsql Script"));
    }

    #[tokio::test]
    async fn test_describe_unknown_keyword_is_not_found() {
        let err = describe_keyword(State(library()), Path("Drop Database".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert_eq!(err.1.error_type.as_deref(), Some("UnknownKeyword"));
    }

    #[tokio::test]
    async fn test_run_keyword_handler() {
        let call: KeywordCall = serde_json::from_value(json!({
            "keyword": "Switch Postgresql Connection",
            "args": ["reporting"]
        }))
        .unwrap();
        let Json(result) = run_keyword(State(library()), Json(call)).await;
        assert!(!result.is_pass());
        assert_eq!(result.error_type.as_deref(), Some("ConnectionNotFound"));
    }
}
