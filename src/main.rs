//! PostgreSQL keyword server - Main entry point.
//!
//! Serves the PostgreSQL keyword library to a table-driven test runner over
//! stdio or HTTP.

use postgres_keywords::config::{Config, TransportMode};
use postgres_keywords::keywords::PostgresKeywords;
use postgres_keywords::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();

    init_tracing(&config);

    info!(
        transport = %config.transport,
        autocommit = config.autocommit,
        "Starting postgres-keywords v{}",
        env!("CARGO_PKG_VERSION")
    );

    let library = Arc::new(PostgresKeywords::new(config.library_settings()));

    // Open preconfigured connections; the last one becomes current
    let db_configs = config.parse_databases()?;
    if !db_configs.is_empty() {
        info!(
            count = db_configs.len(),
            "Connecting to preconfigured databases"
        );
    }
    for db_config in &db_configs {
        info!(
            alias = ?db_config.alias,
            url = %db_config.masked_url(),
            "Opening startup connection"
        );
        let conn_config = db_config.to_connection_config(config.autocommit)?;
        if let Err(e) = library.connect(conn_config).await {
            error!(error = %e, "Startup connection failed");
            library.close_all().await.ok();
            return Err(e.into());
        }
    }

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(library);
            info!(transport = transport.name(), "Using stdio transport");
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(library, &config.http_host, config.http_port);
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
