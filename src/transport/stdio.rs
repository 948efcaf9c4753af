//! Stdio transport for the keyword library.
//!
//! Each line on stdin is one JSON request; each response is one JSON line on
//! stdout. Logs go to stderr so they never interleave with responses.

use crate::error::{DbError, DbResult};
use crate::keywords::{KeywordResult, PostgresKeywords};
use crate::transport::{Request, Transport, wait_for_signal};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Stdio transport implementation.
pub struct StdioTransport {
    library: Arc<PostgresKeywords>,
}

impl StdioTransport {
    pub fn new(library: Arc<PostgresKeywords>) -> Self {
        Self { library }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting keyword server with stdio transport");

        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();

        let shutdown_requested = tokio::select! {
            result = serve_lines(&self.library, reader, writer) => {
                match result {
                    Ok(handled) => info!(requests = handled, "Stdin closed"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.library.close_all().await.ok();
                        return Err(e);
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing all database connections");
        if let Err(e) = self.library.close_all().await {
            warn!(error = %e, "Error while closing connections");
        }

        if shutdown_requested {
            // The stdin read cannot be interrupted, so the runtime would not finish on its own
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Answer requests line by line until the reader is exhausted.
///
/// Blank lines are skipped. Returns the number of requests answered.
pub async fn serve_lines<R, W>(
    library: &PostgresKeywords,
    reader: R,
    mut writer: W,
) -> DbResult<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| DbError::io("<stdin>", &e))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<Request>(line) {
            Ok(request) => request.handle(library).await,
            Err(e) => {
                debug!(error = %e, "Malformed request");
                KeywordResult::fail(&DbError::invalid_input(format!("Malformed request: {e}")))
            }
        };

        let mut response =
            serde_json::to_vec(&result).map_err(|e| DbError::internal(e.to_string()))?;
        response.push(b'\n');
        writer
            .write_all(&response)
            .await
            .map_err(|e| DbError::io("<stdout>", &e))?;
        writer
            .flush()
            .await
            .map_err(|e| DbError::io("<stdout>", &e))?;
        handled += 1;
    }

    Ok(handled)
}
