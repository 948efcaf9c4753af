//! Data models for the PostgreSQL keyword library.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionInfo, DEFAULT_HOST, DEFAULT_PORT};
pub use query::{
    ColumnMetadata, DEFAULT_RESULT_LOG_ROWS, QueryParam, SqlParams, StatementOutcome,
};
