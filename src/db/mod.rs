//! Database layer.
//!
//! This module provides PostgreSQL access:
//! - Named connection registry (index, alias, current connection)
//! - Per-connection session with transaction state
//! - Statement execution and result decoding
//! - `%(name)s` placeholder rewriting
//! - Statement shape detection

pub mod executor;
pub mod params;
pub mod placeholders;
pub mod registry;
pub mod session;
pub mod statement;
pub mod types;

pub use executor::execute_statement;
pub use registry::{ConnectionRegistry, RegistryEntry};
pub use session::PgSession;
