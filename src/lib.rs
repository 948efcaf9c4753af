//! PostgreSQL keyword library.
//!
//! Exposes PostgreSQL connection management and pass-through SQL execution
//! as named keywords for table-driven test automation. Connections are kept
//! in a registry addressed by index or alias, one of which is current.

pub mod config;
pub mod db;
pub mod error;
pub mod keywords;
pub mod models;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use keywords::{KeywordCall, KeywordResult, LibrarySettings, PostgresKeywords};
