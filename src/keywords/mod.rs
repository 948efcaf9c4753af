//! Keyword surface.
//!
//! This module exposes PostgreSQL operations as named keywords for a
//! table-driven test runner:
//! - `catalog`: keyword names, signatures and documentation
//! - `args`: binding positional and named call arguments
//! - `library`: typed keyword implementations over the connection registry
//! - `dispatch`: runner calls in, PASS/FAIL results out
//! - `format`: result tables for the log

pub mod args;
pub mod catalog;
pub mod dispatch;
pub mod format;
pub mod library;

pub use catalog::{KeywordId, KeywordSpec};
pub use dispatch::{KeywordCall, KeywordDescription, KeywordResult, KeywordStatus};
pub use library::{LibrarySettings, PostgresKeywords};
