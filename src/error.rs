//! Error types for the PostgreSQL keyword library.
//!
//! Driver failures are carried with the driver's own message text so the
//! test runner reports exactly what PostgreSQL (or sqlx) said. Lookup and
//! argument errors are raised by the library itself.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("{message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Non-existing index or alias '{target}'")]
    ConnectionNotFound { target: String },

    #[error("There is no open connection to PostgreSQL database")]
    NoActiveConnection,

    #[error("Alias '{alias}' is already used by an open connection")]
    AliasInUse { alias: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("No keyword with name '{name}' found")]
    UnknownKeyword { name: String },

    #[error("Cannot read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a lookup error for an unknown index or alias.
    pub fn connection_not_found(target: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            target: target.into(),
        }
    }

    pub fn alias_in_use(alias: impl Into<String>) -> Self {
        Self::AliasInUse {
            alias: alias.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unknown_keyword(name: impl Into<String>) -> Self {
        Self::UnknownKeyword { name: name.into() }
    }

    /// Create an I/O error for a file the library was asked to read.
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// SQLSTATE reported by the server, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Variant name reported to the test runner alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ConnectionError",
            Self::Database { .. } => "DatabaseError",
            Self::ConnectionNotFound { .. } => "ConnectionNotFound",
            Self::NoActiveConnection => "NoActiveConnection",
            Self::AliasInUse { .. } => "AliasInUse",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::UnknownKeyword { .. } => "UnknownKeyword",
            Self::Io { .. } => "IoError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Messages are taken from the driver as-is; only the category changes.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => DbError::connection(err.to_string()),
            sqlx::Error::WorkerCrashed => DbError::internal(err.to_string()),
            other => DbError::database(other.to_string(), None),
        }
    }
}

/// Result type alias for library operations.
pub type DbResult<T> = Result<T, DbError>;
