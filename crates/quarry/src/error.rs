//! Error types for quarry

use thiserror::Error;

/// Result type alias for quarry operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Connect / reconnect failure (auth, network, bad configuration at connect time)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement failed on the backend (malformed SQL, constraint violation, ...)
    #[error("Query error: {message} (SQL: {sql})")]
    Query { message: String, sql: String },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Row not found (`first_or_fail`)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Metadata catalog lookup failed
    #[error("Schema introspection error: {0}")]
    SchemaIntrospection(String),

    /// DDL the target dialect cannot express
    #[error("Schema error: {0}")]
    Schema(String),

    /// `add_binding` called with a bucket name that does not exist
    #[error("Unknown binding bucket: {0}")]
    UnknownBindingBucket(String),

    /// Builder misuse detected before execution
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Connect timeout
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Commit/rollback failure surfaced by the `transaction!` macro
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a query error carrying the native message and the offending SQL.
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a schema (DDL) error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Classify a native error by its SQLSTATE code.
    ///
    /// `23505` and `23503` are shared by PostgreSQL and SQLite/MySQL drivers that
    /// expose SQLSTATE; everything else stays a generic [`DbError::Query`].
    pub fn from_sqlstate(code: Option<&str>, message: impl Into<String>, sql: &str) -> Self {
        let message = message.into();
        match code {
            Some("23505") => Self::UniqueViolation(message),
            Some("23503") => Self::ForeignKeyViolation(message),
            _ => Self::query(message, sql),
        }
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<url::ParseError> for DbError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(err.to_string())
    }
}
