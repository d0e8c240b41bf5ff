//! Driver seam: one implementation per database engine.
//!
//! A [`Driver`] owns a single native session. [`Connection`](crate::Connection)
//! holds it as `Box<dyn Driver>` and layers transactions, logging and error
//! bookkeeping on top, so drivers stay thin translations of the native API.

use crate::config::{ConnectionConfig, Dialect};
use crate::error::{DbError, DbResult};
use crate::result::ResultSet;
use crate::value::Value;
use async_trait::async_trait;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Native database session.
///
/// Every method takes `&mut self`: a session is never shared between callers.
#[async_trait]
pub trait Driver: Send {
    /// Engine this driver talks to.
    fn dialect(&self) -> Dialect;

    /// Open the session and apply per-engine session settings.
    async fn connect(&mut self, config: &ConnectionConfig) -> DbResult<()>;

    /// Close the session. Calling it on a closed driver is a no-op.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Round-trip liveness probe.
    async fn ping(&mut self) -> bool;

    /// Run a statement and collect its rows.
    ///
    /// Statements that return no rows yield an empty set carrying the affected
    /// row count and, where the engine reports one, the generated id.
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSet>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Run one or more statements without parameters or result rows.
    async fn execute_unprepared(&mut self, sql: &str) -> DbResult<()>;

    /// Id generated by the most recent insert on this session.
    async fn last_insert_id(&mut self, sequence: Option<&str>) -> DbResult<Option<i64>>;

    /// Quote a string literal for direct interpolation.
    fn quote(&self, value: &str) -> String;

    async fn prepare<'a>(&'a mut self, sql: &str) -> DbResult<Box<dyn PreparedStatement + 'a>>;
}

/// A statement prepared once and executed with different parameters.
#[async_trait]
pub trait PreparedStatement: Send {
    fn sql(&self) -> &str;

    async fn execute(&mut self, params: &[Value]) -> DbResult<ResultSet>;
}

/// Create an unconnected driver for `dialect`.
pub fn for_dialect(dialect: Dialect) -> DbResult<Box<dyn Driver>> {
    match dialect {
        #[cfg(feature = "postgres")]
        Dialect::Postgres => Ok(Box::new(postgres::PostgresDriver::new())),
        #[cfg(feature = "mysql")]
        Dialect::MySql => Ok(Box::new(mysql::MySqlDriver::new())),
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => Ok(Box::new(sqlite::SqliteDriver::new())),
        #[allow(unreachable_patterns)]
        other => Err(DbError::Config(format!(
            "driver `{}` is not compiled in (enable the matching cargo feature)",
            other.name()
        ))),
    }
}

/// Standard `'...'` literal quoting with doubled single quotes.
pub(crate) fn quote_standard(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Error returned when a call reaches a driver that is not connected.
pub(crate) fn not_connected(dialect: Dialect) -> DbError {
    DbError::Connection(format!("{} driver is not connected", dialect.name()))
}

/// Reject raw expressions that reached a driver as a bound parameter.
pub(crate) fn ensure_bindable(params: &[Value], sql: &str) -> DbResult<()> {
    match params.iter().find(|v| v.is_raw()) {
        Some(Value::Raw(expr)) => Err(DbError::query(
            format!("raw expression `{}` cannot be bound as a parameter", expr.sql()),
            sql,
        )),
        _ => Ok(()),
    }
}
