//! SQLite driver backed by `rusqlite`.

use super::{Driver, PreparedStatement, ensure_bindable, not_connected, quote_standard};
use crate::config::{ConnectionConfig, Dialect};
use crate::error::{DbError, DbResult};
use crate::result::ResultSet;
use crate::value::Value;
use async_trait::async_trait;
use rusqlite::ffi;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Driver for a single SQLite database file (or `:memory:`).
#[derive(Default)]
pub struct SqliteDriver {
    conn: Option<rusqlite::Connection>,
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn conn(&mut self) -> DbResult<&mut rusqlite::Connection> {
        self.conn.as_mut().ok_or_else(|| not_connected(Dialect::Sqlite))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Native;
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Native::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Native::Integer(i64::from(*b))),
            Value::Int(v) => ToSqlOutput::Owned(Native::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(Native::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Raw(expr) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    format!("raw expression `{}` cannot be bound", expr.sql()).into(),
                ));
            }
        })
    }
}

fn decode(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn map_error(err: rusqlite::Error, sql: &str) -> DbError {
    if let rusqlite::Error::SqliteFailure(native, message) = &err {
        let message = message.clone().unwrap_or_else(|| err.to_string());
        return match native.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                DbError::UniqueViolation(message)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => DbError::ForeignKeyViolation(message),
            _ => DbError::query(message, sql),
        };
    }
    DbError::query(err.to_string(), sql)
}

/// Compile, bind and run `sql`, collecting rows when the statement has any.
fn run(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
    ensure_bindable(params, sql)?;
    let mut stmt = conn.prepare(sql).map_err(|e| map_error(e, sql))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

    if columns.is_empty() {
        let affected = stmt
            .execute(rusqlite::params_from_iter(params.iter()))
            .map_err(|e| map_error(e, sql))?;
        let id = conn.last_insert_rowid();
        return Ok(ResultSet::affected(affected as u64, (id != 0).then_some(id)));
    }

    let width = columns.len();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(|e| map_error(e, sql))?;
    let mut values = Vec::new();
    while let Some(row) = rows.next().map_err(|e| map_error(e, sql))? {
        let mut out = Vec::with_capacity(width);
        for idx in 0..width {
            out.push(decode(row.get_ref(idx).map_err(|e| map_error(e, sql))?));
        }
        values.push(out);
    }
    Ok(ResultSet::from_values(columns, values))
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&mut self, config: &ConnectionConfig) -> DbResult<()> {
        let conn = if config.database == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&config.database)
        }
        .map_err(|e| DbError::Connection(format!("{}: {e}", config.database)))?;

        let busy = config.connect_timeout_duration().unwrap_or(DEFAULT_BUSY_TIMEOUT);
        conn.busy_timeout(busy)
            .map_err(|e| DbError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::Connection(e.to_string()))?;

        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err((_, e)) = conn.close()
        {
            tracing::warn!(target: "quarry.sql", error = %e, "sqlite close failed");
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn ping(&mut self) -> bool {
        match self.conn.as_ref() {
            Some(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            None => false,
        }
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        run(self.conn()?, sql, params)
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        Ok(run(self.conn()?, sql, params)?.affected_rows())
    }

    async fn execute_unprepared(&mut self, sql: &str) -> DbResult<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(|e| map_error(e, sql))
    }

    async fn last_insert_id(&mut self, _sequence: Option<&str>) -> DbResult<Option<i64>> {
        let id = self.conn()?.last_insert_rowid();
        Ok((id != 0).then_some(id))
    }

    fn quote(&self, value: &str) -> String {
        quote_standard(value)
    }

    async fn prepare<'a>(&'a mut self, sql: &str) -> DbResult<Box<dyn PreparedStatement + 'a>> {
        let conn = self.conn()?;
        // Compile once up front so syntax errors surface at prepare time.
        conn.prepare(sql).map_err(|e| map_error(e, sql))?;
        Ok(Box::new(SqlitePrepared {
            conn,
            sql: sql.to_string(),
        }))
    }
}

/// SQLite statements borrow the connection, so the handle keeps the SQL and
/// re-runs the full query on every execution.
struct SqlitePrepared<'a> {
    conn: &'a mut rusqlite::Connection,
    sql: String,
}

#[async_trait]
impl PreparedStatement for SqlitePrepared<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&mut self, params: &[Value]) -> DbResult<ResultSet> {
        run(self.conn, &self.sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> SqliteDriver {
        let mut driver = SqliteDriver::new();
        driver.connect(&ConnectionConfig::sqlite_memory()).await.unwrap();
        driver
    }

    #[tokio::test]
    async fn query_decodes_native_types() {
        let mut driver = memory().await;
        let rs = driver
            .query("SELECT 1 AS a, 2.5 AS b, 'x' AS c, NULL AS d, ? AS e", &[Value::Bool(true)])
            .await
            .unwrap();
        assert_eq!(rs.columns(), ["a", "b", "c", "d", "e"]);
        assert_eq!(
            rs.rows()[0].values(),
            [Value::Int(1), Value::Float(2.5), Value::Text("x".into()), Value::Null, Value::Int(1)]
        );
    }

    #[tokio::test]
    async fn unique_violation_is_classified() {
        let mut driver = memory().await;
        driver
            .execute_unprepared("CREATE TABLE t (id INTEGER PRIMARY KEY, code TEXT UNIQUE)")
            .await
            .unwrap();
        driver.execute("INSERT INTO t (code) VALUES (?)", &["a".into()]).await.unwrap();
        let err = driver
            .execute("INSERT INTO t (code) VALUES (?)", &["a".into()])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn prepared_statement_runs_repeatedly() {
        let mut driver = memory().await;
        driver.execute_unprepared("CREATE TABLE t (v INTEGER)").await.unwrap();
        {
            let mut stmt = driver.prepare("INSERT INTO t (v) VALUES (?)").await.unwrap();
            for v in 1..=3 {
                let rs = stmt.execute(&[Value::Int(v)]).await.unwrap();
                assert_eq!(rs.affected_rows(), 1);
            }
        }
        assert_eq!(driver.last_insert_id(None).await.unwrap(), Some(3));
        let rs = driver.query("SELECT sum(v) FROM t", &[]).await.unwrap();
        assert_eq!(rs.scalar(), Some(&Value::Int(6)));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut driver = memory().await;
        driver.disconnect().await;
        driver.disconnect().await;
        assert!(!driver.is_connected());
        assert!(!driver.ping().await);
    }
}
