//! MySQL / MariaDB driver backed by `mysql_async`.

use super::{Driver, PreparedStatement, ensure_bindable, not_connected};
use crate::config::{ConnectionConfig, Dialect};
use crate::error::{DbError, DbResult};
use crate::result::ResultSet;
use crate::value::Value;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Params, Row as MySqlRow, Statement};
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const STRICT_SQL_MODE: &str = "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,\
NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION";

/// Driver for one MySQL session.
#[derive(Default)]
pub struct MySqlDriver {
    conn: Option<Conn>,
}

impl MySqlDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn conn(&mut self) -> DbResult<&mut Conn> {
        self.conn.as_mut().ok_or_else(|| not_connected(Dialect::MySql))
    }
}

/// MySQL has no boolean type; booleans travel as 0/1.
fn to_native(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null | Value::Raw(_) => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Int(v) => mysql_async::Value::Int(*v),
        Value::Float(v) => mysql_async::Value::Double(*v),
        Value::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
    }
}

fn params_for(values: &[Value]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(to_native).collect())
    }
}

fn from_native(value: Option<&mysql_async::Value>) -> Value {
    use mysql_async::Value as Native;
    match value {
        None | Some(Native::NULL) => Value::Null,
        Some(Native::Bytes(b)) => match std::str::from_utf8(b) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(b.clone()),
        },
        Some(Native::Int(v)) => Value::Int(*v),
        Some(Native::UInt(v)) => i64::try_from(*v).map_or_else(|_| Value::Text(v.to_string()), Value::Int),
        Some(Native::Float(v)) => Value::Float(f64::from(*v)),
        Some(Native::Double(v)) => Value::Float(*v),
        Some(Native::Date(y, m, d, h, i, s, us)) => Value::Text(if *us == 0 {
            format!("{y:04}-{m:02}-{d:02} {h:02}:{i:02}:{s:02}")
        } else {
            format!("{y:04}-{m:02}-{d:02} {h:02}:{i:02}:{s:02}.{us:06}")
        }),
        Some(Native::Time(neg, days, h, i, s, us)) => {
            let sign = if *neg { "-" } else { "" };
            let hours = u32::from(*h) + days * 24;
            Value::Text(if *us == 0 {
                format!("{sign}{hours:02}:{i:02}:{s:02}")
            } else {
                format!("{sign}{hours:02}:{i:02}:{s:02}.{us:06}")
            })
        }
    }
}

fn collect_rows(rows: Vec<MySqlRow>) -> ResultSet {
    let columns: Vec<String> = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect()
        })
        .unwrap_or_default();
    let values = rows
        .iter()
        .map(|row| (0..row.len()).map(|idx| from_native(row.as_ref(idx))).collect())
        .collect();
    ResultSet::from_values(columns, values)
}

fn map_error(err: mysql_async::Error, sql: &str) -> DbError {
    match err {
        mysql_async::Error::Server(server) => match server.code {
            1062 => DbError::UniqueViolation(server.message),
            1451 | 1452 => DbError::ForeignKeyViolation(server.message),
            _ => DbError::query(server.message, sql),
        },
        mysql_async::Error::Io(e) => DbError::Connection(e.to_string()),
        mysql_async::Error::Driver(e) => DbError::Connection(e.to_string()),
        other => DbError::query(other.to_string(), sql),
    }
}

fn insert_id(conn: &Conn) -> Option<i64> {
    conn.last_insert_id()
        .filter(|id| *id != 0)
        .and_then(|id| i64::try_from(id).ok())
}

async fn run(conn: &mut Conn, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
    let rows: Vec<MySqlRow> = if params.is_empty() {
        conn.query(sql).await
    } else {
        conn.exec(sql, params_for(params)).await
    }
    .map_err(|e| map_error(e, sql))?;
    Ok(collect_rows(rows).with_affected(conn.affected_rows(), insert_id(conn)))
}

/// String literal; backslashes are escape characters in MySQL literals.
fn quote_mysql(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Session statements applied right after connecting.
fn session_setup(config: &ConnectionConfig) -> Vec<String> {
    let mut stmts = Vec::new();
    if let Some(charset) = &config.charset {
        match &config.collation {
            Some(collation) => stmts.push(format!(
                "set names {} collate {}",
                quote_mysql(charset),
                quote_mysql(collation)
            )),
            None => stmts.push(format!("set names {}", quote_mysql(charset))),
        }
    }
    if let Some(tz) = &config.timezone {
        stmts.push(format!("set time_zone = {}", quote_mysql(tz)));
    }
    match config.strict {
        Some(true) => stmts.push(format!("set session sql_mode = '{STRICT_SQL_MODE}'")),
        Some(false) => stmts.push("set session sql_mode = 'NO_ENGINE_SUBSTITUTION'".to_string()),
        None => {}
    }
    stmts
}

#[async_trait]
impl Driver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn connect(&mut self, config: &ConnectionConfig) -> DbResult<()> {
        let mut opts = OptsBuilder::default()
            .ip_or_hostname(config.host_or_default())
            .tcp_port(config.port_or_default().unwrap_or(3306))
            .db_name(Some(&config.database))
            .user(config.username.as_deref())
            .pass(config.password.as_deref());
        if let Some(socket) = &config.socket {
            opts = opts.socket(Some(socket));
        }

        let timeout = config
            .connect_timeout_duration()
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let mut conn = tokio::time::timeout(timeout, Conn::new(opts))
            .await
            .map_err(|_| DbError::Timeout(timeout))?
            .map_err(|e| DbError::Connection(e.to_string()))?;

        for stmt in session_setup(config) {
            if let Err(e) = conn.query_drop(&stmt).await {
                let _ = conn.disconnect().await;
                return Err(DbError::Connection(format!("{stmt}: {e}")));
            }
        }

        self.disconnect().await;
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(e) = conn.disconnect().await
        {
            tracing::warn!(target: "quarry.sql", error = %e, "mysql disconnect failed");
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn ping(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => conn.ping().await.is_ok(),
            None => false,
        }
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        ensure_bindable(params, sql)?;
        run(self.conn()?, sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        ensure_bindable(params, sql)?;
        let conn = self.conn()?;
        if params.is_empty() {
            conn.query_drop(sql).await
        } else {
            conn.exec_drop(sql, params_for(params)).await
        }
        .map_err(|e| map_error(e, sql))?;
        Ok(conn.affected_rows())
    }

    async fn execute_unprepared(&mut self, sql: &str) -> DbResult<()> {
        self.conn()?
            .query_drop(sql)
            .await
            .map_err(|e| map_error(e, sql))
    }

    async fn last_insert_id(&mut self, _sequence: Option<&str>) -> DbResult<Option<i64>> {
        let conn = self.conn()?;
        if let Some(id) = insert_id(conn) {
            return Ok(Some(id));
        }
        let sql = "select last_insert_id()";
        let id: Option<u64> = conn.query_first(sql).await.map_err(|e| map_error(e, sql))?;
        Ok(id.filter(|id| *id != 0).and_then(|id| i64::try_from(id).ok()))
    }

    fn quote(&self, value: &str) -> String {
        quote_mysql(value)
    }

    async fn prepare<'a>(&'a mut self, sql: &str) -> DbResult<Box<dyn PreparedStatement + 'a>> {
        let conn = self.conn()?;
        let statement = conn.prep(sql).await.map_err(|e| map_error(e, sql))?;
        Ok(Box::new(MySqlPrepared {
            conn,
            statement,
            sql: sql.to_string(),
        }))
    }
}

/// Server-side prepared statement.
struct MySqlPrepared<'a> {
    conn: &'a mut Conn,
    statement: Statement,
    sql: String,
}

#[async_trait]
impl PreparedStatement for MySqlPrepared<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&mut self, params: &[Value]) -> DbResult<ResultSet> {
        ensure_bindable(params, &self.sql)?;
        let rows: Vec<MySqlRow> = self
            .conn
            .exec(&self.statement, params_for(params))
            .await
            .map_err(|e| map_error(e, &self.sql))?;
        let affected = self.conn.affected_rows();
        let id = insert_id(self.conn);
        Ok(collect_rows(rows).with_affected(affected, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_bind_as_integers() {
        assert_eq!(to_native(&Value::Bool(true)), mysql_async::Value::Int(1));
        assert_eq!(to_native(&Value::Bool(false)), mysql_async::Value::Int(0));
    }

    #[test]
    fn native_dates_decode_to_text() {
        let v = mysql_async::Value::Date(2024, 1, 2, 3, 4, 5, 0);
        assert_eq!(from_native(Some(&v)), Value::Text("2024-01-02 03:04:05".into()));
    }

    #[test]
    fn strict_mode_sets_sql_mode() {
        let mut cfg = ConnectionConfig::new(Dialect::MySql, "shop").charset("utf8mb4");
        cfg.collation = Some("utf8mb4_unicode_ci".into());
        cfg.strict = Some(true);
        let stmts = session_setup(&cfg);
        assert_eq!(stmts[0], "set names 'utf8mb4' collate 'utf8mb4_unicode_ci'");
        assert!(stmts[1].starts_with("set session sql_mode = 'ONLY_FULL_GROUP_BY"));
    }

    #[test]
    fn session_values_are_quoted() {
        let cfg = ConnectionConfig::new(Dialect::MySql, "shop")
            .charset("utf8mb4' --")
            .timezone(r"+00:00\");
        assert_eq!(
            session_setup(&cfg),
            vec![
                "set names 'utf8mb4'' --'".to_string(),
                r"set time_zone = '+00:00\\'".to_string(),
            ]
        );
    }

    #[test]
    fn quote_escapes_backslashes() {
        assert_eq!(MySqlDriver::new().quote(r"a\'b"), r"'a\\''b'");
    }
}
