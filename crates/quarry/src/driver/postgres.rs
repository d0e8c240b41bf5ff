//! PostgreSQL driver backed by `tokio-postgres`.
//!
//! Builder SQL uses `?` placeholders; they are renumbered to `$1..$n` here,
//! skipping quoted literals and identifiers. Bound [`Value`]s are coerced to
//! the parameter type the server inferred for each placeholder.

use super::{Driver, PreparedStatement, ensure_bindable, not_connected, quote_standard};
use crate::config::{ConnectionConfig, Dialect, SslMode};
use crate::error::{DbError, DbResult};
use crate::result::ResultSet;
use crate::value::Value;
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::error::Error as StdError;
use std::str::FromStr;
use tokio::task::JoinHandle;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls, Statement};

type BoxError = Box<dyn StdError + Sync + Send>;

/// Driver for one PostgreSQL session.
#[derive(Default)]
pub struct PostgresDriver {
    client: Option<Client>,
    connection_task: Option<JoinHandle<()>>,
}

impl PostgresDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> DbResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| not_connected(Dialect::Postgres))
    }
}

/// Rewrite `?` placeholders to `$n`, leaving quoted text untouched.
///
/// `??` is emitted as a literal `?` so JSONB operators stay expressible.
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    // A doubled quote char stays inside the literal.
                    if chars.peek() == Some(&q) {
                        out.push(q);
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' if chars.peek() == Some(&'?') => {
                    chars.next();
                    out.push('?');
                }
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}

fn map_error(err: tokio_postgres::Error, sql: &str) -> DbError {
    match err.as_db_error() {
        Some(db) => DbError::from_sqlstate(Some(db.code().code()), db.message(), sql),
        None if err.is_closed() => DbError::Connection(err.to_string()),
        None => DbError::query(err.to_string(), sql),
    }
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            v.to_string().as_str().to_sql(ty, out)
        }
        _ => v.to_sql_checked(ty, out),
    }
}

fn float_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(v)?.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 if v.fract() == 0.0 => int_to_sql(v as i64, ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            v.to_string().as_str().to_sql(ty, out)
        }
        _ => v.to_sql_checked(ty, out),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => int_to_sql(s.trim().parse()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => float_to_sql(s.trim().parse()?, ty, out),
        Type::NUMERIC => Decimal::from_str(s.trim())?.to_sql(ty, out),
        Type::BOOL => match Value::Text(s.to_string()).as_bool() {
            Some(b) => b.to_sql(ty, out),
            None => Err(format!("invalid boolean literal: {s}").into()),
        },
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(s)?.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        // Enum labels share the text wire format.
        _ if matches!(ty.kind(), Kind::Enum(_)) => s.to_sql(ty, out),
        _ => s.to_sql_checked(ty, out),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(Into::into)
}

fn parse_timestamptz(s: &str) -> Result<DateTime<Utc>, BoxError> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| parse_timestamp(s).map(|naive| naive.and_utc()))
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) if *ty == Type::BOOL => b.to_sql(ty, out),
            Value::Bool(b) => int_to_sql(i64::from(*b), ty, out),
            Value::Int(v) => int_to_sql(*v, ty, out),
            Value::Float(v) => float_to_sql(*v, ty, out),
            Value::Text(s) => text_to_sql(s, ty, out),
            Value::Bytes(b) => b.as_slice().to_sql_checked(ty, out),
            Value::Raw(expr) => Err(format!("raw expression `{}` cannot be bound", expr.sql()).into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn decode_column(row: &tokio_postgres::Row, idx: usize) -> DbResult<Value> {
    let column = &row.columns()[idx];
    let name = column.name();
    let err = |e: tokio_postgres::Error| DbError::decode(name, e.to_string());

    let value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(err)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map_err(err)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map_err(err)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(err)?.map(Value::Int),
        Type::OID => row.try_get::<_, Option<u32>>(idx).map_err(err)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).map_err(err)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(err)?.map(Value::Float),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)
            .map_err(err)?
            .map(|d| Value::Text(d.to_string())),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(err)?
            .map(|j| Value::Text(j.to_string())),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .map_err(err)?
            .map(Value::from),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx).map_err(err)?.map(Value::from),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)
            .map_err(err)?
            .map(|t| Value::Text(t.format("%H:%M:%S%.f").to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(err)?
            .map(Value::from),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(err)?
            .map(Value::from),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map_err(err)?.map(Value::Bytes),
        _ => row.try_get::<_, Option<String>>(idx).map_err(err)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn collect_rows(statement: &Statement, rows: &[tokio_postgres::Row]) -> DbResult<ResultSet> {
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let mut out = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            out.push(decode_column(row, idx)?);
        }
        values.push(out);
    }
    Ok(ResultSet::from_values(columns, values).with_affected(rows.len() as u64, None))
}

async fn run(client: &Client, statement: &Statement, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
    if statement.columns().is_empty() {
        let affected = client
            .execute(statement, &refs)
            .await
            .map_err(|e| map_error(e, sql))?;
        return Ok(ResultSet::affected(affected, None));
    }
    let rows = client
        .query(statement, &refs)
        .await
        .map_err(|e| map_error(e, sql))?;
    collect_rows(statement, &rows)
}

fn build_config(config: &ConnectionConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    // A host starting with `/` is treated as a unix socket directory.
    pg.host(config.socket.as_deref().unwrap_or(config.host_or_default()));
    if let Some(port) = config.port_or_default() {
        pg.port(port);
    }
    pg.dbname(&config.database);
    if let Some(user) = &config.username {
        pg.user(user);
    }
    if let Some(password) = &config.password {
        pg.password(password);
    }
    if let Some(timeout) = config.connect_timeout_duration() {
        pg.connect_timeout(timeout);
    }
    pg.ssl_mode(match config.sslmode.unwrap_or_default() {
        SslMode::Disable => tokio_postgres::config::SslMode::Disable,
        SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
        SslMode::Require => tokio_postgres::config::SslMode::Require,
    });
    pg.application_name("quarry");
    pg
}

/// Session statements applied right after connecting.
fn session_setup(config: &ConnectionConfig) -> Vec<String> {
    let mut stmts = Vec::new();
    if let Some(charset) = &config.charset {
        stmts.push(format!("set client_encoding to {}", quote_standard(charset)));
    }
    if let Some(tz) = &config.timezone {
        stmts.push(format!("set time zone {}", quote_standard(tz)));
    }
    if let Some(schema) = &config.schema {
        let path: Vec<String> = schema
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("\"{}\"", s.replace('"', "\"\"")))
            .collect();
        if !path.is_empty() {
            stmts.push(format!("set search_path to {}", path.join(", ")));
        }
    }
    stmts
}

#[async_trait]
impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&mut self, config: &ConnectionConfig) -> DbResult<()> {
        // TLS negotiation is not wired up; `prefer` falls back to plaintext.
        if config.sslmode == Some(SslMode::Require) {
            return Err(DbError::Connection(
                "sslmode=require is not supported by this build".to_string(),
            ));
        }

        let pg = build_config(config);
        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "quarry.sql", error = %e, "postgres connection closed");
            }
        });

        for stmt in session_setup(config) {
            if let Err(e) = client.batch_execute(&stmt).await {
                task.abort();
                return Err(DbError::Connection(format!("{stmt}: {e}")));
            }
        }

        self.disconnect().await;
        self.client = Some(client);
        self.connection_task = Some(task);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.client = None;
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
    }

    fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    async fn ping(&mut self) -> bool {
        match self.client.as_ref() {
            Some(client) => client.simple_query("SELECT 1").await.is_ok(),
            None => false,
        }
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        ensure_bindable(params, sql)?;
        let client = self.client()?;
        let numbered = numbered_placeholders(sql);
        let statement = client
            .prepare(&numbered)
            .await
            .map_err(|e| map_error(e, sql))?;
        run(client, &statement, sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        ensure_bindable(params, sql)?;
        let client = self.client()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        client
            .execute(numbered_placeholders(sql).as_str(), &refs)
            .await
            .map_err(|e| map_error(e, sql))
    }

    async fn execute_unprepared(&mut self, sql: &str) -> DbResult<()> {
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(|e| map_error(e, sql))
    }

    async fn last_insert_id(&mut self, sequence: Option<&str>) -> DbResult<Option<i64>> {
        let sql = match sequence {
            Some(seq) => format!("select currval({})", quote_standard(seq)),
            None => "select lastval()".to_string(),
        };
        let row = self
            .client()?
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| map_error(e, &sql))?;
        row.try_get::<_, Option<i64>>(0)
            .map_err(|e| DbError::decode("lastval", e.to_string()))
    }

    fn quote(&self, value: &str) -> String {
        quote_standard(value)
    }

    async fn prepare<'a>(&'a mut self, sql: &str) -> DbResult<Box<dyn PreparedStatement + 'a>> {
        let client = self.client()?;
        let statement = client
            .prepare(&numbered_placeholders(sql))
            .await
            .map_err(|e| map_error(e, sql))?;
        Ok(Box::new(PgPrepared {
            client,
            statement,
            sql: sql.to_string(),
        }))
    }
}

/// Server-side prepared statement.
struct PgPrepared<'a> {
    client: &'a Client,
    statement: Statement,
    sql: String,
}

#[async_trait]
impl PreparedStatement for PgPrepared<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute(&mut self, params: &[Value]) -> DbResult<ResultSet> {
        ensure_bindable(params, &self.sql)?;
        run(self.client, &self.statement, &self.sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renumbers_placeholders_in_order() {
        assert_eq!(
            numbered_placeholders(r#"select * from "t" where "a" = ? and "b" in (?, ?)"#),
            r#"select * from "t" where "a" = $1 and "b" in ($2, $3)"#
        );
    }

    #[test]
    fn skips_quoted_question_marks() {
        assert_eq!(
            numbered_placeholders(r#"select '?', "we?ird", 'it''s ?' where x = ?"#),
            r#"select '?', "we?ird", 'it''s ?' where x = $1"#
        );
    }

    #[test]
    fn double_question_mark_is_literal() {
        assert_eq!(
            numbered_placeholders(r#"select "meta" ?? 'k' from "t" where id = ?"#),
            r#"select "meta" ? 'k' from "t" where id = $1"#
        );
    }

    #[test]
    fn session_setup_quotes_search_path() {
        let cfg = ConnectionConfig::new(Dialect::Postgres, "shop")
            .schema("inventory, public")
            .timezone("UTC");
        assert_eq!(
            session_setup(&cfg),
            vec![
                "set time zone 'UTC'".to_string(),
                r#"set search_path to "inventory", "public""#.to_string(),
            ]
        );
    }

    #[test]
    fn value_coerces_by_declared_type() {
        let mut buf = BytesMut::new();
        assert!(Value::Text("42".into()).to_sql(&Type::INT4, &mut buf).is_ok());
        assert_eq!(&buf[..], &42i32.to_be_bytes());

        let mut buf = BytesMut::new();
        assert!(Value::Int(1).to_sql(&Type::BOOL, &mut buf).is_ok());
        assert_eq!(&buf[..], &[1u8]);

        let mut buf = BytesMut::new();
        assert!(Value::Int(70_000).to_sql(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn fractional_float_is_rejected_for_integer_params() {
        let mut buf = BytesMut::new();
        assert!(Value::Float(2.5).to_sql(&Type::INT8, &mut buf).is_err());
        assert!(buf.is_empty());

        let mut buf = BytesMut::new();
        assert!(Value::Float(3.0).to_sql(&Type::INT8, &mut buf).is_ok());
        assert_eq!(&buf[..], &3i64.to_be_bytes());
    }

    #[test]
    fn mismatched_types_fail_instead_of_writing_raw_bytes() {
        let mut buf = BytesMut::new();
        assert!(Value::Int(7).to_sql(&Type::UUID, &mut buf).is_err());
        assert!(Value::Float(1.5).to_sql(&Type::DATE, &mut buf).is_err());
        assert!(Value::Bytes(vec![1, 2]).to_sql(&Type::INT4, &mut buf).is_err());
        assert!(Value::Text("x".into()).to_sql(&Type::POINT, &mut buf).is_err());
        assert!(buf.is_empty());
    }
}
