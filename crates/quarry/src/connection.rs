//! A single database session: driver, transaction level, query log.

use crate::config::{ConnectionConfig, Dialect};
use crate::driver::{self, Driver, PreparedStatement};
use crate::error::{DbError, DbResult};
use crate::query::Builder;
use crate::query::grammar;
use crate::result::{ResultSet, Row};
use crate::schema::SchemaBuilder;
use crate::transaction::{TransactionState, TransactionStep};
use crate::value::Value;
use std::time::{Duration, Instant};

/// One executed statement, as recorded by the query log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
    pub elapsed: Duration,
}

/// Owns one native session.
///
/// Every stateful call takes `&mut self`; a connection is never shared between
/// concurrent callers. Open one per task or thread.
pub struct Connection {
    driver: Box<dyn Driver>,
    config: ConnectionConfig,
    transactions: TransactionState,
    last_error: Option<String>,
    query_log: Option<Vec<LoggedQuery>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("dialect", &self.dialect())
            .field("database", &self.config.database)
            .field("transaction_level", &self.transactions.level())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Validate `config`, pick the driver and open the session.
    pub async fn connect(config: ConnectionConfig) -> DbResult<Self> {
        config.validate()?;
        let mut driver = driver::for_dialect(config.driver)?;
        driver.connect(&config).await?;
        tracing::debug!(
            target: "quarry.sql",
            driver = config.driver.name(),
            database = %config.database,
            "connected"
        );
        Ok(Self::from_driver(driver, config))
    }

    /// Wrap an already connected driver.
    pub fn from_driver(driver: Box<dyn Driver>, config: ConnectionConfig) -> Self {
        Self {
            driver,
            config,
            transactions: TransactionState::default(),
            last_error: None,
            query_log: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn disconnect(&mut self) {
        self.driver.disconnect().await;
        self.transactions.reset();
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    pub async fn ping(&mut self) -> bool {
        self.driver.ping().await
    }

    /// Reopen the session with the last configuration.
    ///
    /// Returns `false` (recording [`last_error`](Self::last_error)) instead of
    /// failing. Any open transaction is lost, so the level resets to 0.
    pub async fn reconnect(&mut self) -> bool {
        self.driver.disconnect().await;
        self.transactions.reset();
        match self.driver.connect(&self.config).await {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(e) => {
                tracing::warn!(target: "quarry.sql", error = %e, "reconnect failed");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Message of the last failed driver call.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── query log ───────────────────────────────────────────────────────────

    pub fn enable_query_log(&mut self) {
        if self.query_log.is_none() {
            self.query_log = Some(Vec::new());
        }
    }

    pub fn disable_query_log(&mut self) {
        self.query_log = None;
    }

    pub fn logging_queries(&self) -> bool {
        self.query_log.is_some()
    }

    /// Statements recorded since the log was enabled or last flushed.
    pub fn query_log(&self) -> &[LoggedQuery] {
        self.query_log.as_deref().unwrap_or(&[])
    }

    pub fn flush_query_log(&mut self) {
        if let Some(log) = self.query_log.as_mut() {
            log.clear();
        }
    }

    fn record(&mut self, sql: &str, bindings: &[Value], started: Instant, outcome: Result<(), &DbError>) {
        let elapsed = started.elapsed();
        match outcome {
            Ok(()) => {
                self.last_error = None;
                tracing::debug!(
                    target: "quarry.sql",
                    sql = %sql,
                    bindings = bindings.len(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "statement"
                );
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                tracing::debug!(
                    target: "quarry.sql",
                    sql = %sql,
                    error = %e,
                    elapsed_us = elapsed.as_micros() as u64,
                    "statement failed"
                );
            }
        }
        if let Some(log) = self.query_log.as_mut() {
            log.push(LoggedQuery {
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
                elapsed,
            });
        }
    }

    // ── raw statements ──────────────────────────────────────────────────────

    /// Run a query and return its rows.
    pub async fn select(&mut self, sql: &str, bindings: &[Value]) -> DbResult<ResultSet> {
        let started = Instant::now();
        let result = self.driver.query(sql, bindings).await;
        self.record(sql, bindings, started, result.as_ref().map(|_| ()));
        result
    }

    /// First row of a query, if any.
    pub async fn select_one(&mut self, sql: &str, bindings: &[Value]) -> DbResult<Option<Row>> {
        Ok(self.select(sql, bindings).await?.into_rows().into_iter().next())
    }

    /// First column of the first row, if any.
    pub async fn scalar(&mut self, sql: &str, bindings: &[Value]) -> DbResult<Option<Value>> {
        Ok(self.select(sql, bindings).await?.scalar().cloned())
    }

    /// Run an INSERT; returns `true` on success.
    pub async fn insert(&mut self, sql: &str, bindings: &[Value]) -> DbResult<bool> {
        self.statement(sql, bindings).await
    }

    /// Run an UPDATE and return the affected row count.
    pub async fn update(&mut self, sql: &str, bindings: &[Value]) -> DbResult<u64> {
        self.affecting_statement(sql, bindings).await
    }

    /// Run a DELETE and return the affected row count.
    pub async fn delete(&mut self, sql: &str, bindings: &[Value]) -> DbResult<u64> {
        self.affecting_statement(sql, bindings).await
    }

    /// Run a statement; returns `true` on success.
    pub async fn statement(&mut self, sql: &str, bindings: &[Value]) -> DbResult<bool> {
        self.affecting_statement(sql, bindings).await.map(|_| true)
    }

    /// Run a statement and return the affected row count.
    pub async fn affecting_statement(&mut self, sql: &str, bindings: &[Value]) -> DbResult<u64> {
        let started = Instant::now();
        let result = self.driver.execute(sql, bindings).await;
        self.record(sql, bindings, started, result.as_ref().map(|_| ()));
        result
    }

    /// Run raw SQL (possibly several statements) without the prepared path.
    pub async fn unprepared(&mut self, sql: &str) -> DbResult<()> {
        let started = Instant::now();
        let result = self.driver.execute_unprepared(sql).await;
        self.record(sql, &[], started, result.as_ref().map(|_| ()));
        result
    }

    pub async fn last_insert_id(&mut self, sequence: Option<&str>) -> DbResult<Option<i64>> {
        self.driver.last_insert_id(sequence).await
    }

    /// Quote a string literal. Prefer bindings; this is an escape hatch.
    pub fn quote(&self, value: &str) -> String {
        self.driver.quote(value)
    }

    pub async fn prepare(&mut self, sql: &str) -> DbResult<Box<dyn PreparedStatement + '_>> {
        self.driver.prepare(sql).await
    }

    // ── builders ────────────────────────────────────────────────────────────

    /// Query builder over `table` in this connection's dialect.
    pub fn table(&self, table: &str) -> Builder {
        Builder::new(self.dialect()).from(table)
    }

    /// Query builder without a table.
    pub fn query(&self) -> Builder {
        Builder::new(self.dialect())
    }

    pub fn schema(&mut self) -> SchemaBuilder<'_> {
        SchemaBuilder::new(self)
    }

    // ── transactions ────────────────────────────────────────────────────────

    /// Current nesting level (0 = no transaction).
    pub fn transaction_level(&self) -> u32 {
        self.transactions.level()
    }

    pub fn in_transaction(&self) -> bool {
        self.transactions.in_transaction()
    }

    async fn run_step(&mut self, step: &TransactionStep) -> bool {
        let sql = grammar::for_dialect(self.dialect()).compile_transaction(step);
        let started = Instant::now();
        let result = self.driver.execute_unprepared(&sql).await;
        self.record(&sql, &[], started, result.as_ref().map(|_| ()));
        match result {
            Ok(()) => {
                tracing::debug!(target: "quarry.tx", sql = %sql, level = self.transactions.level(), "transaction step");
                true
            }
            Err(e) => {
                tracing::warn!(target: "quarry.tx", sql = %sql, error = %e, "transaction step failed");
                false
            }
        }
    }

    /// Begin a transaction, or a savepoint when one is already open.
    pub async fn begin_transaction(&mut self) -> bool {
        let step = self.transactions.begin_step();
        let ok = self.run_step(&step).await;
        if ok {
            self.transactions.entered();
        }
        ok
    }

    /// Commit the innermost level. Returns `false` when nothing is open.
    pub async fn commit(&mut self) -> bool {
        let Some(step) = self.transactions.commit_step() else {
            return false;
        };
        let ok = self.run_step(&step).await;
        if ok {
            self.transactions.left();
        }
        ok
    }

    /// Roll back the innermost level. Returns `false` when nothing is open.
    pub async fn rollback(&mut self) -> bool {
        let Some(step) = self.transactions.rollback_step() else {
            return false;
        };
        let ok = self.run_step(&step).await;
        if ok {
            self.transactions.left();
        }
        ok
    }

    /// Create a named savepoint inside the open transaction.
    ///
    /// Named savepoints do not change the nesting level. Names must be plain
    /// identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
    pub async fn savepoint(&mut self, name: &str) -> bool {
        if !self.savepoint_usable(name) {
            return false;
        }
        self.run_step(&TransactionStep::Savepoint(name.to_string())).await
    }

    pub async fn release_savepoint(&mut self, name: &str) -> bool {
        if !self.savepoint_usable(name) {
            return false;
        }
        self.run_step(&TransactionStep::Release(name.to_string())).await
    }

    pub async fn rollback_to_savepoint(&mut self, name: &str) -> bool {
        if !self.savepoint_usable(name) {
            return false;
        }
        self.run_step(&TransactionStep::RollbackTo(name.to_string())).await
    }

    /// Open transaction and a well-formed name; records `last_error` otherwise.
    fn savepoint_usable(&mut self, name: &str) -> bool {
        if !self.in_transaction() {
            self.last_error = Some("no open transaction".to_string());
            return false;
        }
        if !is_savepoint_name(name) {
            self.last_error = Some(format!("invalid savepoint name `{name}`"));
            return false;
        }
        true
    }
}

fn is_savepoint_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    async fn memory() -> Connection {
        Connection::connect(ConnectionConfig::sqlite_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn commit_without_transaction_is_false() {
        let mut conn = memory().await;
        assert!(!conn.commit().await);
        assert!(!conn.rollback().await);
        assert_eq!(conn.transaction_level(), 0);
    }

    #[tokio::test]
    async fn query_log_records_bindings() {
        let mut conn = memory().await;
        conn.enable_query_log();
        conn.select("select ? as v", &[Value::Int(7)]).await.unwrap();
        let log = conn.query_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sql, "select ? as v");
        assert_eq!(log[0].bindings, vec![Value::Int(7)]);
        conn.flush_query_log();
        assert!(conn.query_log().is_empty());
    }

    #[tokio::test]
    async fn failed_statement_sets_last_error() {
        let mut conn = memory().await;
        assert!(conn.select("selec 1", &[]).await.is_err());
        assert!(conn.last_error().is_some());
        conn.select("select 1", &[]).await.unwrap();
        assert!(conn.last_error().is_none());
    }

    #[tokio::test]
    async fn reconnect_resets_level() {
        let mut conn = memory().await;
        assert!(conn.begin_transaction().await);
        assert!(conn.reconnect().await);
        assert_eq!(conn.transaction_level(), 0);
        assert!(conn.ping().await);
    }

    #[tokio::test]
    async fn named_savepoint_requires_transaction() {
        let mut conn = memory().await;
        assert!(!conn.savepoint("before_items").await);
        assert!(conn.begin_transaction().await);
        assert!(conn.savepoint("before_items").await);
        assert!(conn.rollback_to_savepoint("before_items").await);
        assert!(conn.commit().await);
    }

    #[tokio::test]
    async fn savepoint_names_must_be_identifiers() {
        let mut conn = memory().await;
        assert!(conn.begin_transaction().await);
        conn.enable_query_log();
        assert!(!conn.savepoint("x; drop table t").await);
        assert!(conn.last_error().is_some_and(|e| e.contains("invalid savepoint name")));
        assert!(!conn.release_savepoint("1abc").await);
        assert!(conn.query_log().is_empty());
        assert!(conn.savepoint("_step_2").await);
        assert!(conn.commit().await);
    }

    #[tokio::test]
    async fn savepoint_macro_reports_failed_release() {
        let mut conn = memory().await;
        assert!(conn.begin_transaction().await);
        let result = crate::savepoint!(conn, "work", {
            assert!(conn.release_savepoint("work").await);
            Ok::<_, DbError>(1)
        });
        assert!(matches!(result, Err(DbError::Transaction(_))), "{result:?}");
        assert!(conn.rollback().await);
    }
}
