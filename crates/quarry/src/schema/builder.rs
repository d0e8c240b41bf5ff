//! Schema operations bound to a live connection.

use super::blueprint::Blueprint;
use super::grammar::{self, SchemaGrammar};
use crate::config::Dialect;
use crate::connection::Connection;
use crate::error::{DbError, DbResult};
use crate::value::Value;

/// Runs blueprints and catalog queries on a borrowed [`Connection`].
///
/// Statements run one after another with no implicit transaction; a failure
/// leaves earlier statements applied.
///
/// ```no_run
/// # async fn demo(conn: &mut quarry::Connection) -> quarry::DbResult<()> {
/// conn.schema()
///     .create("users", |table| {
///         table.id();
///         table.string("email", 0).unique();
///         table.timestamps();
///     })
///     .await?;
/// assert!(conn.schema().has_column("users", "EMAIL").await?);
/// # Ok(())
/// # }
/// ```
pub struct SchemaBuilder<'c> {
    conn: &'c mut Connection,
}

impl<'c> SchemaBuilder<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }

    fn grammar(&self) -> &'static dyn SchemaGrammar {
        grammar::for_dialect(self.conn.dialect())
    }

    /// Create `table` from the columns and commands added by `f`.
    pub async fn create(&mut self, table: &str, f: impl FnOnce(&mut Blueprint)) -> DbResult<()> {
        let mut blueprint = Blueprint::new(table);
        blueprint.create();
        f(&mut blueprint);
        if self.conn.dialect() == Dialect::MySql {
            let config = self.conn.config();
            if blueprint.charset.is_none() {
                blueprint.charset = config.charset.clone();
            }
            if blueprint.collation.is_none() {
                blueprint.collation = config.collation.clone();
            }
        }
        self.build(blueprint).await
    }

    /// Alter an existing `table`.
    pub async fn table(&mut self, table: &str, f: impl FnOnce(&mut Blueprint)) -> DbResult<()> {
        let mut blueprint = Blueprint::new(table);
        f(&mut blueprint);
        self.build(blueprint).await
    }

    pub async fn drop(&mut self, table: &str) -> DbResult<()> {
        let mut blueprint = Blueprint::new(table);
        blueprint.drop();
        self.build(blueprint).await
    }

    pub async fn drop_if_exists(&mut self, table: &str) -> DbResult<()> {
        let mut blueprint = Blueprint::new(table);
        blueprint.drop_if_exists();
        self.build(blueprint).await
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> DbResult<()> {
        let mut blueprint = Blueprint::new(from);
        blueprint.rename(to);
        self.build(blueprint).await
    }

    /// Compile `blueprint` and run its statements in order.
    pub async fn build(&mut self, blueprint: Blueprint) -> DbResult<()> {
        let statements = blueprint.to_sql(self.grammar())?;
        tracing::debug!(
            target: "quarry.schema",
            table = %blueprint.table(),
            statements = statements.len(),
            "applying blueprint"
        );
        for sql in &statements {
            self.conn.statement(sql, &[]).await?;
        }
        Ok(())
    }

    // ── introspection ───────────────────────────────────────────────────────

    pub async fn has_table(&mut self, table: &str) -> DbResult<bool> {
        let schema = self.catalog_schema();
        let (sql, bindings) = self.grammar().compile_table_exists(schema.as_deref(), table);
        let value = self.catalog_scalar(&sql, &bindings).await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Case-insensitive column check.
    pub async fn has_column(&mut self, table: &str, column: &str) -> DbResult<bool> {
        self.has_columns(table, &[column]).await
    }

    /// `true` when every one of `columns` exists (case-insensitive).
    pub async fn has_columns(&mut self, table: &str, columns: &[&str]) -> DbResult<bool> {
        let listing: Vec<String> = self
            .get_column_listing(table)
            .await?
            .into_iter()
            .map(|c| c.to_lowercase())
            .collect();
        Ok(columns
            .iter()
            .all(|c| listing.contains(&c.to_lowercase())))
    }

    /// Column names of `table` in table order; empty for a missing table.
    pub async fn get_column_listing(&mut self, table: &str) -> DbResult<Vec<String>> {
        let schema = self.catalog_schema();
        let (sql, bindings) = self.grammar().compile_column_listing(schema.as_deref(), table);
        let rows = self
            .conn
            .select(&sql, &bindings)
            .await
            .map_err(|e| introspection_error(table, e))?;
        rows.iter()
            .map(|row| {
                row.get_index(0)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        DbError::SchemaIntrospection(format!(
                            "column listing for `{table}` returned a non-text name"
                        ))
                    })
            })
            .collect()
    }

    pub async fn enable_foreign_key_constraints(&mut self) -> DbResult<bool> {
        let sql = self.grammar().compile_enable_foreign_key_constraints();
        self.conn.statement(&sql, &[]).await
    }

    pub async fn disable_foreign_key_constraints(&mut self) -> DbResult<bool> {
        let sql = self.grammar().compile_disable_foreign_key_constraints();
        self.conn.statement(&sql, &[]).await
    }

    /// Configured PG search schema; other engines use the current database.
    fn catalog_schema(&self) -> Option<String> {
        match self.conn.dialect() {
            Dialect::Postgres => self.conn.config().schema.clone(),
            Dialect::MySql | Dialect::Sqlite => None,
        }
    }

    async fn catalog_scalar(&mut self, sql: &str, bindings: &[Value]) -> DbResult<Option<Value>> {
        self.conn
            .scalar(sql, bindings)
            .await
            .map_err(|e| introspection_error(sql, e))
    }
}

fn introspection_error(subject: &str, error: DbError) -> DbError {
    tracing::warn!(target: "quarry.schema", subject = %subject, error = %error, "catalog query failed");
    DbError::SchemaIntrospection(error.to_string())
}
