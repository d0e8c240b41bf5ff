//! Schema grammar: compiles a [`Blueprint`] into DDL.
//!
//! Every command yields zero or more statements; the builder runs them in
//! order without an implicit transaction.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlSchemaGrammar;
pub use postgres::PostgresSchemaGrammar;
pub use sqlite::SqliteSchemaGrammar;

use super::blueprint::Blueprint;
use super::column::ColumnDefinition;
use super::command::{Command, ForeignKeyDefinition, IndexCommand, IndexKind};
use crate::config::Dialect;
use crate::error::{DbError, DbResult};
use crate::query::grammar::{self as query_grammar, QueryGrammar};
use crate::value::Value;

static POSTGRES: PostgresSchemaGrammar = PostgresSchemaGrammar;
static MYSQL: MySqlSchemaGrammar = MySqlSchemaGrammar;
static SQLITE: SqliteSchemaGrammar = SqliteSchemaGrammar;

pub fn for_dialect(dialect: Dialect) -> &'static dyn SchemaGrammar {
    match dialect {
        Dialect::Postgres => &POSTGRES,
        Dialect::MySql => &MYSQL,
        Dialect::Sqlite => &SQLITE,
    }
}

pub trait SchemaGrammar: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Identifier quoting shared with the query grammar.
    fn query_grammar(&self) -> &'static dyn QueryGrammar {
        query_grammar::for_dialect(self.dialect())
    }

    fn wrap(&self, value: &str) -> String {
        self.query_grammar().wrap(value)
    }

    fn wrap_table(&self, table: &str) -> String {
        self.query_grammar().wrap_table(table)
    }

    fn columnize(&self, columns: &[String]) -> String {
        self.query_grammar().columnize(columns)
    }

    /// Native type of `column`.
    fn type_sql(&self, column: &ColumnDefinition) -> DbResult<String>;

    /// Modifier suffix (`not null`, `default ...`, ...) in engine order.
    fn modifiers(&self, blueprint: &Blueprint, column: &ColumnDefinition) -> DbResult<String>;

    /// `"name" type modifiers`.
    fn column_sql(&self, blueprint: &Blueprint, column: &ColumnDefinition) -> DbResult<String> {
        Ok(format!(
            "{} {}{}",
            self.wrap(&column.name),
            self.type_sql(column)?,
            self.modifiers(blueprint, column)?
        ))
    }

    fn added_column_sql(&self, blueprint: &Blueprint) -> DbResult<Vec<String>> {
        blueprint
            .added_columns()
            .map(|c| self.column_sql(blueprint, c))
            .collect()
    }

    /// Column default as SQL: raw expressions verbatim, everything else quoted.
    fn default_value(&self, value: &Value) -> String {
        match value {
            Value::Raw(expr) => expr.sql().to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => if *b { "'1'" } else { "'0'" }.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            other => format!("'{other}'"),
        }
    }

    fn compile_command(
        &self,
        blueprint: &Blueprint,
        command: &Command,
        commands: &[Command],
    ) -> DbResult<Vec<String>> {
        match command {
            Command::Create => self.compile_create(blueprint, commands),
            Command::Add => self.compile_add(blueprint),
            Command::Change => self.compile_change(blueprint),
            Command::Index(index) => match index.kind {
                IndexKind::Primary => self.compile_primary(blueprint, index),
                IndexKind::Unique => self.compile_unique(blueprint, index),
                IndexKind::Index => self.compile_index(blueprint, index),
                IndexKind::Fulltext => self.compile_fulltext(blueprint, index),
            },
            Command::Foreign(foreign) => self.compile_foreign(blueprint, foreign),
            Command::DropColumn { columns } => self.compile_drop_column(blueprint, columns),
            Command::RenameColumn { from, to } => Ok(vec![format!(
                "alter table {} rename column {} to {}",
                self.wrap_table(blueprint.table()),
                self.wrap(from),
                self.wrap(to)
            )]),
            Command::DropPrimary { name } => self.compile_drop_primary(blueprint, name),
            Command::DropUnique { name } => self.compile_drop_unique(blueprint, name),
            Command::DropIndex { name } => self.compile_drop_index(blueprint, name),
            Command::DropForeign { name } => self.compile_drop_foreign(blueprint, name),
            Command::Rename { to } => self.compile_rename(blueprint, to),
            Command::Drop => Ok(vec![format!("drop table {}", self.wrap_table(blueprint.table()))]),
            Command::DropIfExists => Ok(vec![format!(
                "drop table if exists {}",
                self.wrap_table(blueprint.table())
            )]),
            Command::Comment { comment } => self.compile_table_comment(blueprint, comment),
        }
    }

    fn compile_create(&self, blueprint: &Blueprint, commands: &[Command]) -> DbResult<Vec<String>>;

    fn compile_add(&self, blueprint: &Blueprint) -> DbResult<Vec<String>>;

    fn compile_change(&self, blueprint: &Blueprint) -> DbResult<Vec<String>>;

    fn compile_primary(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} add primary key ({})",
            self.wrap_table(blueprint.table()),
            self.columnize(&index.columns)
        )])
    }

    fn compile_unique(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>>;

    fn compile_index(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>>;

    fn compile_fulltext(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>>;

    fn compile_foreign(&self, blueprint: &Blueprint, foreign: &ForeignKeyDefinition) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} add constraint {} {}",
            self.wrap_table(blueprint.table()),
            self.wrap(&foreign.name),
            self.foreign_key_clause(foreign)?
        )])
    }

    /// `foreign key (...) references "t" (...) [on delete ...] [on update ...]`.
    fn foreign_key_clause(&self, foreign: &ForeignKeyDefinition) -> DbResult<String> {
        if foreign.on.is_empty() {
            return Err(DbError::schema(format!(
                "foreign key `{}` has no referenced table (call `on`)",
                foreign.name
            )));
        }
        let mut sql = format!(
            "foreign key ({}) references {} ({})",
            self.columnize(&foreign.columns),
            self.wrap_table(&foreign.on),
            self.columnize(&foreign.references)
        );
        if let Some(action) = &foreign.on_delete {
            sql.push_str(&format!(" on delete {action}"));
        }
        if let Some(action) = &foreign.on_update {
            sql.push_str(&format!(" on update {action}"));
        }
        Ok(sql)
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> DbResult<Vec<String>>;

    fn compile_drop_primary(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>>;

    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>>;

    fn compile_drop_index(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>>;

    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>>;

    fn compile_table_comment(&self, blueprint: &Blueprint, comment: &str) -> DbResult<Vec<String>>;

    fn compile_rename(&self, blueprint: &Blueprint, to: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} rename to {}",
            self.wrap_table(blueprint.table()),
            self.wrap_table(to)
        )])
    }

    // ── introspection ───────────────────────────────────────────────────────

    /// Query returning one truthy scalar when `table` exists.
    fn compile_table_exists(&self, schema: Option<&str>, table: &str) -> (String, Vec<Value>);

    /// Query returning one row per column name of `table`, in table order.
    fn compile_column_listing(&self, schema: Option<&str>, table: &str) -> (String, Vec<Value>);

    fn compile_enable_foreign_key_constraints(&self) -> String;

    fn compile_disable_foreign_key_constraints(&self) -> String;
}

/// Quote a string literal for DDL (comments, enum members).
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn unsupported(dialect: Dialect, what: &str) -> DbError {
    DbError::schema(format!("{} does not support {what}", dialect.name()))
}
