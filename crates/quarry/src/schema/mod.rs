//! DDL: blueprints, per-dialect schema grammars and the connection-bound
//! [`SchemaBuilder`].
//!
//! A [`Blueprint`] can also be compiled offline:
//!
//! ```
//! use quarry::schema::{Blueprint, grammar};
//! use quarry::Dialect;
//!
//! let mut table = Blueprint::new("posts");
//! table.create();
//! table.id();
//! table.string("title", 0);
//!
//! let sql = table.to_sql(grammar::for_dialect(Dialect::Postgres)).unwrap();
//! assert_eq!(
//!     sql,
//!     vec![r#"create table "posts" ("id" bigserial not null primary key, "title" varchar(255) not null)"#]
//! );
//! ```

pub mod blueprint;
pub mod builder;
pub mod column;
pub mod command;
pub mod grammar;

pub use blueprint::Blueprint;
pub use builder::SchemaBuilder;
pub use column::{ColumnDefinition, ColumnType};
pub use command::{Command, ForeignKeyDefinition, IndexCommand, IndexKind};
pub use grammar::{MySqlSchemaGrammar, PostgresSchemaGrammar, SchemaGrammar, SqliteSchemaGrammar};

#[cfg(test)]
mod tests;
