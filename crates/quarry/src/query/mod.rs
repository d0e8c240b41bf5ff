//! Fluent query builder and its per-dialect SQL compiler.
//!
//! # Example
//!
//! ```ignore
//! use quarry::{Connection, ConnectionConfig};
//!
//! let mut conn = Connection::connect(ConnectionConfig::sqlite_memory()).await?;
//! let rows = conn
//!     .table("users")
//!     .where_op("age", ">", 18)
//!     .or_where_nested(|q| q.where_eq("role", "admin").where_null("banned_at"))
//!     .order_by_desc("created_at")
//!     .limit(10)
//!     .get(&mut conn)
//!     .await?;
//! ```

pub mod bindings;
pub mod builder;
pub mod clause;
pub mod exec;
pub mod grammar;

pub use bindings::{BindingKind, Bindings};
pub use builder::Builder;
pub use clause::{Boolean, Direction, JoinClause, JoinType, Lock, OPERATORS};
pub use exec::{DEFAULT_CURSOR_BATCH, Page};
pub use grammar::{MySqlGrammar, PostgresGrammar, QueryGrammar, SqliteGrammar};
