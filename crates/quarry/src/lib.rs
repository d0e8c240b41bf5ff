//! # quarry
//!
//! A relational database layer over PostgreSQL, MySQL and SQLite.
//!
//! ## Features
//!
//! - **One connection type**: [`Connection`] wraps a per-engine [`Driver`] and adds
//!   nested transactions (savepoints), query logging and reconnects
//! - **Fluent query builder**: [`Builder`] compiles to parameterized SQL for each
//!   dialect; bindings always line up with the `?` placeholders
//! - **Schema blueprints**: describe tables once, get engine-specific DDL through
//!   [`SchemaBuilder`]
//! - **No globals**: every operation takes the connection explicitly
//!
//! ## Example
//!
//! ```ignore
//! use quarry::{Connection, ConnectionConfig, Record};
//!
//! let mut conn = Connection::connect(ConnectionConfig::sqlite_memory()).await?;
//!
//! conn.schema()
//!     .create("products", |t| {
//!         t.id();
//!         t.string("name", 0);
//!         t.integer("stock").default(0);
//!     })
//!     .await?;
//!
//! let id = conn
//!     .table("products")
//!     .insert_get_id(&mut conn, &Record::new().set("name", "bolt").set("stock", 10), None)
//!     .await?;
//!
//! conn.begin_transaction().await;
//! let row = conn
//!     .table("products")
//!     .where_eq("id", id)
//!     .lock_for_update()
//!     .first(&mut conn)
//!     .await?;
//! conn.table("products").where_eq("id", id).decrement(&mut conn, "stock", 3).await?;
//! conn.commit().await;
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod query;
pub mod result;
pub mod schema;
pub mod transaction;
pub mod value;

pub use config::{ConnectionConfig, Dialect, SslMode};
pub use connection::{Connection, LoggedQuery};
pub use driver::{Driver, PreparedStatement};
pub use error::{DbError, DbResult};
pub use query::{Boolean, Builder, Direction, JoinClause, JoinType, Lock, Page};
pub use result::{FromRow, FromValue, ResultSet, Row};
pub use schema::{Blueprint, ColumnDefinition, SchemaBuilder};
pub use transaction::{TransactionState, TransactionStep};
pub use value::{Expression, Record, Value, raw};
