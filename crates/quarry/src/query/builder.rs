//! Fluent SELECT / INSERT / UPDATE / DELETE builder.
//!
//! A [`Builder`] is a plain value: every fluent method consumes it and returns
//! the updated builder, and `clone()` is a deep copy (nested sub-queries and
//! binding buckets included). Nothing touches the database until one of the
//! terminal methods in `exec.rs` is awaited with a [`Connection`](crate::Connection).

use super::bindings::{BindingKind, Bindings};
use super::clause::{
    Aggregate, Boolean, ColumnRef, Direction, JoinClause, JoinType, Lock, Order, TableRef, Union,
    Where, is_operator,
};
use super::grammar::{self, QueryGrammar};
use crate::config::Dialect;
use crate::error::DbResult;
use crate::value::Value;

/// Query builder for one dialect.
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) dialect: Dialect,
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) columns: Vec<ColumnRef>,
    pub(crate) distinct: bool,
    pub(crate) from: Option<TableRef>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<Where>,
    pub(crate) groups: Vec<ColumnRef>,
    pub(crate) havings: Vec<Where>,
    pub(crate) orders: Vec<Order>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) unions: Vec<Union>,
    pub(crate) union_orders: Vec<Order>,
    pub(crate) union_limit: Option<u64>,
    pub(crate) union_offset: Option<u64>,
    pub(crate) lock: Option<Lock>,
    pub(crate) bindings: Bindings,
    pub(crate) build_error: Option<String>,
}

impl Builder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            aggregate: None,
            columns: Vec::new(),
            distinct: false,
            from: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            unions: Vec::new(),
            union_orders: Vec::new(),
            union_limit: None,
            union_offset: None,
            lock: None,
            bindings: Bindings::new(),
            build_error: None,
        }
    }

    /// Builder over `table`.
    pub fn table(dialect: Dialect, table: &str) -> Self {
        Self::new(dialect).from(table)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn grammar(&self) -> &'static dyn QueryGrammar {
        grammar::for_dialect(self.dialect)
    }

    /// Empty builder in the same dialect.
    pub(crate) fn new_query(&self) -> Builder {
        Builder::new(self.dialect)
    }

    /// Empty builder over the same table, used for nested where groups.
    fn new_nested_query(&self) -> Builder {
        let mut query = self.new_query();
        query.from = self.from.clone();
        query
    }

    /// Record the first misuse; it is reported by terminal methods.
    pub(crate) fn fail(mut self, message: impl Into<String>) -> Self {
        if self.build_error.is_none() {
            self.build_error = Some(message.into());
        }
        self
    }

    fn absorb_error(&mut self, other: &Builder) {
        if self.build_error.is_none() {
            self.build_error.clone_from(&other.build_error);
        }
    }

    /// Compile a sub-query with this builder's grammar.
    fn create_sub(&mut self, query: &Builder) -> (String, Vec<Value>) {
        self.absorb_error(query);
        (self.grammar().compile_select(query), query.get_bindings())
    }

    // ── columns ─────────────────────────────────────────────────────────────

    /// Replace the selected columns.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| ColumnRef::Name(c.to_string())).collect();
        self.bindings.clear(BindingKind::Select);
        self
    }

    pub fn add_select(mut self, columns: &[&str]) -> Self {
        self.columns
            .extend(columns.iter().map(|c| ColumnRef::Name(c.to_string())));
        self
    }

    /// Add a raw select expression with its bindings.
    pub fn select_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.columns.push(ColumnRef::Raw(sql.to_string()));
        self.bindings.extend(BindingKind::Select, &bindings);
        self
    }

    /// Add `(sub-select) as alias`.
    pub fn select_sub(mut self, query: Builder, alias: &str) -> Self {
        let (sql, bindings) = self.create_sub(&query);
        let alias = self.grammar().wrap(alias);
        self.columns.push(ColumnRef::Raw(format!("({sql}) as {alias}")));
        self.bindings.extend(BindingKind::Select, &bindings);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ── from ────────────────────────────────────────────────────────────────

    /// Set the table (`"users"` or `"users as u"`).
    pub fn from(mut self, table: &str) -> Self {
        self.from = Some(TableRef::Name(table.to_string()));
        self
    }

    /// Select from `(sub-select) as alias`.
    pub fn from_sub(mut self, query: Builder, alias: &str) -> Self {
        let (sql, bindings) = self.create_sub(&query);
        let alias = self.grammar().wrap_table(alias);
        self.from = Some(TableRef::Raw(format!("({sql}) as {alias}")));
        self.bindings.set(BindingKind::From, bindings);
        self
    }

    pub fn from_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.from = Some(TableRef::Raw(sql.to_string()));
        self.bindings.set(BindingKind::From, bindings);
        self
    }

    // ── joins ───────────────────────────────────────────────────────────────

    /// `inner join table on first op second`.
    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join_with(table, JoinType::Inner, |j| j.on(first, operator, second))
    }

    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join_with(table, JoinType::Left, |j| j.on(first, operator, second))
    }

    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join_with(table, JoinType::Right, |j| j.on(first, operator, second))
    }

    pub fn cross_join(mut self, table: &str) -> Self {
        let clause = JoinClause::new(JoinType::Cross, TableRef::Name(table.to_string()), &self);
        self.joins.push(clause);
        self
    }

    /// Join with conditions built by `f`.
    pub fn join_with(
        mut self,
        table: &str,
        kind: JoinType,
        f: impl FnOnce(JoinClause) -> JoinClause,
    ) -> Self {
        let clause = f(JoinClause::new(kind, TableRef::Name(table.to_string()), &self));
        self.push_join(clause);
        self
    }

    /// Join on a column compared with a bound value.
    pub fn join_where(
        self,
        table: &str,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.join_with(table, JoinType::Inner, |j| j.where_op(column, operator, value))
    }

    /// Join against `(sub-select) as alias`.
    pub fn join_sub(
        mut self,
        query: Builder,
        alias: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Self {
        let (sql, bindings) = self.create_sub(&query);
        let table = TableRef::Raw(format!("({sql}) as {}", self.grammar().wrap_table(alias)));
        self.bindings.extend(BindingKind::Join, &bindings);
        let clause = JoinClause::new(JoinType::Inner, table, &self).on(first, operator, second);
        self.push_join(clause);
        self
    }

    fn push_join(&mut self, clause: JoinClause) {
        self.absorb_error(&clause.query);
        self.bindings.extend(BindingKind::Join, &clause.bindings());
        self.joins.push(clause);
    }

    // ── where ───────────────────────────────────────────────────────────────

    /// `column = value`.
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_where_op(column, "=", value.into(), Boolean::And)
    }

    pub fn or_where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_where_op(column, "=", value.into(), Boolean::Or)
    }

    /// `column operator value`.
    ///
    /// An unrecognized operator is taken as the value of an `=` comparison, and
    /// a NULL value turns into `is null` (`is not null` for `!=` / `<>`).
    pub fn where_op(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_where_op(column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_op(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_where_op(column, operator, value.into(), Boolean::Or)
    }

    fn add_where_op(mut self, column: &str, operator: &str, value: Value, boolean: Boolean) -> Self {
        let (operator, value) = match prepare_value_and_operator(operator, value) {
            Ok(pair) => pair,
            Err(message) => return self.fail(message),
        };

        if value.is_null() {
            let not = operator == "!=" || operator == "<>";
            return self.add_null(column, not, boolean);
        }

        self.bindings.push(BindingKind::Where, &value);
        self.wheres.push(Where::Basic {
            column: column.to_string(),
            operator,
            value,
            boolean,
        });
        self
    }

    /// `first operator second` column comparison.
    pub fn where_column(mut self, first: &str, operator: &str, second: &str) -> Self {
        self.wheres.push(Where::Column {
            first: first.to_string(),
            operator: operator.to_string(),
            second: second.to_string(),
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_where_column(mut self, first: &str, operator: &str, second: &str) -> Self {
        self.wheres.push(Where::Column {
            first: first.to_string(),
            operator: operator.to_string(),
            second: second.to_string(),
            boolean: Boolean::Or,
        });
        self
    }

    /// `column in (...)`; an empty list compiles to an always-false predicate.
    pub fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_in(column, values.into_iter().map(Into::into).collect(), false, Boolean::And)
    }

    pub fn or_where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_in(column, values.into_iter().map(Into::into).collect(), false, Boolean::Or)
    }

    /// `column not in (...)`; an empty list compiles to an always-true predicate.
    pub fn where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_in(column, values.into_iter().map(Into::into).collect(), true, Boolean::And)
    }

    pub fn or_where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_in(column, values.into_iter().map(Into::into).collect(), true, Boolean::Or)
    }

    fn add_in(mut self, column: &str, values: Vec<Value>, not: bool, boolean: Boolean) -> Self {
        self.bindings.extend(BindingKind::Where, &values);
        let column = column.to_string();
        self.wheres.push(if not {
            Where::NotIn { column, values, boolean }
        } else {
            Where::In { column, values, boolean }
        });
        self
    }

    /// `column in (sub-select)`.
    pub fn where_in_sub(self, column: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_in_sub(column, f, false, Boolean::And)
    }

    pub fn or_where_in_sub(self, column: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_in_sub(column, f, false, Boolean::Or)
    }

    pub fn where_not_in_sub(self, column: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_in_sub(column, f, true, Boolean::And)
    }

    pub fn or_where_not_in_sub(self, column: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_in_sub(column, f, true, Boolean::Or)
    }

    fn add_in_sub(
        mut self,
        column: &str,
        f: impl FnOnce(Builder) -> Builder,
        not: bool,
        boolean: Boolean,
    ) -> Self {
        let query = f(self.new_query());
        self.absorb_error(&query);
        self.bindings.extend(BindingKind::Where, &query.get_bindings());
        self.wheres.push(Where::InSub {
            column: column.to_string(),
            query: Box::new(query),
            not,
            boolean,
        });
        self
    }

    pub fn where_null(self, column: &str) -> Self {
        self.add_null(column, false, Boolean::And)
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.add_null(column, false, Boolean::Or)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.add_null(column, true, Boolean::And)
    }

    pub fn or_where_not_null(self, column: &str) -> Self {
        self.add_null(column, true, Boolean::Or)
    }

    fn add_null(mut self, column: &str, not: bool, boolean: Boolean) -> Self {
        let column = column.to_string();
        self.wheres.push(if not {
            Where::NotNull { column, boolean }
        } else {
            Where::Null { column, boolean }
        });
        self
    }

    pub fn where_between(self, column: &str, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.add_between(column, min.into(), max.into(), false, Boolean::And)
    }

    pub fn or_where_between(self, column: &str, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.add_between(column, min.into(), max.into(), false, Boolean::Or)
    }

    pub fn where_not_between(self, column: &str, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.add_between(column, min.into(), max.into(), true, Boolean::And)
    }

    pub fn or_where_not_between(self, column: &str, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.add_between(column, min.into(), max.into(), true, Boolean::Or)
    }

    fn add_between(mut self, column: &str, min: Value, max: Value, not: bool, boolean: Boolean) -> Self {
        self.bindings.push(BindingKind::Where, &min);
        self.bindings.push(BindingKind::Where, &max);
        let column = column.to_string();
        self.wheres.push(if not {
            Where::NotBetween { column, min, max, boolean }
        } else {
            Where::Between { column, min, max, boolean }
        });
        self
    }

    /// Parenthesized group: `(a = ? or b = ?)`.
    pub fn where_nested(self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let nested = f(self.new_nested_query());
        self.add_nested(nested, Boolean::And)
    }

    pub fn or_where_nested(self, f: impl FnOnce(Builder) -> Builder) -> Self {
        let nested = f(self.new_nested_query());
        self.add_nested(nested, Boolean::Or)
    }

    /// Add another builder's wheres as one group. Empty groups are dropped.
    pub(crate) fn add_nested(mut self, query: Builder, boolean: Boolean) -> Self {
        self.absorb_error(&query);
        if query.wheres.is_empty() {
            return self;
        }
        self.bindings
            .extend(BindingKind::Where, query.bindings.get(BindingKind::Where));
        self.wheres.push(Where::Nested {
            query: Box::new(query),
            boolean,
        });
        self
    }

    /// `exists (sub-select)`.
    pub fn where_exists(self, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_exists(f, false, Boolean::And)
    }

    pub fn or_where_exists(self, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_exists(f, false, Boolean::Or)
    }

    pub fn where_not_exists(self, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_exists(f, true, Boolean::And)
    }

    fn add_exists(mut self, f: impl FnOnce(Builder) -> Builder, not: bool, boolean: Boolean) -> Self {
        let query = f(self.new_query());
        self.absorb_error(&query);
        self.bindings.extend(BindingKind::Where, &query.get_bindings());
        self.wheres.push(Where::Exists {
            query: Box::new(query),
            not,
            boolean,
        });
        self
    }

    /// `column operator (sub-select)`, typically a correlated sub-query.
    pub fn where_sub(self, column: &str, operator: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_sub(column, operator, f, Boolean::And)
    }

    pub fn or_where_sub(self, column: &str, operator: &str, f: impl FnOnce(Builder) -> Builder) -> Self {
        self.add_sub(column, operator, f, Boolean::Or)
    }

    fn add_sub(
        mut self,
        column: &str,
        operator: &str,
        f: impl FnOnce(Builder) -> Builder,
        boolean: Boolean,
    ) -> Self {
        if !is_operator(operator) {
            return self.fail(format!("invalid operator `{operator}` for sub-query predicate"));
        }
        let query = f(self.new_query());
        self.absorb_error(&query);
        self.bindings.extend(BindingKind::Where, &query.get_bindings());
        self.wheres.push(Where::Subquery {
            column: column.to_string(),
            operator: operator.trim().to_string(),
            query: Box::new(query),
            boolean,
        });
        self
    }

    /// Raw predicate with its own bindings.
    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.add_raw_where(sql, bindings, Boolean::And)
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.add_raw_where(sql, bindings, Boolean::Or)
    }

    fn add_raw_where(mut self, sql: &str, bindings: Vec<Value>, boolean: Boolean) -> Self {
        self.bindings.extend(BindingKind::Where, &bindings);
        self.wheres.push(Where::Raw {
            sql: sql.to_string(),
            boolean,
        });
        self
    }

    /// JSON document at `column` contains `value`.
    pub fn where_json_contains(self, column: &str, value: serde_json::Value) -> Self {
        self.add_json_contains(column, value, false)
    }

    pub fn where_json_doesnt_contain(self, column: &str, value: serde_json::Value) -> Self {
        self.add_json_contains(column, value, true)
    }

    fn add_json_contains(mut self, column: &str, value: serde_json::Value, not: bool) -> Self {
        if !self.grammar().supports_json_contains() {
            let dialect = self.dialect.name();
            return self.fail(format!("{dialect} does not support JSON contains predicates"));
        }
        let value = Value::Text(value.to_string());
        self.bindings.push(BindingKind::Where, &value);
        self.wheres.push(Where::JsonContains {
            column: column.to_string(),
            value,
            not,
            boolean: Boolean::And,
        });
        self
    }

    /// Full-text match of `value` over `columns`.
    pub fn where_full_text(self, columns: &[&str], value: &str) -> Self {
        self.add_full_text(columns, value, Boolean::And)
    }

    pub fn or_where_full_text(self, columns: &[&str], value: &str) -> Self {
        self.add_full_text(columns, value, Boolean::Or)
    }

    fn add_full_text(mut self, columns: &[&str], value: &str, boolean: Boolean) -> Self {
        if !self.grammar().supports_full_text() {
            let dialect = self.dialect.name();
            return self.fail(format!("{dialect} does not support full-text search"));
        }
        let value = Value::Text(value.to_string());
        self.bindings.push(BindingKind::Where, &value);
        self.wheres.push(Where::FullText {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            value,
            boolean,
        });
        self
    }

    // ── group / having ──────────────────────────────────────────────────────

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.groups
            .extend(columns.iter().map(|c| ColumnRef::Name(c.to_string())));
        self
    }

    pub fn group_by_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.groups.push(ColumnRef::Raw(sql.to_string()));
        self.bindings.extend(BindingKind::GroupBy, &bindings);
        self
    }

    pub fn having(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_having(column, operator, value.into(), Boolean::And)
    }

    pub fn or_having(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_having(column, operator, value.into(), Boolean::Or)
    }

    fn add_having(mut self, column: &str, operator: &str, value: Value, boolean: Boolean) -> Self {
        let (operator, value) = match prepare_value_and_operator(operator, value) {
            Ok(pair) => pair,
            Err(message) => return self.fail(message),
        };
        if value.is_null() {
            let column = column.to_string();
            self.havings.push(if operator == "!=" || operator == "<>" {
                Where::NotNull { column, boolean }
            } else {
                Where::Null { column, boolean }
            });
            return self;
        }
        self.bindings.push(BindingKind::Having, &value);
        self.havings.push(Where::Basic {
            column: column.to_string(),
            operator,
            value,
            boolean,
        });
        self
    }

    pub fn having_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.add_having_raw(sql, bindings, Boolean::And)
    }

    pub fn or_having_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.add_having_raw(sql, bindings, Boolean::Or)
    }

    fn add_having_raw(mut self, sql: &str, bindings: Vec<Value>, boolean: Boolean) -> Self {
        self.bindings.extend(BindingKind::Having, &bindings);
        self.havings.push(Where::Raw {
            sql: sql.to_string(),
            boolean,
        });
        self
    }

    pub fn having_between(mut self, column: &str, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        let (min, max) = (min.into(), max.into());
        self.bindings.push(BindingKind::Having, &min);
        self.bindings.push(BindingKind::Having, &max);
        self.havings.push(Where::Between {
            column: column.to_string(),
            min,
            max,
            boolean: Boolean::And,
        });
        self
    }

    // ── order / limit ───────────────────────────────────────────────────────

    /// Orders added after a union apply to the whole compound query.
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        let order = Order::Column {
            column: column.to_string(),
            direction,
        };
        if self.unions.is_empty() {
            self.orders.push(order);
        } else {
            self.union_orders.push(order);
        }
        self
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    pub fn order_by_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        if self.unions.is_empty() {
            self.orders.push(Order::Raw(sql.to_string()));
            self.bindings.extend(BindingKind::Order, &bindings);
        } else {
            self.union_orders.push(Order::Raw(sql.to_string()));
            self.bindings.extend(BindingKind::UnionOrder, &bindings);
        }
        self
    }

    /// Newest first by `column`.
    pub fn latest(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Oldest first by `column`.
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column, Direction::Asc)
    }

    pub fn in_random_order(self) -> Self {
        let random = self.grammar().compile_random();
        self.order_by_raw(&random, Vec::new())
    }

    /// Drop every order clause and its bindings.
    pub fn reorder(mut self) -> Self {
        self.orders.clear();
        self.union_orders.clear();
        self.bindings.clear(BindingKind::Order);
        self.bindings.clear(BindingKind::UnionOrder);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        if self.unions.is_empty() {
            self.limit = Some(limit);
        } else {
            self.union_limit = Some(limit);
        }
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        if self.unions.is_empty() {
            self.offset = Some(offset);
        } else {
            self.union_offset = Some(offset);
        }
        self
    }

    /// Limit/offset for a 1-based page number.
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        self.offset(page.max(1).saturating_sub(1) * per_page)
            .limit(per_page)
    }

    // ── unions ──────────────────────────────────────────────────────────────

    pub fn union(self, query: Builder) -> Self {
        self.add_union(query, false)
    }

    pub fn union_all(self, query: Builder) -> Self {
        self.add_union(query, true)
    }

    fn add_union(mut self, query: Builder, all: bool) -> Self {
        self.absorb_error(&query);
        self.bindings.extend(BindingKind::Union, &query.get_bindings());
        self.unions.push(Union {
            query: Box::new(query),
            all,
        });
        self
    }

    // ── locks ───────────────────────────────────────────────────────────────

    pub fn lock_for_update(self) -> Self {
        self.lock(Lock::ForUpdate)
    }

    pub fn shared_lock(self) -> Self {
        self.lock(Lock::Shared)
    }

    pub fn lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }

    // ── bindings / compilation ──────────────────────────────────────────────

    /// Append a binding to the bucket named `bucket` (`"where"`, `"groupBy"`, ...).
    pub fn add_binding(mut self, value: impl Into<Value>, bucket: &str) -> DbResult<Self> {
        let kind: BindingKind = bucket.parse()?;
        self.bindings.push(kind, &value.into());
        Ok(self)
    }

    pub fn add_binding_to(mut self, kind: BindingKind, value: impl Into<Value>) -> Self {
        self.bindings.push(kind, &value.into());
        self
    }

    /// Bindings in placeholder order.
    pub fn get_bindings(&self) -> Vec<Value> {
        self.bindings.flatten()
    }

    pub fn raw_bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Compiled SELECT.
    pub fn to_sql(&self) -> String {
        self.grammar().compile_select(self)
    }

    /// Compiled SELECT with bindings interpolated as literals. For debugging only.
    pub fn to_raw_sql(&self) -> String {
        grammar::interpolate(&self.to_sql(), &self.get_bindings())
    }

    pub(crate) fn set_aggregate(mut self, function: &str, columns: &[&str]) -> Self {
        self.aggregate = Some(Aggregate {
            function: function.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        if self.groups.is_empty() {
            self.orders.clear();
            self.bindings.clear(BindingKind::Order);
        }
        self
    }

    pub(crate) fn table_name(&self) -> Option<&str> {
        match &self.from {
            Some(TableRef::Name(name)) => Some(name),
            _ => None,
        }
    }
}

/// Normalize a `where` / `having` operator and value.
///
/// Returns an error message for a NULL value compared with anything other than
/// `=`, `!=` or `<>`.
fn prepare_value_and_operator(operator: &str, value: Value) -> Result<(String, Value), String> {
    if !is_operator(operator) {
        return Ok(("=".to_string(), Value::Text(operator.to_string())));
    }
    let operator = operator.trim().to_string();
    if value.is_null() && !matches!(operator.as_str(), "=" | "!=" | "<>") {
        return Err(format!("illegal operator `{operator}` for a NULL value"));
    }
    Ok((operator, value))
}
