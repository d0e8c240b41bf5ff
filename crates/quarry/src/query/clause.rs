//! Clause types held by a [`Builder`]: predicates, joins, orders, unions, locks.

use super::bindings::BindingKind;
use super::builder::Builder;
use crate::value::Value;

/// Comparison operators accepted by `where_op` / `having`.
///
/// Anything else passed as an operator is treated as the value of an `=`
/// comparison.
pub const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>", "like", "like binary", "not like", "ilike", "&",
    "|", "^", "<<", ">>", "&~", "rlike", "not rlike", "regexp", "not regexp", "~", "~*", "!~",
    "!~*", "similar to", "not similar to", "not ilike", "~~*", "!~~*", "@>", "<@",
];

pub fn is_operator(op: &str) -> bool {
    let op = op.trim();
    OPERATORS.iter().any(|known| known.eq_ignore_ascii_case(op))
}

/// Connector joining a predicate to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub fn as_str(self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
        }
    }
}

/// One WHERE / HAVING / join predicate.
#[derive(Debug, Clone)]
pub enum Where {
    Basic {
        column: String,
        operator: String,
        value: Value,
        boolean: Boolean,
    },
    Column {
        first: String,
        operator: String,
        second: String,
        boolean: Boolean,
    },
    In {
        column: String,
        values: Vec<Value>,
        boolean: Boolean,
    },
    NotIn {
        column: String,
        values: Vec<Value>,
        boolean: Boolean,
    },
    InSub {
        column: String,
        query: Box<Builder>,
        not: bool,
        boolean: Boolean,
    },
    Null {
        column: String,
        boolean: Boolean,
    },
    NotNull {
        column: String,
        boolean: Boolean,
    },
    Between {
        column: String,
        min: Value,
        max: Value,
        boolean: Boolean,
    },
    NotBetween {
        column: String,
        min: Value,
        max: Value,
        boolean: Boolean,
    },
    Nested {
        query: Box<Builder>,
        boolean: Boolean,
    },
    Exists {
        query: Box<Builder>,
        not: bool,
        boolean: Boolean,
    },
    Subquery {
        column: String,
        operator: String,
        query: Box<Builder>,
        boolean: Boolean,
    },
    Raw {
        sql: String,
        boolean: Boolean,
    },
    JsonContains {
        column: String,
        value: Value,
        not: bool,
        boolean: Boolean,
    },
    FullText {
        columns: Vec<String>,
        value: Value,
        boolean: Boolean,
    },
}

impl Where {
    pub fn boolean(&self) -> Boolean {
        match self {
            Where::Basic { boolean, .. }
            | Where::Column { boolean, .. }
            | Where::In { boolean, .. }
            | Where::NotIn { boolean, .. }
            | Where::InSub { boolean, .. }
            | Where::Null { boolean, .. }
            | Where::NotNull { boolean, .. }
            | Where::Between { boolean, .. }
            | Where::NotBetween { boolean, .. }
            | Where::Nested { boolean, .. }
            | Where::Exists { boolean, .. }
            | Where::Subquery { boolean, .. }
            | Where::Raw { boolean, .. }
            | Where::JsonContains { boolean, .. }
            | Where::FullText { boolean, .. } => *boolean,
        }
    }
}

/// A selected column or grouping key.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    Name(String),
    Raw(String),
}

/// FROM target.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Name(String),
    /// Pre-compiled sub-select or raw SQL, emitted verbatim.
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Column { column: String, direction: Direction },
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Union {
    pub query: Box<Builder>,
    pub all: bool,
}

/// Row locking mode of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum Lock {
    ForUpdate,
    Shared,
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Cross => "cross",
        }
    }
}

/// A join and its `on` predicates.
///
/// Predicates live in an inner builder so join conditions reuse the full where
/// machinery (nesting, value comparisons, null checks).
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub(crate) kind: JoinType,
    pub(crate) table: TableRef,
    pub(crate) query: Builder,
}

impl JoinClause {
    pub(crate) fn new(kind: JoinType, table: TableRef, parent: &Builder) -> Self {
        Self {
            kind,
            table,
            query: parent.new_query(),
        }
    }

    pub fn kind(&self) -> JoinType {
        self.kind
    }

    /// `first op second` column comparison.
    pub fn on(mut self, first: &str, operator: &str, second: &str) -> Self {
        self.query = self.query.where_column(first, operator, second);
        self
    }

    pub fn or_on(mut self, first: &str, operator: &str, second: &str) -> Self {
        self.query = self.query.or_where_column(first, operator, second);
        self
    }

    /// Column compared with a bound value.
    pub fn where_op(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.query = self.query.where_op(column, operator, value);
        self
    }

    pub fn or_where_op(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.query = self.query.or_where_op(column, operator, value);
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.query = self.query.where_null(column);
        self
    }

    pub fn where_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.query = self.query.where_in(column, values);
        self
    }

    /// Parenthesized group of join conditions.
    pub fn on_nested(self, f: impl FnOnce(JoinClause) -> JoinClause) -> Self {
        let Self { kind, table, query } = self;
        let inner = f(JoinClause {
            kind,
            table: table.clone(),
            query: query.new_query(),
        });
        Self {
            kind,
            table,
            query: query.add_nested(inner.query, Boolean::And),
        }
    }

    pub(crate) fn bindings(&self) -> Vec<Value> {
        self.query.bindings.get(BindingKind::Where).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_lookup_is_case_insensitive() {
        assert!(is_operator("LIKE"));
        assert!(is_operator(" >= "));
        assert!(!is_operator("active"));
    }
}
