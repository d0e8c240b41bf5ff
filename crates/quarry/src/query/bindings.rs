//! Positional bindings, kept in one bucket per clause category.
//!
//! Clauses may be added in any order (`order_by_raw` before `where_op`), but the
//! grammar always emits them in a fixed order. Keeping bindings per category and
//! concatenating them in that same order keeps `?` and values aligned.

use crate::error::DbError;
use crate::value::Value;
use std::str::FromStr;

/// Clause category a binding belongs to, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Order,
    Union,
    UnionOrder,
}

impl BindingKind {
    /// All buckets in emission order.
    pub const ALL: [BindingKind; 9] = [
        BindingKind::Select,
        BindingKind::From,
        BindingKind::Join,
        BindingKind::Where,
        BindingKind::GroupBy,
        BindingKind::Having,
        BindingKind::Order,
        BindingKind::Union,
        BindingKind::UnionOrder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BindingKind::Select => "select",
            BindingKind::From => "from",
            BindingKind::Join => "join",
            BindingKind::Where => "where",
            BindingKind::GroupBy => "groupBy",
            BindingKind::Having => "having",
            BindingKind::Order => "order",
            BindingKind::Union => "union",
            BindingKind::UnionOrder => "unionOrder",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for BindingKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BindingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DbError::UnknownBindingBucket(s.to_string()))
    }
}

/// Per-category binding lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    buckets: [Vec<Value>; 9],
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value; raw expressions contribute only their own bindings.
    pub fn push(&mut self, kind: BindingKind, value: &Value) {
        value.flatten_into(&mut self.buckets[kind.index()]);
    }

    pub fn extend<'a>(&mut self, kind: BindingKind, values: impl IntoIterator<Item = &'a Value>) {
        for value in values {
            self.push(kind, value);
        }
    }

    pub fn get(&self, kind: BindingKind) -> &[Value] {
        &self.buckets[kind.index()]
    }

    pub fn set(&mut self, kind: BindingKind, values: Vec<Value>) {
        let bucket = &mut self.buckets[kind.index()];
        bucket.clear();
        for value in &values {
            value.flatten_into(bucket);
        }
    }

    pub fn clear(&mut self, kind: BindingKind) {
        self.buckets[kind.index()].clear();
    }

    /// All bindings in emission order.
    pub fn flatten(&self) -> Vec<Value> {
        self.flatten_except(&[])
    }

    /// All bindings in emission order, skipping `excluded` buckets.
    pub fn flatten_except(&self, excluded: &[BindingKind]) -> Vec<Value> {
        BindingKind::ALL
            .into_iter()
            .filter(|kind| !excluded.contains(kind))
            .flat_map(|kind| self.buckets[kind.index()].iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }
}
