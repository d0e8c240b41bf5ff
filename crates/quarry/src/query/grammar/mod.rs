//! Query grammar: compiles a [`Builder`] into SQL text.
//!
//! The trait's provided methods implement the SQL shared by every engine;
//! each dialect overrides quoting, locking, JSON and the write variants that
//! differ. Grammars are pure: no connection access, no bindings mutation.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;

use super::bindings::BindingKind;
use super::builder::Builder;
use super::clause::{Aggregate, ColumnRef, Lock, Order, TableRef, Where};
use crate::config::Dialect;
use crate::transaction::TransactionStep;
use crate::value::{Record, Value};

static POSTGRES: PostgresGrammar = PostgresGrammar;
static MYSQL: MySqlGrammar = MySqlGrammar;
static SQLITE: SqliteGrammar = SqliteGrammar;

/// Grammar for `dialect`.
pub fn for_dialect(dialect: Dialect) -> &'static dyn QueryGrammar {
    match dialect {
        Dialect::Postgres => &POSTGRES,
        Dialect::MySql => &MYSQL,
        Dialect::Sqlite => &SQLITE,
    }
}

pub trait QueryGrammar: Send + Sync {
    fn dialect(&self) -> Dialect;

    // ── identifiers ─────────────────────────────────────────────────────────

    /// Quote one identifier segment. `*` stays bare.
    fn wrap_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return "*".to_string();
        }
        format!("\"{}\"", segment.replace('"', "\"\""))
    }

    /// Quote a column reference: dotted segments, `x as y` aliases and
    /// `column->path` JSON selectors.
    fn wrap(&self, value: &str) -> String {
        let value = value.trim();
        if let Some((name, alias)) = split_alias(value) {
            return format!("{} as {}", self.wrap(name), self.wrap_segment(alias));
        }
        if value.contains("->") {
            return self.wrap_json_selector(value);
        }
        self.wrap_segments(value)
    }

    fn wrap_segments(&self, value: &str) -> String {
        value
            .split('.')
            .map(|segment| self.wrap_segment(segment.trim()))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn wrap_table(&self, table: &str) -> String {
        self.wrap(table)
    }

    /// `column->a->b` for this engine.
    fn wrap_json_selector(&self, value: &str) -> String;

    fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `?`, or the SQL of a raw expression.
    fn parameter(&self, value: &Value) -> String {
        match value {
            Value::Raw(expr) => expr.sql().to_string(),
            _ => "?".to_string(),
        }
    }

    fn parameterize(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.parameter(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ── select ──────────────────────────────────────────────────────────────

    fn compile_select(&self, query: &Builder) -> String {
        if (!query.unions.is_empty() || !query.havings.is_empty()) && query.aggregate.is_some() {
            return self.compile_union_aggregate(query);
        }
        let sql = self.compile_components(query).join(" ");
        if query.unions.is_empty() {
            return sql;
        }
        format!("{} {}", self.wrap_union(&sql), self.compile_unions(query))
    }

    /// Non-empty select components in their fixed order.
    fn compile_components(&self, query: &Builder) -> Vec<String> {
        let mut parts = Vec::new();
        match &query.aggregate {
            Some(aggregate) => parts.push(self.compile_aggregate(query, aggregate)),
            None => parts.push(self.compile_columns(query)),
        }
        if let Some(from) = &query.from {
            parts.push(format!("from {}", self.compile_table(from)));
        }
        if !query.joins.is_empty() {
            parts.push(self.compile_joins(query));
        }
        if !query.wheres.is_empty() {
            parts.push(self.compile_wheres(query));
        }
        if !query.groups.is_empty() {
            parts.push(self.compile_groups(&query.groups));
        }
        if !query.havings.is_empty() {
            parts.push(format!("having {}", self.compile_conditions(&query.havings)));
        }
        if !query.orders.is_empty() {
            parts.push(self.compile_orders(&query.orders));
        }
        if let Some(limit) = query.limit {
            parts.push(self.compile_limit(limit));
        }
        if let Some(offset) = query.offset {
            parts.push(self.compile_offset(query.limit, offset));
        }
        if let Some(lock) = &query.lock {
            let lock = self.compile_lock(lock);
            if !lock.is_empty() {
                parts.push(lock);
            }
        }
        parts
    }

    fn compile_aggregate(&self, query: &Builder, aggregate: &Aggregate) -> String {
        let mut column = self.columnize(&aggregate.columns);
        if query.distinct && column != "*" {
            column = format!("distinct {column}");
        }
        format!("select {}({column}) as aggregate", aggregate.function)
    }

    fn compile_columns(&self, query: &Builder) -> String {
        let select = if query.distinct { "select distinct" } else { "select" };
        if query.columns.is_empty() {
            return format!("{select} *");
        }
        format!("{select} {}", self.compile_column_refs(&query.columns))
    }

    fn compile_column_refs(&self, columns: &[ColumnRef]) -> String {
        columns
            .iter()
            .map(|c| match c {
                ColumnRef::Name(name) => self.wrap(name),
                ColumnRef::Raw(sql) => sql.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn compile_table(&self, table: &TableRef) -> String {
        match table {
            TableRef::Name(name) => self.wrap_table(name),
            TableRef::Raw(sql) => sql.clone(),
        }
    }

    fn compile_joins(&self, query: &Builder) -> String {
        query
            .joins
            .iter()
            .map(|join| {
                let table = self.compile_table(&join.table);
                let kind = join.kind.as_str();
                if join.query.wheres.is_empty() {
                    format!("{kind} join {table}")
                } else {
                    format!(
                        "{kind} join {table} on {}",
                        self.compile_conditions(&join.query.wheres)
                    )
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compile_wheres(&self, query: &Builder) -> String {
        if query.wheres.is_empty() {
            return String::new();
        }
        format!("where {}", self.compile_conditions(&query.wheres))
    }

    /// Predicates joined by their connectors; the first connector is dropped.
    fn compile_conditions(&self, wheres: &[Where]) -> String {
        let mut sql = String::new();
        for (i, predicate) in wheres.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(predicate.boolean().as_str());
                sql.push(' ');
            }
            sql.push_str(&self.compile_where(predicate));
        }
        sql
    }

    fn compile_where(&self, predicate: &Where) -> String {
        match predicate {
            Where::Basic {
                column,
                operator,
                value,
                ..
            } => format!("{} {operator} {}", self.wrap(column), self.parameter(value)),
            Where::Column {
                first,
                operator,
                second,
                ..
            } => format!("{} {operator} {}", self.wrap(first), self.wrap(second)),
            Where::In { column, values, .. } => {
                if values.is_empty() {
                    "0 = 1".to_string()
                } else {
                    format!("{} in ({})", self.wrap(column), self.parameterize(values))
                }
            }
            Where::NotIn { column, values, .. } => {
                if values.is_empty() {
                    "1 = 1".to_string()
                } else {
                    format!("{} not in ({})", self.wrap(column), self.parameterize(values))
                }
            }
            Where::InSub {
                column, query, not, ..
            } => format!(
                "{} {}in ({})",
                self.wrap(column),
                if *not { "not " } else { "" },
                self.compile_select(query)
            ),
            Where::Null { column, .. } => format!("{} is null", self.wrap(column)),
            Where::NotNull { column, .. } => format!("{} is not null", self.wrap(column)),
            Where::Between {
                column, min, max, ..
            } => format!(
                "{} between {} and {}",
                self.wrap(column),
                self.parameter(min),
                self.parameter(max)
            ),
            Where::NotBetween {
                column, min, max, ..
            } => format!(
                "{} not between {} and {}",
                self.wrap(column),
                self.parameter(min),
                self.parameter(max)
            ),
            Where::Nested { query, .. } => format!("({})", self.compile_conditions(&query.wheres)),
            Where::Exists { query, not, .. } => format!(
                "{}exists ({})",
                if *not { "not " } else { "" },
                self.compile_select(query)
            ),
            Where::Subquery {
                column,
                operator,
                query,
                ..
            } => format!("{} {operator} ({})", self.wrap(column), self.compile_select(query)),
            Where::Raw { sql, .. } => sql.clone(),
            Where::JsonContains {
                column, value, not, ..
            } => self.compile_json_contains(column, &self.parameter(value), *not),
            Where::FullText { columns, value, .. } => {
                self.compile_full_text(columns, &self.parameter(value))
            }
        }
    }

    fn compile_groups(&self, groups: &[ColumnRef]) -> String {
        format!("group by {}", self.compile_column_refs(groups))
    }

    fn compile_orders(&self, orders: &[Order]) -> String {
        let list = orders
            .iter()
            .map(|order| match order {
                Order::Column { column, direction } => {
                    format!("{} {}", self.wrap(column), direction.as_str())
                }
                Order::Raw(sql) => sql.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("order by {list}")
    }

    fn compile_limit(&self, limit: u64) -> String {
        format!("limit {limit}")
    }

    /// `limit` is passed so engines that need a limit before `offset` can add one.
    fn compile_offset(&self, _limit: Option<u64>, offset: u64) -> String {
        format!("offset {offset}")
    }

    fn compile_lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::ForUpdate => "for update".to_string(),
            Lock::Shared => "for share".to_string(),
            Lock::Raw(sql) => sql.clone(),
        }
    }

    fn compile_random(&self) -> String {
        "random()".to_string()
    }

    // ── unions ──────────────────────────────────────────────────────────────

    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    fn compile_unions(&self, query: &Builder) -> String {
        let mut parts: Vec<String> = query
            .unions
            .iter()
            .map(|union| {
                let conjunction = if union.all { "union all" } else { "union" };
                format!("{conjunction} {}", self.wrap_union(&self.compile_select(&union.query)))
            })
            .collect();
        if !query.union_orders.is_empty() {
            parts.push(self.compile_orders(&query.union_orders));
        }
        if let Some(limit) = query.union_limit {
            parts.push(self.compile_limit(limit));
        }
        if let Some(offset) = query.union_offset {
            parts.push(self.compile_offset(query.union_limit, offset));
        }
        parts.join(" ")
    }

    /// Aggregate over a compound or grouped query:
    /// `select count(*) as aggregate from (...) as "temp_table"`.
    fn compile_union_aggregate(&self, query: &Builder) -> String {
        let mut inner = query.clone();
        let Some(aggregate) = inner.aggregate.take() else {
            return self.compile_select(query);
        };
        let head = self.compile_aggregate(query, &aggregate);
        format!(
            "{head} from ({}) as {}",
            self.compile_select(&inner),
            self.wrap_table("temp_table")
        )
    }

    fn compile_exists(&self, query: &Builder) -> String {
        format!("select exists({}) as {}", self.compile_select(query), self.wrap("exists"))
    }

    // ── predicates that differ per engine ───────────────────────────────────

    fn supports_json_contains(&self) -> bool {
        true
    }

    fn compile_json_contains(&self, column: &str, parameter: &str, not: bool) -> String {
        let (field, path) = split_json(column);
        let mut target = self.wrap_segments(field);
        for segment in &path {
            target.push_str(&format!("->{}", json_key(segment)));
        }
        let not = if not { "not " } else { "" };
        format!("{not}({target})::jsonb @> {parameter}")
    }

    fn supports_full_text(&self) -> bool {
        true
    }

    fn compile_full_text(&self, columns: &[String], parameter: &str) -> String {
        let vectors = columns
            .iter()
            .map(|c| format!("to_tsvector('english', {})", self.wrap(c)))
            .collect::<Vec<_>>()
            .join(" || ");
        format!("({vectors}) @@ plainto_tsquery('english', {parameter})")
    }

    // ── writes ──────────────────────────────────────────────────────────────

    /// Multi-row insert; columns come from the first record.
    fn compile_insert(&self, query: &Builder, records: &[Record]) -> String {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        let columns = insert_columns(records);
        if columns.is_empty() {
            return self.compile_insert_default_values(&table);
        }
        let rows = records
            .iter()
            .map(|record| {
                let params = columns
                    .iter()
                    .map(|c| self.parameter(record.get(c).unwrap_or(&Value::Null)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "insert into {table} ({}) values {rows}",
            self.columnize(&columns)
        )
    }

    fn compile_insert_default_values(&self, table: &str) -> String {
        format!("insert into {table} default values")
    }

    fn compile_insert_or_ignore(&self, query: &Builder, records: &[Record]) -> String {
        format!("{} on conflict do nothing", self.compile_insert(query, records))
    }

    /// Insert returning the generated key when the engine supports it.
    fn compile_insert_get_id(&self, query: &Builder, record: &Record, _key: &str) -> String {
        self.compile_insert(query, std::slice::from_ref(record))
    }

    /// Whether [`compile_insert_get_id`](Self::compile_insert_get_id) returns a row.
    fn insert_get_id_returns_row(&self) -> bool {
        false
    }

    fn compile_upsert(
        &self,
        query: &Builder,
        records: &[Record],
        unique_by: &[String],
        update: &[String],
    ) -> String {
        let insert = self.compile_insert(query, records);
        let target = self.columnize(unique_by);
        if update.is_empty() {
            return format!("{insert} on conflict ({target}) do nothing");
        }
        let excluded = self.wrap_segment("excluded");
        let set = update
            .iter()
            .map(|c| format!("{} = {excluded}.{}", self.wrap(c), self.wrap(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{insert} on conflict ({target}) do update set {set}")
    }

    /// Reject write shapes the engine cannot express; the message becomes a
    /// [`DbError::Validation`](crate::DbError::Validation).
    fn validate_write(&self, _query: &Builder) -> Result<(), String> {
        Ok(())
    }

    /// Whether update/delete must target rows through the row-key sub-select.
    ///
    /// Joins, limits and offsets all need it; orders only matter alongside a limit.
    fn writes_through_row_key(&self, query: &Builder) -> bool {
        !query.joins.is_empty() || query.limit.is_some() || query.offset.is_some()
    }

    fn compile_update(&self, query: &Builder, values: &Record) -> String {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        let columns = self.compile_update_columns(values);
        if !self.writes_through_row_key(query) {
            let wheres = self.compile_wheres(query);
            return format!("update {table} set {columns} {wheres}").trim_end().to_string();
        }
        self.compile_update_with_joins(query, &table, &columns)
    }

    /// `"col" = ?` pairs; the target table is implied so only the last segment is kept.
    fn compile_update_columns(&self, values: &Record) -> String {
        values
            .iter()
            .map(|(column, value)| {
                let name = column.rsplit('.').next().unwrap_or(column);
                format!("{} = {}", self.wrap(name), self.parameter(value))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Joined or limited update through a row-key sub-select.
    fn compile_update_with_joins(&self, query: &Builder, table: &str, columns: &str) -> String {
        let key = self.row_key_column();
        format!(
            "update {table} set {columns} where {} in ({})",
            self.wrap(key),
            self.compile_row_key_select(query, table, key)
        )
    }

    /// Engine row identifier used for joined or limited updates and deletes.
    fn row_key_column(&self) -> &'static str {
        "ctid"
    }

    /// `select <table>.<key> from ... [joins] [where] [order by] [limit] [offset]`.
    fn compile_row_key_select(&self, query: &Builder, table: &str, key: &str) -> String {
        let qualifier = query.table_name().map(table_alias).unwrap_or_default();
        let mut parts = vec![format!(
            "select {} from {table}",
            self.wrap(&format!("{qualifier}.{key}"))
        )];
        if !query.joins.is_empty() {
            parts.push(self.compile_joins(query));
        }
        if !query.wheres.is_empty() {
            parts.push(self.compile_wheres(query));
        }
        if !query.orders.is_empty() {
            parts.push(self.compile_orders(&query.orders));
        }
        if let Some(limit) = query.limit {
            parts.push(self.compile_limit(limit));
        }
        if let Some(offset) = query.offset {
            parts.push(self.compile_offset(query.limit, offset));
        }
        parts.join(" ")
    }

    /// Bindings of the clauses an update or delete emits after its `set` list.
    fn write_bindings(&self, query: &Builder) -> Vec<Value> {
        let mut out = query.bindings.get(BindingKind::Join).to_vec();
        out.extend_from_slice(query.bindings.get(BindingKind::Where));
        if self.writes_through_row_key(query) {
            out.extend_from_slice(query.bindings.get(BindingKind::Order));
        }
        out
    }

    /// Bindings for [`compile_update`](Self::compile_update): set values first.
    fn prepare_bindings_for_update(&self, query: &Builder, values: &Record) -> Vec<Value> {
        let mut out = Vec::new();
        for value in values.values() {
            value.flatten_into(&mut out);
        }
        out.extend(self.write_bindings(query));
        out
    }

    fn compile_delete(&self, query: &Builder) -> String {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        if !self.writes_through_row_key(query) {
            let wheres = self.compile_wheres(query);
            return format!("delete from {table} {wheres}").trim_end().to_string();
        }
        self.compile_delete_with_joins(query, &table)
    }

    fn compile_delete_with_joins(&self, query: &Builder, table: &str) -> String {
        let key = self.row_key_column();
        format!(
            "delete from {table} where {} in ({})",
            self.wrap(key),
            self.compile_row_key_select(query, table, key)
        )
    }

    fn prepare_bindings_for_delete(&self, query: &Builder) -> Vec<Value> {
        self.write_bindings(query)
    }

    /// Statements that empty the table and reset its identity.
    fn compile_truncate(&self, query: &Builder) -> Vec<(String, Vec<Value>)> {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        vec![(format!("truncate {table} restart identity cascade"), Vec::new())]
    }

    /// Optional identity reset run after truncation: `(check_sql, reset_sql, bindings)`.
    ///
    /// The reset only runs when `check_sql` returns a true scalar.
    fn compile_truncate_sequence_reset(&self, _query: &Builder) -> Option<(String, String, Vec<Value>)> {
        None
    }

    // ── transactions ────────────────────────────────────────────────────────

    fn begin_keyword(&self) -> &'static str {
        "BEGIN"
    }

    fn compile_transaction(&self, step: &TransactionStep) -> String {
        match step {
            TransactionStep::Begin => self.begin_keyword().to_string(),
            TransactionStep::Commit => "COMMIT".to_string(),
            TransactionStep::Rollback => "ROLLBACK".to_string(),
            TransactionStep::Savepoint(name) => format!("SAVEPOINT {name}"),
            TransactionStep::Release(name) => format!("RELEASE SAVEPOINT {name}"),
            TransactionStep::RollbackTo(name) => format!("ROLLBACK TO SAVEPOINT {name}"),
        }
    }
}

/// Split `name as alias` (case-insensitive `as`).
pub(crate) fn split_alias(value: &str) -> Option<(&str, &str)> {
    let lower = value.to_ascii_lowercase();
    let idx = lower.find(" as ")?;
    Some((value[..idx].trim(), value[idx + 4..].trim()))
}

/// Alias of `table as alias`, or the table itself.
pub(crate) fn table_alias(table: &str) -> &str {
    split_alias(table).map_or(table, |(_, alias)| alias)
}

/// `meta->a->b` into (`meta`, [`a`, `b`]).
pub(crate) fn split_json(value: &str) -> (&str, Vec<&str>) {
    let mut parts = value.split("->");
    let field = parts.next().unwrap_or_default().trim();
    let path = parts
        .map(|p| p.trim().trim_matches(|c| c == '\'' || c == '"'))
        .collect();
    (field, path)
}

/// JSON object key (`'name'`) or array index (`0`) for PostgreSQL arrows.
pub(crate) fn json_key(segment: &str) -> String {
    if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
        segment.to_string()
    } else {
        format!("'{}'", segment.replace('\'', "''"))
    }
}

/// `$."a"."b"` JSON path for MySQL / SQLite functions.
pub(crate) fn json_path(path: &[&str]) -> String {
    let mut out = String::from("'$");
    for segment in path {
        if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
            out.push_str(&format!("[{segment}]"));
        } else {
            out.push_str(&format!(".\"{}\"", segment.replace('\'', "''")));
        }
    }
    out.push('\'');
    out
}

/// Columns of a multi-row insert, taken from the first record.
pub(crate) fn insert_columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.columns().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Bindings of a multi-row insert, aligned with [`insert_columns`].
pub(crate) fn insert_bindings(records: &[Record]) -> Vec<Value> {
    let columns = insert_columns(records);
    let mut out = Vec::with_capacity(columns.len() * records.len());
    for record in records {
        for column in &columns {
            record.get(column).unwrap_or(&Value::Null).flatten_into(&mut out);
        }
    }
    out
}

/// Replace `?` placeholders outside quotes with literal values.
pub fn interpolate(sql: &str, bindings: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut values = bindings.iter();
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => match values.next() {
                    Some(v) => out.push_str(&v.to_sql_literal()),
                    None => out.push('?'),
                },
                _ => out.push(c),
            },
        }
    }
    out
}
