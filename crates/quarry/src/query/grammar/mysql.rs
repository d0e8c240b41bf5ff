use super::{QueryGrammar, json_path, split_json, table_alias};
use crate::config::Dialect;
use crate::query::bindings::BindingKind;
use crate::query::builder::Builder;
use crate::query::clause::Lock;
use crate::value::{Record, Value};

/// Largest unsigned BIGINT; MySQL has no offset without a limit.
const NO_LIMIT: &str = "18446744073709551615";

/// MySQL: backtick identifiers, `json_extract`, inline joined writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl QueryGrammar for MySqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn wrap_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return "*".to_string();
        }
        format!("`{}`", segment.replace('`', "``"))
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = split_json(value);
        format!(
            "json_unquote(json_extract({}, {}))",
            self.wrap_segments(field),
            json_path(&path)
        )
    }

    fn compile_offset(&self, limit: Option<u64>, offset: u64) -> String {
        match limit {
            Some(_) => format!("offset {offset}"),
            None => format!("limit {NO_LIMIT} offset {offset}"),
        }
    }

    fn compile_lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::ForUpdate => "for update".to_string(),
            Lock::Shared => "lock in share mode".to_string(),
            Lock::Raw(sql) => sql.clone(),
        }
    }

    fn compile_random(&self) -> String {
        "RAND()".to_string()
    }

    fn compile_json_contains(&self, column: &str, parameter: &str, not: bool) -> String {
        let (field, path) = split_json(column);
        let field = self.wrap_segments(field);
        let path = if path.is_empty() {
            String::new()
        } else {
            format!(", {}", json_path(&path))
        };
        let not = if not { "not " } else { "" };
        format!("{not}json_contains({field}, {parameter}{path})")
    }

    fn compile_full_text(&self, columns: &[String], parameter: &str) -> String {
        format!(
            "match ({}) against ({parameter} in natural language mode)",
            self.columnize(columns)
        )
    }

    fn compile_insert_default_values(&self, table: &str) -> String {
        format!("insert into {table} () values ()")
    }

    fn compile_insert_or_ignore(&self, query: &Builder, records: &[Record]) -> String {
        self.compile_insert(query, records)
            .replacen("insert", "insert ignore", 1)
    }

    /// `on duplicate key update`; the unique key is implied by the table's indexes.
    fn compile_upsert(
        &self,
        query: &Builder,
        records: &[Record],
        _unique_by: &[String],
        update: &[String],
    ) -> String {
        let insert = self.compile_insert(query, records);
        if update.is_empty() {
            return insert.replacen("insert", "insert ignore", 1);
        }
        let set = update
            .iter()
            .map(|c| format!("{} = values({})", self.wrap(c), self.wrap(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{insert} on duplicate key update {set}")
    }

    /// Set columns keep their qualifier so joined updates stay unambiguous.
    fn compile_update_columns(&self, values: &Record) -> String {
        values
            .iter()
            .map(|(column, value)| format!("{} = {}", self.wrap(column), self.parameter(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Single-table writes take `order by` and `limit` inline; joined writes take neither.
    fn validate_write(&self, query: &Builder) -> Result<(), String> {
        if query.offset.is_some() {
            return Err("MySQL updates and deletes do not support offset".to_string());
        }
        if !query.joins.is_empty() && (query.limit.is_some() || !query.orders.is_empty()) {
            return Err("MySQL joined updates and deletes do not support order by or limit".to_string());
        }
        Ok(())
    }

    fn writes_through_row_key(&self, _query: &Builder) -> bool {
        false
    }

    fn compile_update(&self, query: &Builder, values: &Record) -> String {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        let columns = self.compile_update_columns(values);
        if !query.joins.is_empty() {
            return self.compile_update_with_joins(query, &table, &columns);
        }
        self.with_write_tail(format!("update {table} set {columns}"), query)
    }

    fn compile_update_with_joins(&self, query: &Builder, table: &str, columns: &str) -> String {
        let mut sql = format!("update {table} {} set {columns}", self.compile_joins(query));
        if !query.wheres.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_wheres(query));
        }
        sql
    }

    /// Join bindings precede the set values: the joins are emitted first.
    fn prepare_bindings_for_update(&self, query: &Builder, values: &Record) -> Vec<Value> {
        let mut out = query.bindings.get(BindingKind::Join).to_vec();
        for value in values.values() {
            value.flatten_into(&mut out);
        }
        out.extend_from_slice(query.bindings.get(BindingKind::Where));
        out.extend_from_slice(query.bindings.get(BindingKind::Order));
        out
    }

    fn compile_delete(&self, query: &Builder) -> String {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        if !query.joins.is_empty() {
            return self.compile_delete_with_joins(query, &table);
        }
        self.with_write_tail(format!("delete from {table}"), query)
    }

    fn compile_delete_with_joins(&self, query: &Builder, table: &str) -> String {
        let target = self.wrap_table(query.table_name().map(table_alias).unwrap_or_default());
        let mut sql = format!("delete {target} from {table} {}", self.compile_joins(query));
        if !query.wheres.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_wheres(query));
        }
        sql
    }

    fn prepare_bindings_for_delete(&self, query: &Builder) -> Vec<Value> {
        let mut out = query.bindings.get(BindingKind::Join).to_vec();
        out.extend_from_slice(query.bindings.get(BindingKind::Where));
        out.extend_from_slice(query.bindings.get(BindingKind::Order));
        out
    }

    fn compile_truncate(&self, query: &Builder) -> Vec<(String, Vec<Value>)> {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        vec![(format!("truncate table {table}"), Vec::new())]
    }

    fn begin_keyword(&self) -> &'static str {
        "START TRANSACTION"
    }
}

impl MySqlGrammar {
    /// Append `where`, `order by` and `limit` to a single-table write.
    fn with_write_tail(&self, mut sql: String, query: &Builder) -> String {
        if !query.wheres.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_wheres(query));
        }
        if !query.orders.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_orders(&query.orders));
        }
        if let Some(limit) = query.limit {
            sql.push(' ');
            sql.push_str(&self.compile_limit(limit));
        }
        sql
    }
}
