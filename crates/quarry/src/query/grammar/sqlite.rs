use super::{QueryGrammar, json_path, split_json};
use crate::config::Dialect;
use crate::query::builder::Builder;
use crate::query::clause::Lock;
use crate::value::{Record, Value};

/// SQLite: double-quoted identifiers, `json_extract`, rowid-based joined writes.
///
/// Row locks do not exist; the whole database is locked by `BEGIN IMMEDIATE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl QueryGrammar for SqliteGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = split_json(value);
        format!("json_extract({}, {})", self.wrap_segments(field), json_path(&path))
    }

    fn compile_offset(&self, limit: Option<u64>, offset: u64) -> String {
        match limit {
            Some(_) => format!("offset {offset}"),
            None => format!("limit -1 offset {offset}"),
        }
    }

    fn compile_lock(&self, _lock: &Lock) -> String {
        String::new()
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql})")
    }

    fn supports_json_contains(&self) -> bool {
        false
    }

    fn supports_full_text(&self) -> bool {
        false
    }

    fn compile_insert_or_ignore(&self, query: &Builder, records: &[Record]) -> String {
        self.compile_insert(query, records)
            .replacen("insert", "insert or ignore", 1)
    }

    fn row_key_column(&self) -> &'static str {
        "rowid"
    }

    fn compile_truncate(&self, query: &Builder) -> Vec<(String, Vec<Value>)> {
        let table = self.wrap_table(query.table_name().unwrap_or_default());
        vec![(format!("delete from {table}"), Vec::new())]
    }

    /// `sqlite_sequence` only exists once an AUTOINCREMENT table has been created.
    fn compile_truncate_sequence_reset(&self, query: &Builder) -> Option<(String, String, Vec<Value>)> {
        let table = query.table_name()?;
        Some((
            "select exists (select 1 from sqlite_master where type = 'table' and name = 'sqlite_sequence') as \"exists\"".to_string(),
            "delete from sqlite_sequence where name = ?".to_string(),
            vec![Value::Text(table.to_string())],
        ))
    }

    fn begin_keyword(&self) -> &'static str {
        "BEGIN IMMEDIATE"
    }
}
