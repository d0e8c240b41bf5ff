use super::{QueryGrammar, json_key, split_json};
use crate::config::Dialect;
use crate::query::builder::Builder;
use crate::value::Record;

/// PostgreSQL: double-quoted identifiers, `->`/`->>` JSON, `returning` ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl QueryGrammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    /// `"meta"->'a'->>'b'`: the last step extracts text.
    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = split_json(value);
        let mut sql = self.wrap_segments(field);
        let last = path.len().saturating_sub(1);
        for (i, segment) in path.iter().enumerate() {
            let arrow = if i == last { "->>" } else { "->" };
            sql.push_str(arrow);
            sql.push_str(&json_key(segment));
        }
        sql
    }

    fn compile_insert_get_id(&self, query: &Builder, record: &Record, key: &str) -> String {
        format!(
            "{} returning {}",
            self.compile_insert(query, std::slice::from_ref(record)),
            self.wrap(key)
        )
    }

    fn insert_get_id_returns_row(&self) -> bool {
        true
    }
}
