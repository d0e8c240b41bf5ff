use super::{SchemaGrammar, quote_literal};
use crate::config::Dialect;
use crate::error::DbResult;
use crate::schema::blueprint::Blueprint;
use crate::schema::column::{ColumnDefinition, ColumnType};
use crate::schema::command::{Command, IndexCommand};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlSchemaGrammar;

impl MySqlSchemaGrammar {
    /// `alter table t add {kind} name(cols)`.
    fn add_index(&self, blueprint: &Blueprint, kind: &str, index: &IndexCommand) -> Vec<String> {
        let using = index
            .algorithm
            .as_ref()
            .map(|a| format!(" using {a}"))
            .unwrap_or_default();
        vec![format!(
            "alter table {} add {kind} {}{using}({})",
            self.wrap_table(blueprint.table()),
            self.wrap(&index.name),
            self.columnize(&index.columns)
        )]
    }

    /// Table options: charset, collation, engine.
    fn table_options(&self, blueprint: &Blueprint) -> String {
        let mut sql = String::new();
        if let Some(charset) = &blueprint.charset {
            sql.push_str(&format!(" default character set {charset}"));
        }
        if let Some(collation) = &blueprint.collation {
            sql.push_str(&format!(" collate {}", quote_literal(collation)));
        }
        if let Some(engine) = &blueprint.engine {
            sql.push_str(&format!(" engine = {engine}"));
        }
        sql
    }
}

impl SchemaGrammar for MySqlSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn type_sql(&self, column: &ColumnDefinition) -> DbResult<String> {
        Ok(match &column.ty {
            ColumnType::TinyInteger => "tinyint".into(),
            ColumnType::SmallInteger => "smallint".into(),
            ColumnType::MediumInteger => "mediumint".into(),
            ColumnType::Integer => "int".into(),
            ColumnType::BigInteger => "bigint".into(),
            ColumnType::Boolean => "tinyint(1)".into(),
            ColumnType::Char { length } => format!("char({length})"),
            ColumnType::String { length } => format!("varchar({length})"),
            ColumnType::Text => "text".into(),
            ColumnType::MediumText => "mediumtext".into(),
            ColumnType::LongText => "longtext".into(),
            ColumnType::Float => "float".into(),
            ColumnType::Double => "double".into(),
            ColumnType::Decimal { precision, scale } => format!("decimal({precision}, {scale})"),
            ColumnType::Date => "date".into(),
            ColumnType::DateTime { precision } => with_precision("datetime", *precision),
            ColumnType::Timestamp { precision } | ColumnType::TimestampTz { precision } => {
                with_precision("timestamp", *precision)
            }
            ColumnType::Time => "time".into(),
            ColumnType::Binary => "blob".into(),
            ColumnType::Json | ColumnType::Jsonb => "json".into(),
            ColumnType::Uuid => "char(36)".into(),
            ColumnType::Enum { allowed } => {
                let allowed = allowed.iter().map(|v| quote_literal(v)).collect::<Vec<_>>();
                format!("enum({})", allowed.join(", "))
            }
        })
    }

    fn modifiers(&self, _blueprint: &Blueprint, column: &ColumnDefinition) -> DbResult<String> {
        let mut sql = String::new();
        if column.unsigned && column.ty.is_integer() {
            sql.push_str(" unsigned");
        }
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" character set {charset}"));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" collate {}", quote_literal(collation)));
        }
        if let Some(expression) = &column.virtual_as {
            sql.push_str(&format!(" as ({expression})"));
        }
        if let Some(expression) = &column.stored_as {
            sql.push_str(&format!(" as ({expression}) stored"));
        }
        sql.push_str(if column.nullable { " null" } else { " not null" });
        if let Some(default) = &column.default {
            sql.push_str(&format!(" default {}", self.default_value(default)));
        } else if column.use_current && column.ty.is_temporal() {
            sql.push_str(" default CURRENT_TIMESTAMP");
        }
        if column.use_current_on_update {
            sql.push_str(" on update CURRENT_TIMESTAMP");
        }
        if column.auto_increment {
            sql.push_str(" auto_increment primary key");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" comment {}", quote_literal(comment)));
        }
        if let Some(after) = &column.after {
            sql.push_str(&format!(" after {}", self.wrap(after)));
        } else if column.first {
            sql.push_str(" first");
        }
        Ok(sql)
    }

    fn compile_create(&self, blueprint: &Blueprint, _commands: &[Command]) -> DbResult<Vec<String>> {
        let create = if blueprint.temporary { "create temporary table" } else { "create table" };
        Ok(vec![format!(
            "{create} {} ({}){}",
            self.wrap_table(blueprint.table()),
            self.added_column_sql(blueprint)?.join(", "),
            self.table_options(blueprint)
        )])
    }

    fn compile_add(&self, blueprint: &Blueprint) -> DbResult<Vec<String>> {
        let columns = self
            .added_column_sql(blueprint)?
            .into_iter()
            .map(|c| format!("add {c}"))
            .collect::<Vec<_>>();
        Ok(vec![format!(
            "alter table {} {}",
            self.wrap_table(blueprint.table()),
            columns.join(", ")
        )])
    }

    fn compile_change(&self, blueprint: &Blueprint) -> DbResult<Vec<String>> {
        let columns = blueprint
            .changed_columns()
            .map(|c| self.column_sql(blueprint, c).map(|sql| format!("modify {sql}")))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(vec![format!(
            "alter table {} {}",
            self.wrap_table(blueprint.table()),
            columns.join(", ")
        )])
    }

    fn compile_unique(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(self.add_index(blueprint, "unique", index))
    }

    fn compile_index(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(self.add_index(blueprint, "index", index))
    }

    fn compile_fulltext(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(self.add_index(blueprint, "fulltext", index))
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> DbResult<Vec<String>> {
        let drops = columns
            .iter()
            .map(|c| format!("drop {}", self.wrap(c)))
            .collect::<Vec<_>>();
        Ok(vec![format!(
            "alter table {} {}",
            self.wrap_table(blueprint.table()),
            drops.join(", ")
        )])
    }

    fn compile_drop_primary(&self, blueprint: &Blueprint, _name: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} drop primary key",
            self.wrap_table(blueprint.table())
        )])
    }

    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        self.compile_drop_index(blueprint, name)
    }

    fn compile_drop_index(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} drop index {}",
            self.wrap_table(blueprint.table()),
            self.wrap(name)
        )])
    }

    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} drop foreign key {}",
            self.wrap_table(blueprint.table()),
            self.wrap(name)
        )])
    }

    fn compile_table_comment(&self, blueprint: &Blueprint, comment: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} comment = {}",
            self.wrap_table(blueprint.table()),
            quote_literal(comment)
        )])
    }

    fn compile_rename(&self, blueprint: &Blueprint, to: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "rename table {} to {}",
            self.wrap_table(blueprint.table()),
            self.wrap_table(to)
        )])
    }

    fn compile_table_exists(&self, _schema: Option<&str>, table: &str) -> (String, Vec<Value>) {
        (
            "select exists (select 1 from information_schema.tables where table_schema = database() and table_name = ? and table_type = 'BASE TABLE') as `exists`".to_string(),
            vec![Value::Text(table.to_string())],
        )
    }

    fn compile_column_listing(&self, _schema: Option<&str>, table: &str) -> (String, Vec<Value>) {
        (
            "select column_name as `column_name` from information_schema.columns where table_schema = database() and table_name = ? order by ordinal_position".to_string(),
            vec![Value::Text(table.to_string())],
        )
    }

    fn compile_enable_foreign_key_constraints(&self) -> String {
        "SET FOREIGN_KEY_CHECKS=1".to_string()
    }

    fn compile_disable_foreign_key_constraints(&self) -> String {
        "SET FOREIGN_KEY_CHECKS=0".to_string()
    }
}

fn with_precision(ty: &str, precision: Option<u32>) -> String {
    match precision {
        Some(p) => format!("{ty}({p})"),
        None => ty.to_string(),
    }
}
