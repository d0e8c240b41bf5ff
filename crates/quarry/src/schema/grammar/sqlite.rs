use super::{SchemaGrammar, quote_literal, unsupported};
use crate::config::Dialect;
use crate::error::DbResult;
use crate::schema::blueprint::Blueprint;
use crate::schema::column::{ColumnDefinition, ColumnType};
use crate::schema::command::{Command, ForeignKeyDefinition, IndexCommand, IndexKind};
use crate::value::Value;

/// SQLite DDL.
///
/// Primary and foreign keys only exist inline in `create table`; on an
/// existing table they (and column changes) are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteSchemaGrammar;

impl SqliteSchemaGrammar {
    fn create_index(&self, blueprint: &Blueprint, unique: bool, index: &IndexCommand) -> Vec<String> {
        vec![format!(
            "create {}index {} on {} ({})",
            if unique { "unique " } else { "" },
            self.wrap(&index.name),
            self.wrap_table(blueprint.table()),
            self.columnize(&index.columns)
        )]
    }

    fn inline_primary(&self, commands: &[Command]) -> Option<String> {
        commands.iter().find_map(|c| match c {
            Command::Index(index) if index.kind == IndexKind::Primary => {
                Some(format!("primary key ({})", self.columnize(&index.columns)))
            }
            _ => None,
        })
    }

    fn inline_foreign_keys(&self, commands: &[Command]) -> DbResult<Vec<String>> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Foreign(foreign) => Some(foreign),
                _ => None,
            })
            .map(|foreign: &ForeignKeyDefinition| self.foreign_key_clause(foreign))
            .collect()
    }
}

impl SchemaGrammar for SqliteSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn type_sql(&self, column: &ColumnDefinition) -> DbResult<String> {
        Ok(match &column.ty {
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::MediumInteger
            | ColumnType::Integer
            | ColumnType::BigInteger => "integer".into(),
            ColumnType::Boolean => "tinyint(1)".into(),
            ColumnType::Char { .. } | ColumnType::String { .. } | ColumnType::Uuid => "varchar".into(),
            ColumnType::Text
            | ColumnType::MediumText
            | ColumnType::LongText
            | ColumnType::Json
            | ColumnType::Jsonb => "text".into(),
            ColumnType::Float => "float".into(),
            ColumnType::Double => "double".into(),
            ColumnType::Decimal { .. } => "numeric".into(),
            ColumnType::Date => "date".into(),
            ColumnType::DateTime { .. } | ColumnType::Timestamp { .. } | ColumnType::TimestampTz { .. } => {
                "datetime".into()
            }
            ColumnType::Time => "time".into(),
            ColumnType::Binary => "blob".into(),
            ColumnType::Enum { allowed } => {
                let allowed = allowed.iter().map(|v| quote_literal(v)).collect::<Vec<_>>();
                format!(
                    "varchar check ({} in ({}))",
                    self.wrap(&column.name),
                    allowed.join(", ")
                )
            }
        })
    }

    fn modifiers(&self, _blueprint: &Blueprint, column: &ColumnDefinition) -> DbResult<String> {
        let mut sql = String::new();
        if let Some(expression) = &column.virtual_as {
            sql.push_str(&format!(" as ({expression})"));
        }
        if let Some(expression) = &column.stored_as {
            sql.push_str(&format!(" as ({expression}) stored"));
        }
        if !column.nullable {
            sql.push_str(" not null");
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(" default {}", self.default_value(default)));
        } else if column.use_current && column.ty.is_temporal() {
            sql.push_str(" default CURRENT_TIMESTAMP");
        }
        if column.auto_increment {
            sql.push_str(" primary key autoincrement");
        }
        Ok(sql)
    }

    fn compile_create(&self, blueprint: &Blueprint, commands: &[Command]) -> DbResult<Vec<String>> {
        let create = if blueprint.temporary { "create temporary table" } else { "create table" };
        let mut parts = self.added_column_sql(blueprint)?;
        // an autoincrement column already carries the table's primary key
        if !blueprint.added_columns().any(|c| c.auto_increment) {
            parts.extend(self.inline_primary(commands));
        }
        parts.extend(self.inline_foreign_keys(commands)?);
        Ok(vec![format!(
            "{create} {} ({})",
            self.wrap_table(blueprint.table()),
            parts.join(", ")
        )])
    }

    fn compile_add(&self, blueprint: &Blueprint) -> DbResult<Vec<String>> {
        let table = self.wrap_table(blueprint.table());
        blueprint
            .added_columns()
            .map(|column| {
                if column.auto_increment {
                    return Err(unsupported(Dialect::Sqlite, "adding auto-increment columns"));
                }
                if column.stored_as.is_some() {
                    return Err(unsupported(Dialect::Sqlite, "adding stored generated columns"));
                }
                Ok(format!(
                    "alter table {table} add column {}",
                    self.column_sql(blueprint, column)?
                ))
            })
            .collect()
    }

    fn compile_change(&self, _blueprint: &Blueprint) -> DbResult<Vec<String>> {
        Err(unsupported(Dialect::Sqlite, "changing columns"))
    }

    fn compile_primary(&self, blueprint: &Blueprint, _index: &IndexCommand) -> DbResult<Vec<String>> {
        if blueprint.creating() {
            return Ok(Vec::new());
        }
        Err(unsupported(Dialect::Sqlite, "adding a primary key to an existing table"))
    }

    fn compile_unique(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(self.create_index(blueprint, true, index))
    }

    fn compile_index(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(self.create_index(blueprint, false, index))
    }

    fn compile_fulltext(&self, _blueprint: &Blueprint, _index: &IndexCommand) -> DbResult<Vec<String>> {
        Err(unsupported(Dialect::Sqlite, "fulltext indexes"))
    }

    fn compile_foreign(&self, blueprint: &Blueprint, _foreign: &ForeignKeyDefinition) -> DbResult<Vec<String>> {
        if blueprint.creating() {
            return Ok(Vec::new());
        }
        Err(unsupported(Dialect::Sqlite, "adding a foreign key to an existing table"))
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> DbResult<Vec<String>> {
        let table = self.wrap_table(blueprint.table());
        Ok(columns
            .iter()
            .map(|c| format!("alter table {table} drop column {}", self.wrap(c)))
            .collect())
    }

    fn compile_drop_primary(&self, _blueprint: &Blueprint, _name: &str) -> DbResult<Vec<String>> {
        Err(unsupported(Dialect::Sqlite, "dropping a primary key"))
    }

    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        self.compile_drop_index(blueprint, name)
    }

    fn compile_drop_index(&self, _blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!("drop index {}", self.wrap(name))])
    }

    fn compile_drop_foreign(&self, _blueprint: &Blueprint, _name: &str) -> DbResult<Vec<String>> {
        Err(unsupported(Dialect::Sqlite, "dropping a foreign key"))
    }

    fn compile_table_comment(&self, _blueprint: &Blueprint, _comment: &str) -> DbResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn compile_table_exists(&self, _schema: Option<&str>, table: &str) -> (String, Vec<Value>) {
        (
            "select exists (select 1 from sqlite_master where type = 'table' and name = ?) as \"exists\"".to_string(),
            vec![Value::Text(table.to_string())],
        )
    }

    fn compile_column_listing(&self, _schema: Option<&str>, table: &str) -> (String, Vec<Value>) {
        (
            "select name as column_name from pragma_table_info(?) order by cid".to_string(),
            vec![Value::Text(table.to_string())],
        )
    }

    fn compile_enable_foreign_key_constraints(&self) -> String {
        "PRAGMA foreign_keys = ON".to_string()
    }

    fn compile_disable_foreign_key_constraints(&self) -> String {
        "PRAGMA foreign_keys = OFF".to_string()
    }
}
