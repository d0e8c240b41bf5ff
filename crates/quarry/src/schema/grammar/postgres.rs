use super::{SchemaGrammar, quote_literal, unsupported};
use crate::config::Dialect;
use crate::error::DbResult;
use crate::schema::blueprint::Blueprint;
use crate::schema::column::{ColumnDefinition, ColumnType};
use crate::schema::command::{Command, IndexCommand};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSchemaGrammar;

impl PostgresSchemaGrammar {
    /// `comment on column` statements for commented columns.
    fn column_comments<'a>(
        &self,
        blueprint: &Blueprint,
        columns: impl Iterator<Item = &'a ColumnDefinition>,
    ) -> Vec<String> {
        let table = self.wrap_table(blueprint.table());
        columns
            .filter_map(|c| {
                c.comment.as_ref().map(|comment| {
                    format!(
                        "comment on column {table}.{} is {}",
                        self.wrap(&c.name),
                        quote_literal(comment)
                    )
                })
            })
            .collect()
    }
}

fn timestamp(precision: Option<u32>, zone: &str) -> String {
    format!("timestamp({}) {zone} time zone", precision.unwrap_or(0))
}

impl SchemaGrammar for PostgresSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn type_sql(&self, column: &ColumnDefinition) -> DbResult<String> {
        if column.auto_increment {
            return match column.ty {
                ColumnType::TinyInteger | ColumnType::SmallInteger => Ok("smallserial".into()),
                ColumnType::MediumInteger | ColumnType::Integer => Ok("serial".into()),
                ColumnType::BigInteger => Ok("bigserial".into()),
                _ => Err(unsupported(Dialect::Postgres, "auto-increment on non-integer columns")),
            };
        }
        Ok(match &column.ty {
            ColumnType::TinyInteger | ColumnType::SmallInteger => "smallint".into(),
            ColumnType::MediumInteger | ColumnType::Integer => "integer".into(),
            ColumnType::BigInteger => "bigint".into(),
            ColumnType::Boolean => "boolean".into(),
            ColumnType::Char { length } => format!("char({length})"),
            ColumnType::String { length } => format!("varchar({length})"),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => "text".into(),
            ColumnType::Float => "real".into(),
            ColumnType::Double => "double precision".into(),
            ColumnType::Decimal { precision, scale } => format!("decimal({precision}, {scale})"),
            ColumnType::Date => "date".into(),
            ColumnType::DateTime { precision } | ColumnType::Timestamp { precision } => {
                timestamp(*precision, "without")
            }
            ColumnType::TimestampTz { precision } => timestamp(*precision, "with"),
            ColumnType::Time => "time(0) without time zone".into(),
            ColumnType::Binary => "bytea".into(),
            ColumnType::Json => "json".into(),
            ColumnType::Jsonb => "jsonb".into(),
            ColumnType::Uuid => "uuid".into(),
            ColumnType::Enum { allowed } => {
                let allowed = allowed.iter().map(|v| quote_literal(v)).collect::<Vec<_>>();
                format!(
                    "varchar(255) check ({} in ({}))",
                    self.wrap(&column.name),
                    allowed.join(", ")
                )
            }
        })
    }

    fn modifiers(&self, _blueprint: &Blueprint, column: &ColumnDefinition) -> DbResult<String> {
        if column.virtual_as.is_some() {
            return Err(unsupported(Dialect::Postgres, "virtual generated columns"));
        }
        let mut sql = String::new();
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" collate {}", self.query_grammar().wrap_segment(collation)));
        }
        sql.push_str(if column.nullable { " null" } else { " not null" });
        if let Some(default) = &column.default {
            sql.push_str(&format!(" default {}", self.default_value(default)));
        } else if column.use_current && column.ty.is_temporal() {
            sql.push_str(" default CURRENT_TIMESTAMP");
        }
        if let Some(expression) = &column.stored_as {
            sql.push_str(&format!(" generated always as ({expression}) stored"));
        }
        if column.auto_increment {
            sql.push_str(" primary key");
        }
        Ok(sql)
    }

    fn compile_create(&self, blueprint: &Blueprint, _commands: &[Command]) -> DbResult<Vec<String>> {
        let create = if blueprint.temporary { "create temporary table" } else { "create table" };
        let mut statements = vec![format!(
            "{create} {} ({})",
            self.wrap_table(blueprint.table()),
            self.added_column_sql(blueprint)?.join(", ")
        )];
        statements.extend(self.column_comments(blueprint, blueprint.added_columns()));
        Ok(statements)
    }

    fn compile_add(&self, blueprint: &Blueprint) -> DbResult<Vec<String>> {
        let columns = self
            .added_column_sql(blueprint)?
            .into_iter()
            .map(|c| format!("add column {c}"))
            .collect::<Vec<_>>();
        let mut statements = vec![format!(
            "alter table {} {}",
            self.wrap_table(blueprint.table()),
            columns.join(", ")
        )];
        statements.extend(self.column_comments(blueprint, blueprint.added_columns()));
        Ok(statements)
    }

    /// Type, nullability and default of each changed column.
    fn compile_change(&self, blueprint: &Blueprint) -> DbResult<Vec<String>> {
        let mut changes = Vec::new();
        for column in blueprint.changed_columns() {
            let name = self.wrap(&column.name);
            changes.push(format!("alter column {name} type {}", self.type_sql(column)?));
            changes.push(format!(
                "alter column {name} {}",
                if column.nullable { "drop not null" } else { "set not null" }
            ));
            match (&column.default, column.use_current) {
                (Some(default), _) => changes.push(format!(
                    "alter column {name} set default {}",
                    self.default_value(default)
                )),
                (None, true) => changes.push(format!("alter column {name} set default CURRENT_TIMESTAMP")),
                (None, false) => changes.push(format!("alter column {name} drop default")),
            }
        }
        let mut statements = vec![format!(
            "alter table {} {}",
            self.wrap_table(blueprint.table()),
            changes.join(", ")
        )];
        statements.extend(self.column_comments(blueprint, blueprint.changed_columns()));
        Ok(statements)
    }

    fn compile_unique(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} add constraint {} unique ({})",
            self.wrap_table(blueprint.table()),
            self.wrap(&index.name),
            self.columnize(&index.columns)
        )])
    }

    fn compile_index(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        let using = index
            .algorithm
            .as_ref()
            .map(|a| format!(" using {a}"))
            .unwrap_or_default();
        Ok(vec![format!(
            "create index {} on {}{using} ({})",
            self.wrap(&index.name),
            self.wrap_table(blueprint.table()),
            self.columnize(&index.columns)
        )])
    }

    fn compile_fulltext(&self, blueprint: &Blueprint, index: &IndexCommand) -> DbResult<Vec<String>> {
        let vectors = index
            .columns
            .iter()
            .map(|c| format!("to_tsvector('english', {})", self.wrap(c)))
            .collect::<Vec<_>>()
            .join(" || ");
        Ok(vec![format!(
            "create index {} on {} using gin (({vectors}))",
            self.wrap(&index.name),
            self.wrap_table(blueprint.table())
        )])
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> DbResult<Vec<String>> {
        let drops = columns
            .iter()
            .map(|c| format!("drop column {}", self.wrap(c)))
            .collect::<Vec<_>>();
        Ok(vec![format!(
            "alter table {} {}",
            self.wrap_table(blueprint.table()),
            drops.join(", ")
        )])
    }

    fn compile_drop_primary(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        self.compile_drop_foreign(blueprint, name)
    }

    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        self.compile_drop_foreign(blueprint, name)
    }

    fn compile_drop_index(&self, _blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!("drop index {}", self.wrap(name))])
    }

    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "alter table {} drop constraint {}",
            self.wrap_table(blueprint.table()),
            self.wrap(name)
        )])
    }

    fn compile_table_comment(&self, blueprint: &Blueprint, comment: &str) -> DbResult<Vec<String>> {
        Ok(vec![format!(
            "comment on table {} is {}",
            self.wrap_table(blueprint.table()),
            quote_literal(comment)
        )])
    }

    fn compile_table_exists(&self, schema: Option<&str>, table: &str) -> (String, Vec<Value>) {
        let (schema_sql, mut bindings) = match schema {
            Some(schema) => ("?", vec![Value::Text(schema.to_string())]),
            None => ("current_schema()", Vec::new()),
        };
        bindings.push(Value::Text(table.to_string()));
        (
            format!(
                "select exists (select 1 from information_schema.tables where table_schema = {schema_sql} and table_name = ? and table_type = 'BASE TABLE') as \"exists\""
            ),
            bindings,
        )
    }

    fn compile_column_listing(&self, schema: Option<&str>, table: &str) -> (String, Vec<Value>) {
        let (schema_sql, mut bindings) = match schema {
            Some(schema) => ("?", vec![Value::Text(schema.to_string())]),
            None => ("current_schema()", Vec::new()),
        };
        bindings.push(Value::Text(table.to_string()));
        (
            format!(
                "select column_name from information_schema.columns where table_schema = {schema_sql} and table_name = ? order by ordinal_position"
            ),
            bindings,
        )
    }

    fn compile_enable_foreign_key_constraints(&self) -> String {
        "SET CONSTRAINTS ALL IMMEDIATE".to_string()
    }

    fn compile_disable_foreign_key_constraints(&self) -> String {
        "SET CONSTRAINTS ALL DEFERRED".to_string()
    }
}
