//! Declarative description of one table change.

use super::column::{ColumnDefinition, ColumnType};
use super::command::{Command, ForeignKeyDefinition, IndexCommand, IndexKind};
use super::grammar::SchemaGrammar;
use crate::error::DbResult;

/// Columns and commands for one table.
///
/// A blueprint is filled by the closure passed to
/// [`SchemaBuilder::create`](super::SchemaBuilder::create) or
/// [`SchemaBuilder::table`](super::SchemaBuilder::table) and compiled once by a
/// [`SchemaGrammar`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blueprint {
    table: String,
    columns: Vec<ColumnDefinition>,
    commands: Vec<Command>,
    pub temporary: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub engine: Option<String>,
}

const DEFAULT_STRING_LENGTH: u32 = 255;

impl Blueprint {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn creating(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, Command::Create))
    }

    pub fn added_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| !c.change)
    }

    pub fn changed_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.change)
    }

    /// `{table}_{columns}_{kind}`, lowercased with `.` and `-` replaced.
    pub fn index_name(&self, kind: &str, columns: &[String]) -> String {
        format!("{}_{}_{}", self.table, columns.join("_"), kind)
            .to_lowercase()
            .replace(['-', '.'], "_")
    }

    // ── table-level commands ────────────────────────────────────────────────

    pub fn create(&mut self) {
        self.commands.push(Command::Create);
    }

    pub fn temporary(&mut self) {
        self.temporary = true;
    }

    pub fn charset(&mut self, charset: impl Into<String>) {
        self.charset = Some(charset.into());
    }

    pub fn collation(&mut self, collation: impl Into<String>) {
        self.collation = Some(collation.into());
    }

    pub fn engine(&mut self, engine: impl Into<String>) {
        self.engine = Some(engine.into());
    }

    pub fn drop(&mut self) {
        self.commands.push(Command::Drop);
    }

    pub fn drop_if_exists(&mut self) {
        self.commands.push(Command::DropIfExists);
    }

    pub fn rename(&mut self, to: impl Into<String>) {
        self.commands.push(Command::Rename { to: to.into() });
    }

    /// Table comment.
    pub fn comment(&mut self, comment: impl Into<String>) {
        self.commands.push(Command::Comment {
            comment: comment.into(),
        });
    }

    // ── columns ─────────────────────────────────────────────────────────────

    pub fn add_column(&mut self, name: &str, ty: ColumnType) -> &mut ColumnDefinition {
        let idx = self.columns.len();
        self.columns.push(ColumnDefinition::new(name, ty));
        &mut self.columns[idx]
    }

    /// Auto-incrementing unsigned integer primary key.
    pub fn increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Integer).unsigned().auto_increment()
    }

    pub fn big_increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::BigInteger).unsigned().auto_increment()
    }

    /// `big_increments("id")`.
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.big_increments("id")
    }

    pub fn tiny_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::TinyInteger)
    }

    pub fn small_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::SmallInteger)
    }

    pub fn medium_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::MediumInteger)
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Integer)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::BigInteger)
    }

    pub fn unsigned_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.integer(name).unsigned()
    }

    pub fn unsigned_big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.big_integer(name).unsigned()
    }

    /// Column for a key referencing a `big_increments` id.
    pub fn foreign_id(&mut self, name: &str) -> &mut ColumnDefinition {
        self.unsigned_big_integer(name)
    }

    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Boolean)
    }

    pub fn char(&mut self, name: &str, length: u32) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Char { length })
    }

    /// `varchar(length)`; 0 means the default of 255.
    pub fn string(&mut self, name: &str, length: u32) -> &mut ColumnDefinition {
        let length = if length == 0 { DEFAULT_STRING_LENGTH } else { length };
        self.add_column(name, ColumnType::String { length })
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Text)
    }

    pub fn medium_text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::MediumText)
    }

    pub fn long_text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::LongText)
    }

    pub fn float(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Float)
    }

    pub fn double(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Double)
    }

    pub fn decimal(&mut self, name: &str, precision: u32, scale: u32) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Decimal { precision, scale })
    }

    pub fn date(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Date)
    }

    pub fn date_time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::DateTime { precision: None })
    }

    pub fn timestamp(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Timestamp { precision: None })
    }

    pub fn timestamp_tz(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::TimestampTz { precision: None })
    }

    pub fn time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Time)
    }

    /// Nullable `created_at` and `updated_at`.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    /// Nullable `deleted_at`.
    pub fn soft_deletes(&mut self) -> &mut ColumnDefinition {
        self.timestamp("deleted_at").nullable()
    }

    pub fn binary(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Binary)
    }

    pub fn json(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Json)
    }

    pub fn jsonb(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Jsonb)
    }

    pub fn uuid(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Uuid)
    }

    pub fn enumeration(&mut self, name: &str, allowed: &[&str]) -> &mut ColumnDefinition {
        let allowed = allowed.iter().map(|v| v.to_string()).collect();
        self.add_column(name, ColumnType::Enum { allowed })
    }

    // ── indexes / keys ──────────────────────────────────────────────────────

    pub fn primary(&mut self, columns: &[&str]) -> &mut IndexCommand {
        self.push_index(IndexKind::Primary, columns)
    }

    pub fn unique(&mut self, columns: &[&str]) -> &mut IndexCommand {
        self.push_index(IndexKind::Unique, columns)
    }

    pub fn index(&mut self, columns: &[&str]) -> &mut IndexCommand {
        self.push_index(IndexKind::Index, columns)
    }

    pub fn fulltext(&mut self, columns: &[&str]) -> &mut IndexCommand {
        self.push_index(IndexKind::Fulltext, columns)
    }

    fn push_index(&mut self, kind: IndexKind, columns: &[&str]) -> &mut IndexCommand {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let command = self.index_command(kind, columns);
        let idx = self.commands.len();
        self.commands.push(Command::Index(command));
        match &mut self.commands[idx] {
            Command::Index(index) => index,
            _ => unreachable!("index command was just pushed"),
        }
    }

    fn index_command(&self, kind: IndexKind, columns: Vec<String>) -> IndexCommand {
        IndexCommand {
            kind,
            name: self.index_name(kind.as_str(), &columns),
            columns,
            algorithm: None,
        }
    }

    /// Foreign key on `columns`; finish with `.references(..).on(..)`.
    pub fn foreign(&mut self, columns: &[&str]) -> &mut ForeignKeyDefinition {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let definition = ForeignKeyDefinition {
            name: self.index_name("foreign", &columns),
            columns,
            references: vec!["id".to_string()],
            on: String::new(),
            on_delete: None,
            on_update: None,
        };
        let idx = self.commands.len();
        self.commands.push(Command::Foreign(definition));
        match &mut self.commands[idx] {
            Command::Foreign(foreign) => foreign,
            _ => unreachable!("foreign command was just pushed"),
        }
    }

    // ── drops / renames ─────────────────────────────────────────────────────

    pub fn drop_column(&mut self, columns: &[&str]) {
        self.commands.push(Command::DropColumn {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
    }

    pub fn drop_timestamps(&mut self) {
        self.drop_column(&["created_at", "updated_at"]);
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        self.commands.push(Command::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// Drop the primary key; `None` uses the engine's default name.
    pub fn drop_primary(&mut self, name: Option<&str>) {
        let name = name.map_or_else(|| format!("{}_pkey", self.table), str::to_string);
        self.commands.push(Command::DropPrimary { name });
    }

    pub fn drop_unique(&mut self, name: &str) {
        self.commands.push(Command::DropUnique {
            name: name.to_string(),
        });
    }

    pub fn drop_index(&mut self, name: &str) {
        self.commands.push(Command::DropIndex {
            name: name.to_string(),
        });
    }

    pub fn drop_foreign(&mut self, name: &str) {
        self.commands.push(Command::DropForeign {
            name: name.to_string(),
        });
    }

    // ── compilation ─────────────────────────────────────────────────────────

    /// Commands with the implied ones added: `Add` / `Change` on existing
    /// tables, and index commands for fluent column indexes.
    pub fn commands_with_implied(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(self.commands.len() + 2);
        if !self.creating() {
            if self.added_columns().next().is_some() {
                commands.push(Command::Add);
            }
            if self.changed_columns().next().is_some() {
                commands.push(Command::Change);
            }
        }
        commands.extend(self.commands.iter().cloned());

        for column in &self.columns {
            let flags = [
                (column.primary, IndexKind::Primary),
                (column.unique, IndexKind::Unique),
                (column.index, IndexKind::Index),
            ];
            for (set, kind) in flags {
                if set {
                    commands.push(Command::Index(
                        self.index_command(kind, vec![column.name.clone()]),
                    ));
                }
            }
        }
        commands
    }

    /// DDL statements, in execution order.
    pub fn to_sql(&self, grammar: &dyn SchemaGrammar) -> DbResult<Vec<String>> {
        let commands = self.commands_with_implied();
        let mut statements = Vec::new();
        for command in &commands {
            statements.extend(grammar.compile_command(self, command, &commands)?);
        }
        Ok(statements)
    }
}
