//! Structural commands recorded on a blueprint.

/// Index flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
}

impl IndexKind {
    /// Suffix used in generated index names.
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Primary => "primary",
            IndexKind::Unique => "unique",
            IndexKind::Index => "index",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexCommand {
    pub kind: IndexKind,
    pub name: String,
    pub columns: Vec<String>,
    /// Index method (`gin`, `btree`, ...).
    pub algorithm: Option<String>,
}

impl IndexCommand {
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn algorithm(&mut self, algorithm: impl Into<String>) -> &mut Self {
        self.algorithm = Some(algorithm.into());
        self
    }
}

/// `foreign key (...) references table (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub references: Vec<String>,
    pub on: String,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKeyDefinition {
    pub fn references(&mut self, columns: &[&str]) -> &mut Self {
        self.references = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Referenced table.
    pub fn on(&mut self, table: impl Into<String>) -> &mut Self {
        self.on = table.into();
        self
    }

    pub fn on_delete(&mut self, action: impl Into<String>) -> &mut Self {
        self.on_delete = Some(action.into());
        self
    }

    pub fn on_update(&mut self, action: impl Into<String>) -> &mut Self {
        self.on_update = Some(action.into());
        self
    }

    pub fn cascade_on_delete(&mut self) -> &mut Self {
        self.on_delete("cascade")
    }

    pub fn null_on_delete(&mut self) -> &mut Self {
        self.on_delete("set null")
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create,
    /// Add every non-change column (implied on existing tables).
    Add,
    /// Modify every change column (implied on existing tables).
    Change,
    Index(IndexCommand),
    Foreign(ForeignKeyDefinition),
    DropColumn { columns: Vec<String> },
    RenameColumn { from: String, to: String },
    DropPrimary { name: String },
    DropUnique { name: String },
    DropIndex { name: String },
    DropForeign { name: String },
    Rename { to: String },
    Drop,
    DropIfExists,
    Comment { comment: String },
}
