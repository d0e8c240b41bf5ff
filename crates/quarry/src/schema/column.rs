//! Column types and the fluent column definition.

use crate::value::Value;

/// Logical column type; each grammar maps it to a native type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    TinyInteger,
    SmallInteger,
    MediumInteger,
    Integer,
    BigInteger,
    Boolean,
    Char { length: u32 },
    String { length: u32 },
    Text,
    MediumText,
    LongText,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Date,
    DateTime { precision: Option<u32> },
    Timestamp { precision: Option<u32> },
    TimestampTz { precision: Option<u32> },
    Time,
    Binary,
    Json,
    Jsonb,
    Uuid,
    Enum { allowed: Vec<String> },
}

impl ColumnType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInteger
                | ColumnType::SmallInteger
                | ColumnType::MediumInteger
                | ColumnType::Integer
                | ColumnType::BigInteger
        )
    }

    /// Accepts `CURRENT_TIMESTAMP` defaults.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnType::DateTime { .. } | ColumnType::Timestamp { .. } | ColumnType::TimestampTz { .. }
        )
    }
}

/// One column of a [`Blueprint`](super::Blueprint), built with chained modifiers.
///
/// ```ignore
/// table.string("email", 255).nullable().default("none").comment("login");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub auto_increment: bool,
    pub unsigned: bool,
    pub stored_as: Option<String>,
    pub virtual_as: Option<String>,
    pub comment: Option<String>,
    pub use_current: bool,
    pub use_current_on_update: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub after: Option<String>,
    pub first: bool,
    pub primary: bool,
    pub unique: bool,
    pub index: bool,
    /// Modify an existing column instead of adding one.
    pub change: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            auto_increment: false,
            unsigned: false,
            stored_as: None,
            virtual_as: None,
            comment: None,
            use_current: false,
            use_current_on_update: false,
            charset: None,
            collation: None,
            after: None,
            first: false,
            primary: false,
            unique: false,
            index: false,
            change: false,
        }
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    /// Default value; pass [`raw`](crate::raw) for an SQL expression.
    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Auto-incrementing primary key.
    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    /// Stored generated column.
    pub fn stored_as(&mut self, expression: impl Into<String>) -> &mut Self {
        self.stored_as = Some(expression.into());
        self
    }

    /// Virtual generated column.
    pub fn virtual_as(&mut self, expression: impl Into<String>) -> &mut Self {
        self.virtual_as = Some(expression.into());
        self
    }

    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    /// Default to `CURRENT_TIMESTAMP`.
    pub fn use_current(&mut self) -> &mut Self {
        self.use_current = true;
        self
    }

    /// Refresh to `CURRENT_TIMESTAMP` on update (MySQL).
    pub fn use_current_on_update(&mut self) -> &mut Self {
        self.use_current_on_update = true;
        self
    }

    pub fn charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn collation(&mut self, collation: impl Into<String>) -> &mut Self {
        self.collation = Some(collation.into());
        self
    }

    /// Place after `column` (MySQL).
    pub fn after(&mut self, column: impl Into<String>) -> &mut Self {
        self.after = Some(column.into());
        self
    }

    /// Place first in the table (MySQL).
    pub fn first(&mut self) -> &mut Self {
        self.first = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn index(&mut self) -> &mut Self {
        self.index = true;
        self
    }

    /// Mark as a change to an existing column.
    pub fn change(&mut self) -> &mut Self {
        self.change = true;
        self
    }
}
