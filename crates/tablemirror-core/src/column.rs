//! Column definitions, write-eligibility flags and DDL rendering.

use crate::identifiers::{quote_ident, quote_literal};
use crate::types::ColumnType;
use crate::value::Value;

/// Alias of the surrogate row identifier selected with every load.
///
/// Every loaded row carries the engine's `rowid` under this name, giving it a
/// stable identity independent of any declared primary key. UPDATE and DELETE
/// statements target rows through it.
pub const ROW_ID_ALIAS: &str = "__row_id";

/// Index metadata attached to a column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Whether the index is unique.
    pub unique: bool,
}

impl IndexDescriptor {
    /// A non-unique index.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: false,
        }
    }

    /// A unique index.
    pub fn unique(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: true,
        }
    }
}

/// Immutable metadata for one column.
///
/// Built once when a schema declares its columns; the builder methods consume
/// `self` so a finished definition is never mutated in place.
///
/// # Example
///
/// ```
/// use tablemirror_core::{ColumnDefinition, ColumnType, Value};
///
/// let age = ColumnDefinition::new("Age", ColumnType::Integer)
///     .not_null()
///     .with_default(Value::Integer(0));
/// assert_eq!(age.render_ddl(), "\"Age\" INTEGER NOT NULL DEFAULT 0");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    nullable: bool,
    default: Option<Value>,
    index: Option<IndexDescriptor>,
}

impl ColumnDefinition {
    /// Create a nullable, non-key column without default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            nullable: true,
            default: None,
            index: None,
        }
    }

    /// Mark as primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set nullability explicitly.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default = if value.is_null() { None } else { Some(value) };
        self
    }

    /// Attach an index descriptor.
    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.index = Some(index);
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical type.
    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    /// Whether this column is the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether NULL is allowed.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Default value, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Index descriptor, if any.
    pub fn index(&self) -> Option<&IndexDescriptor> {
        self.index.as_ref()
    }

    /// Render the column clause of a CREATE TABLE statement.
    ///
    /// Order: quoted name, type, `PRIMARY KEY`, `NOT NULL`, `DEFAULT <value>`.
    /// Text and timestamp defaults are single-quoted; everything else uses its
    /// natural string form.
    pub fn render_ddl(&self) -> String {
        let mut ddl = format!("{} {}", quote_ident(&self.name), self.column_type.sql_name());
        if self.primary_key {
            ddl.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            ddl.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            ddl.push_str(" DEFAULT ");
            match default {
                Value::Text(s) => ddl.push_str(&quote_literal(s)),
                Value::Timestamp(_) => ddl.push_str(&quote_literal(&default.to_string())),
                other => ddl.push_str(&other.to_string()),
            }
        }
        ddl
    }
}

/// Render a `CREATE TABLE IF NOT EXISTS` statement plus any index statements.
///
/// The table reference is emitted as `{NS}."{NAME}"` so the result can be
/// returned directly from a schema's DDL hook.
pub fn render_create_table(columns: &[ColumnDefinition]) -> String {
    let body: Vec<String> = columns.iter().map(ColumnDefinition::render_ddl).collect();
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {{NS}}.\"{{NAME}}\" ({})",
        body.join(", ")
    );
    for col in columns {
        if let Some(idx) = &col.index {
            ddl.push_str(&format!(
                ";\nCREATE {}INDEX IF NOT EXISTS {{NS}}.{} ON \"{{NAME}}\" ({})",
                if idx.unique { "UNIQUE " } else { "" },
                quote_ident(&idx.name),
                quote_ident(&col.name)
            ));
        }
    }
    ddl
}

/// Write-eligibility markers attached to a materialized column.
///
/// These are orthogonal to [`ColumnDefinition`]: the store materializes columns
/// during a load and the schema's column-properties hook sets the flags
/// afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    /// Never listed in generated INSERT statements.
    pub exclude_from_insert: bool,
    /// Never listed in generated UPDATE statements; edits are not dirty.
    pub exclude_from_update: bool,
    /// Receives the engine-generated row id after an INSERT.
    pub receives_generated_id: bool,
}

impl ColumnFlags {
    /// No flags set.
    pub const NONE: Self = Self {
        exclude_from_insert: false,
        exclude_from_update: false,
        receives_generated_id: false,
    };

    /// Flags for an engine-assigned key: excluded from both writes, receives the id.
    pub const GENERATED_KEY: Self = Self {
        exclude_from_insert: true,
        exclude_from_update: true,
        receives_generated_id: true,
    };
}
