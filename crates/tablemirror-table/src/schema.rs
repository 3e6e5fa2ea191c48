//! Per-table capabilities supplied by the application.

use serde::{Deserialize, Serialize};
use tablemirror_core::{Error, OperationErrorKind, Result};

use crate::column::ColumnFlagsEditor;
use crate::row::NewRow;

/// What a concrete table type provides to the generic [`Table`](crate::Table).
///
/// DDL and seed SQL may contain the `{NS}` and `{NAME}` placeholders; they are
/// substituted with the store namespace and [`table_name`](Self::table_name)
/// before execution.
///
/// # Example
///
/// ```
/// use tablemirror_core::{ColumnDefinition, ColumnType, Result, render_create_table};
/// use tablemirror_table::{ColumnFlagsEditor, TableSchema};
///
/// struct People;
///
/// impl TableSchema for People {
///     fn table_name(&self) -> &str {
///         "people"
///     }
///
///     fn ddl(&self) -> String {
///         render_create_table(&[
///             ColumnDefinition::new("id", ColumnType::Integer).primary_key(),
///             ColumnDefinition::new("name", ColumnType::Text).not_null(),
///         ])
///     }
///
///     fn set_column_properties(&self, columns: &mut ColumnFlagsEditor<'_>) -> Result<()> {
///         columns.generated_key("id");
///         Ok(())
///     }
///
///     fn schema_version(&self) -> u32 {
///         1
///     }
/// }
/// ```
pub trait TableSchema: Send + Sync + 'static {
    /// Unqualified table name.
    fn table_name(&self) -> &str;

    /// `CREATE TABLE` statement(s), placeholders allowed.
    fn ddl(&self) -> String;

    /// Mark write-eligibility of the freshly loaded columns.
    fn set_column_properties(&self, columns: &mut ColumnFlagsEditor<'_>) -> Result<()>;

    /// Name of the primary key column, if the table declares one.
    fn primary_key_name(&self) -> Option<&str> {
        None
    }

    /// Version of the DDL, for migration bookkeeping by the application.
    fn schema_version(&self) -> u32;

    /// Seed statements run by [`Table::populate`](crate::Table::populate).
    fn seed_sql(&self) -> Option<String> {
        None
    }

    /// Fill in a fresh row for [`Table::add_default_row`](crate::Table::add_default_row).
    fn populate_default_row(&self, row: &mut NewRow<'_>) -> Result<()> {
        let _ = row;
        Err(Error::operation(
            OperationErrorKind::NotImplemented,
            format!("table '{}' does not create default rows", self.table_name()),
        ))
    }
}

/// Per-instance table behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Saves are no-ops and default rows cannot be added.
    pub read_only: bool,
    /// Rows marked deleted are never deleted from the store.
    pub delete_restricted: bool,
    /// Relax in-memory enforcement of self-referential relations.
    pub relaxed_constraints: bool,
}

impl TableOptions {
    /// Default options: writable, deletes allowed, constraints enforced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set read-only.
    #[must_use]
    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Set delete-restricted.
    #[must_use]
    pub fn delete_restricted(mut self, value: bool) -> Self {
        self.delete_restricted = value;
        self
    }

    /// Turn off in-memory relation enforcement from the start.
    #[must_use]
    pub fn relaxed_constraints(mut self, value: bool) -> Self {
        self.relaxed_constraints = value;
        self
    }
}
