//! Materialized columns of a loaded table.

use tablemirror_core::{ColumnDefinition, ColumnFlags, ColumnType, ROW_ID_ALIAS};

use crate::derived::Derivation;

/// A column as the table sees it: its definition, the write-eligibility
/// flags the schema set after load, and how its value is produced.
#[derive(Debug, Clone)]
pub struct Column {
    definition: ColumnDefinition,
    flags: ColumnFlags,
    read_only: bool,
    derivation: Option<Derivation>,
}

impl Column {
    pub(crate) fn stored(definition: ColumnDefinition) -> Self {
        Self {
            definition,
            flags: ColumnFlags::NONE,
            read_only: false,
            derivation: None,
        }
    }

    pub(crate) fn row_id() -> Self {
        Self {
            definition: ColumnDefinition::new(ROW_ID_ALIAS, ColumnType::Integer),
            flags: ColumnFlags::GENERATED_KEY,
            read_only: true,
            derivation: None,
        }
    }

    pub(crate) fn derived(definition: ColumnDefinition, derivation: Derivation) -> Self {
        Self {
            definition,
            flags: ColumnFlags::NONE,
            read_only: true,
            derivation: Some(derivation),
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Declared definition.
    pub fn definition(&self) -> &ColumnDefinition {
        &self.definition
    }

    /// Current write-eligibility flags.
    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    /// Read-only columns never reach INSERT or UPDATE.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True for expression, parent-lookup and action columns.
    pub fn is_derived(&self) -> bool {
        self.derivation.is_some()
    }

    /// True for the surrogate row id column.
    pub fn is_row_id(&self) -> bool {
        self.name() == ROW_ID_ALIAS
    }

    /// Accepts edits through setters.
    pub fn is_writable(&self) -> bool {
        !self.read_only && !self.is_derived()
    }

    /// Listed in generated INSERT statements.
    pub fn eligible_for_insert(&self) -> bool {
        self.is_writable() && !self.is_row_id() && !self.flags.exclude_from_insert
    }

    /// Listed in generated UPDATE statements; edits mark the row dirty.
    pub fn eligible_for_update(&self) -> bool {
        self.is_writable() && !self.is_row_id() && !self.flags.exclude_from_update
    }

    pub(crate) fn derivation(&self) -> Option<&Derivation> {
        self.derivation.as_ref()
    }

    pub(crate) fn derivation_mut(&mut self) -> Option<&mut Derivation> {
        self.derivation.as_mut()
    }

    pub(crate) fn set_flags(&mut self, flags: ColumnFlags) {
        self.flags = flags;
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

/// Column-properties editor handed to
/// [`TableSchema::set_column_properties`](crate::TableSchema::set_column_properties)
/// right after every load.
///
/// Setters return whether the column exists; a load restricted to a subset of
/// fields simply has fewer columns to mark.
pub struct ColumnFlagsEditor<'a> {
    columns: &'a mut [Column],
}

impl<'a> ColumnFlagsEditor<'a> {
    pub(crate) fn new(columns: &'a mut [Column]) -> Self {
        Self { columns }
    }

    /// Names of the materialized columns.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Replace all flags of `column`.
    pub fn set_flags(&mut self, column: &str, flags: ColumnFlags) -> bool {
        self.update(column, |c| c.set_flags(flags))
    }

    /// Keep `column` out of INSERT statements.
    pub fn exclude_from_insert(&mut self, column: &str) -> bool {
        self.update(column, |c| c.flags.exclude_from_insert = true)
    }

    /// Keep `column` out of UPDATE statements and dirty tracking.
    pub fn exclude_from_update(&mut self, column: &str) -> bool {
        self.update(column, |c| c.flags.exclude_from_update = true)
    }

    /// Copy the engine-generated row id into `column` after each INSERT.
    pub fn receives_generated_id(&mut self, column: &str) -> bool {
        self.update(column, |c| c.flags.receives_generated_id = true)
    }

    /// Shorthand for an engine-assigned key column.
    pub fn generated_key(&mut self, column: &str) -> bool {
        self.set_flags(column, ColumnFlags::GENERATED_KEY)
    }

    /// Make `column` read-only for this table instance.
    pub fn read_only(&mut self, column: &str) -> bool {
        self.update(column, |c| c.set_read_only(true))
    }

    fn update(&mut self, column: &str, apply: impl FnOnce(&mut Column)) -> bool {
        match self.columns.iter_mut().find(|c| c.name() == column) {
            Some(col) => {
                apply(col);
                true
            }
            None => {
                tracing::debug!(column = %column, "Column not materialized; property ignored");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_column_is_never_eligible() {
        let col = Column::row_id();
        assert!(col.is_row_id());
        assert!(!col.eligible_for_insert());
        assert!(!col.eligible_for_update());
    }

    #[test]
    fn test_flags_control_eligibility() {
        let mut cols = vec![
            Column::stored(ColumnDefinition::new("id", ColumnType::Integer)),
            Column::stored(ColumnDefinition::new("name", ColumnType::Text)),
            Column::stored(ColumnDefinition::new("created", ColumnType::Timestamp)),
        ];
        let mut editor = ColumnFlagsEditor::new(&mut cols);
        assert!(editor.generated_key("id"));
        assert!(editor.exclude_from_update("created"));
        assert!(!editor.exclude_from_insert("missing"));

        assert!(!cols[0].eligible_for_insert());
        assert!(cols[0].flags().receives_generated_id);
        assert!(cols[1].eligible_for_insert() && cols[1].eligible_for_update());
        assert!(cols[2].eligible_for_insert());
        assert!(!cols[2].eligible_for_update());
    }

    #[test]
    fn test_read_only_override() {
        let mut cols = vec![Column::stored(ColumnDefinition::new("name", ColumnType::Text))];
        ColumnFlagsEditor::new(&mut cols).read_only("name");
        assert!(!cols[0].is_writable());
        assert!(!cols[0].eligible_for_update());
    }
}
