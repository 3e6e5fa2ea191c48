//! Rows, row identity and derived row state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tablemirror_core::{Error, OperationErrorKind, Result, Value};

use crate::column::Column;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Table`](crate::Table) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Stable key of a row within its table.
///
/// Keys are never reused, so a key stays valid across saves, accepts and
/// reloads of other rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(u64);

impl RowKey {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a row of a specific table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle {
    table: TableId,
    key: RowKey,
}

impl RowHandle {
    pub(crate) fn new(table: TableId, key: RowKey) -> Self {
        Self { table, key }
    }

    /// Table the row belongs to.
    pub fn table_id(&self) -> TableId {
        self.table
    }

    /// Row key within that table.
    pub fn key(&self) -> RowKey {
        self.key
    }
}

/// Pending-change status of a row relative to its last accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Matches the store.
    Unchanged,
    /// Not yet in the store.
    Added,
    /// In the store, with edits to write-eligible columns.
    Modified,
    /// In the store, marked for deletion.
    Deleted,
}

impl RowState {
    /// Short name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowState::Unchanged => "unchanged",
            RowState::Added => "added",
            RowState::Modified => "modified",
            RowState::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) key: RowKey,
    pub(crate) current: Vec<Value>,
    /// Accepted values; `None` until the row first reaches the store.
    pub(crate) baseline: Option<Vec<Value>>,
    pub(crate) pending_delete: bool,
}

impl Row {
    pub(crate) fn added(key: RowKey, values: Vec<Value>) -> Self {
        Self {
            key,
            current: values,
            baseline: None,
            pending_delete: false,
        }
    }

    pub(crate) fn loaded(key: RowKey, values: Vec<Value>) -> Self {
        Self {
            key,
            baseline: Some(values.clone()),
            current: values,
            pending_delete: false,
        }
    }

    /// Status is computed, never stored: a row whose edits were reverted by
    /// hand reads as unchanged again. Only columns `counts` accepts can make a
    /// row modified.
    pub(crate) fn state(&self, counts: impl Fn(usize) -> bool) -> RowState {
        match &self.baseline {
            None => RowState::Added,
            Some(_) if self.pending_delete => RowState::Deleted,
            Some(base) => {
                let differs = self
                    .current
                    .iter()
                    .zip(base)
                    .enumerate()
                    .any(|(idx, (now, then))| now != then && counts(idx));
                if differs {
                    RowState::Modified
                } else {
                    RowState::Unchanged
                }
            }
        }
    }

    /// True if column `idx` holds something other than its accepted value.
    pub(crate) fn differs_at(&self, idx: usize) -> bool {
        match &self.baseline {
            None => true,
            Some(base) => self.current.get(idx) != base.get(idx),
        }
    }

    /// Accepted value of column `idx`, falling back to the current value.
    pub(crate) fn original(&self, idx: usize) -> Option<&Value> {
        self.baseline
            .as_ref()
            .map_or(self.current.get(idx), |base| base.get(idx))
    }

    pub(crate) fn accept(&mut self) {
        self.baseline = Some(self.current.clone());
        self.pending_delete = false;
    }

    /// Restore the accepted values. Returns false for rows that have none.
    pub(crate) fn reject(&mut self) -> bool {
        self.pending_delete = false;
        match &self.baseline {
            Some(base) => {
                self.current.clone_from(base);
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_column(&mut self, value: Value) {
        self.current.push(value.clone());
        if let Some(base) = self.baseline.as_mut() {
            base.push(value);
        }
    }
}

/// Read-only view of one row's values, keyed by column name.
///
/// Passed to expression callbacks and used by [`Table::to_json`](crate::Table::to_json).
#[derive(Clone, Copy)]
pub struct RowValues<'a> {
    columns: &'a [Column],
    values: &'a [Value],
}

impl<'a> RowValues<'a> {
    pub(crate) fn new(columns: &'a [Column], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    /// Value of `column`, or `None` if the table has no such column.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name() == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Integer view of `column`, NULL and missing read as zero.
    pub fn get_i64(&self, column: &str) -> i64 {
        self.get(column).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Text view of `column`, NULL and missing read as empty.
    pub fn get_string(&self, column: &str) -> String {
        match self.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::Text(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let columns = self.columns;
        columns
            .iter()
            .map(Column::name)
            .zip(self.values.iter())
    }
}

impl fmt::Debug for RowValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Mutable view of a row that has not been added to its table yet.
///
/// Handed to [`TableSchema::populate_default_row`](crate::TableSchema::populate_default_row).
pub struct NewRow<'a> {
    columns: &'a [Column],
    values: &'a mut [Value],
}

impl<'a> NewRow<'a> {
    pub(crate) fn new(columns: &'a [Column], values: &'a mut [Value]) -> Self {
        Self { columns, values }
    }

    /// Current value of `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.index_of(column).and_then(|idx| self.values.get(idx))
    }

    /// Set `column`, coercing to its declared type.
    ///
    /// Fails for unknown, read-only and derived columns.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        let idx = self
            .index_of(column)
            .ok_or_else(|| Error::schema(format!("unknown column '{}'", column)))?;
        let col = &self.columns[idx];
        if !col.is_writable() {
            return Err(Error::operation(
                OperationErrorKind::ReadOnlyColumn,
                format!("column '{}' is read-only", column),
            ));
        }
        self.values[idx] = col.definition().column_type().coerce(value.into());
        Ok(())
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == column)
    }
}
