//! Classification of pending rows into inserts, updates and deletes.

use std::collections::HashMap;

use tablemirror_core::ColumnSet;

use crate::column::Column;
use crate::row::{Row, RowKey, RowState};

/// Rows that need writing, by kind, in table order.
///
/// Only modified rows with at least one recorded edit to an update-eligible
/// column land in `updates`. A row whose only edits were to excluded or derived
/// columns is therefore never written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Rows to INSERT.
    pub inserts: Vec<RowKey>,
    /// Rows to UPDATE.
    pub updates: Vec<RowKey>,
    /// Rows to DELETE.
    pub deletes: Vec<RowKey>,
}

impl ChangeSet {
    /// Classify `rows`.
    pub(crate) fn calculate(
        columns: &[Column],
        rows: &[Row],
        changed: &HashMap<RowKey, ColumnSet>,
    ) -> Self {
        let mut set = ChangeSet::default();
        let counts = |idx: usize| columns.get(idx).is_some_and(Column::eligible_for_update);
        for row in rows {
            match row.state(counts) {
                RowState::Added => set.inserts.push(row.key),
                RowState::Deleted => set.deletes.push(row.key),
                RowState::Modified => {
                    if changed.get(&row.key).is_some_and(|cols| !cols.is_empty()) {
                        set.updates.push(row.key);
                    }
                }
                RowState::Unchanged => {}
            }
        }
        set
    }

    /// True if any of the three sets is non-empty.
    pub fn has_any(&self) -> bool {
        !(self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty())
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    /// True if nothing needs writing.
    pub fn is_empty(&self) -> bool {
        !self.has_any()
    }
}
