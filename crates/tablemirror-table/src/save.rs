//! Writing pending rows back to the store.
//!
//! A save emits INSERTs, then UPDATEs, then DELETEs, each in row order, inside
//! one transaction. On success the rows' accepted state moves forward; on
//! failure the transaction is rolled back and every row is reverted.

use tablemirror_core::{Error, ROW_ID_ALIAS, Result, Value};
use tablemirror_sqlite::{Executor, Transaction};

use crate::change_set::ChangeSet;
use crate::column::Column;
use crate::row::RowKey;
use crate::statement::{DeleteStatement, InsertStatement, TableRef, UpdateStatement};
use crate::table::Table;

/// Number of rows written by a save, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows deleted.
    pub deleted: usize,
}

impl SaveSummary {
    /// Total statements emitted.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

impl Table {
    /// Rows that currently need writing.
    pub fn change_set(&self) -> ChangeSet {
        ChangeSet::calculate(&self.columns, &self.rows, &self.changed)
    }

    /// Change set minus what this table is configured never to write.
    fn writable_change_set(&self) -> ChangeSet {
        let mut set = self.change_set();
        if self.options.delete_restricted && !set.deletes.is_empty() {
            tracing::warn!(
                table = %self.name,
                rows = set.deletes.len(),
                "Table is delete-restricted; deleted rows stay pending"
            );
            set.deletes.clear();
        }
        set
    }

    /// Persist pending changes in a transaction of their own.
    ///
    /// Read-only tables and tables without pending changes return at once
    /// without touching the store. If any statement fails, the transaction is
    /// rolled back, all rows are reverted to their accepted state and the
    /// original error is returned. Failures during that cleanup are logged.
    /// The record of edited columns is cleared either way.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn save(&mut self) -> Result<SaveSummary> {
        if self.options.read_only {
            self.changed.clear();
            tracing::debug!(table = %self.name, "Read-only table; nothing saved");
            return Ok(SaveSummary::default());
        }
        let set = self.writable_change_set();
        if !set.has_any() {
            self.changed.clear();
            return Ok(SaveSummary::default());
        }

        tracing::info!(
            table = %self.name,
            inserts = set.inserts.len(),
            updates = set.updates.len(),
            deletes = set.deletes.len(),
            "Saving table"
        );

        let store = self.store.clone();
        // Nothing was written if BEGIN fails, so the rows keep their edits.
        let tx = store.begin()?;
        let outcome = match self.emit(&tx, &set) {
            Ok(summary) => tx.commit().map(|()| summary),
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::error!(
                        table = %self.name,
                        error = %rollback,
                        "Rollback after failed save also failed"
                    );
                }
                Err(e)
            }
        };

        match outcome {
            Ok(summary) => {
                self.accept_changes();
                tracing::info!(
                    table = %self.name,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    "Saved table"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(table = %self.name, error = %e, "Save failed; reverting rows");
                self.revert_after_failed_save();
                self.changed.clear();
                Err(e)
            }
        }
    }

    /// Emit pending changes into a transaction owned by the caller.
    ///
    /// Commit, rollback, accept and reject are the caller's business. The
    /// record of edited columns is cleared either way.
    #[tracing::instrument(level = "debug", skip(self, tx), fields(table = %self.name))]
    pub fn save_in(&mut self, tx: &Transaction<'_>) -> Result<SaveSummary> {
        if !tx.store().same_store(&self.store) {
            return Err(Error::argument(format!(
                "transaction belongs to a different store than table '{}'",
                self.name
            )));
        }
        if self.options.read_only {
            self.changed.clear();
            return Ok(SaveSummary::default());
        }
        let set = self.writable_change_set();
        let result = if set.has_any() {
            self.emit(tx, &set)
        } else {
            Ok(SaveSummary::default())
        };
        self.changed.clear();
        result
    }

    /// Reject after a rolled-back save. New rows of a self-related table may
    /// reference each other, so enforcement is off while they are discarded.
    fn revert_after_failed_save(&mut self) {
        let previous = self
            .has_self_relation()
            .then(|| self.set_enforce_constraints(false));
        if let Err(revert) = self.reject_changes() {
            tracing::error!(
                table = %self.name,
                error = %revert,
                "Reverting rows after failed save also failed"
            );
        }
        if let Some(previous) = previous {
            self.set_enforce_constraints(previous);
        }
    }

    fn emit(&mut self, tx: &Transaction<'_>, set: &ChangeSet) -> Result<SaveSummary> {
        let namespace = tx.namespace().to_string();
        let name = self.name.clone();
        let table = TableRef::new(&namespace, &name);
        let row_id_idx = self.columns.iter().position(Column::is_row_id);
        let mut summary = SaveSummary::default();

        let insert_columns: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.eligible_for_insert())
            .map(|(idx, _)| idx)
            .collect();
        let id_targets: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_row_id() || c.flags().receives_generated_id)
            .map(|(idx, _)| idx)
            .collect();

        for &key in &set.inserts {
            let pos = self.position_of_key(key)?;
            let (sql, params) = insert_columns
                .iter()
                .fold(InsertStatement::new(table), |stmt, &idx| {
                    stmt.value(self.columns[idx].name(), self.rows[pos].current[idx].clone())
                })
                .build();
            tx.execute(&sql, &params)?;
            let id = Value::Integer(tx.last_insert_rowid()?);
            for &idx in &id_targets {
                self.rows[pos].current[idx] = id.clone();
            }
            self.recompute_row(pos, None);
            summary.inserted += 1;
        }

        for &key in &set.updates {
            let pos = self.position_of_key(key)?;
            let Some(edited) = self.changed.get(&key) else {
                continue;
            };
            let row = &self.rows[pos];
            let mut stmt = UpdateStatement::new(table, self.stored_row_id(row_id_idx, key)?);
            for idx in edited.iter() {
                let col = &self.columns[idx];
                if col.eligible_for_update() && row.differs_at(idx) {
                    stmt = stmt.set(col.name(), row.current[idx].clone());
                }
            }
            if stmt.is_empty() {
                continue;
            }
            let (sql, params) = stmt.build();
            tx.execute(&sql, &params)?;
            summary.updated += 1;
        }

        for &key in &set.deletes {
            let (sql, params) =
                DeleteStatement::new(table, self.stored_row_id(row_id_idx, key)?).build();
            tx.execute(&sql, &params)?;
            summary.deleted += 1;
        }

        Ok(summary)
    }

    /// Row id a row had when it was last accepted.
    fn stored_row_id(&self, row_id_idx: Option<usize>, key: RowKey) -> Result<Value> {
        let pos = self.position_of_key(key)?;
        row_id_idx
            .and_then(|idx| self.rows[pos].original(idx))
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                Error::Custom(format!(
                    "row {} of '{}' has no {}; load the table with its row ids",
                    key, self.name, ROW_ID_ALIAS
                ))
            })
    }

    /// Make the current values the accepted state of every row.
    ///
    /// Rows marked deleted are dropped, except in delete-restricted tables,
    /// where they stay marked because the store still holds them.
    pub fn accept_changes(&mut self) {
        let restricted = self.options.delete_restricted;
        self.rows.retain_mut(|row| {
            if row.pending_delete {
                return restricted;
            }
            row.accept();
            true
        });
        self.changed.clear();
        self.rebuild_self_lookups();
        self.recompute_all_derived();
    }

    /// Revert every row to its accepted state, in table order.
    ///
    /// Rows never accepted are removed. While constraints are enforced, removing
    /// a row that another live row still references fails, leaving the rows
    /// before it reverted and the rest untouched.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn reject_changes(&mut self) -> Result<()> {
        let mut pos = 0;
        let mut result = Ok(());
        while pos < self.rows.len() {
            if self.rows[pos].baseline.is_some() {
                self.rows[pos].reject();
                pos += 1;
                continue;
            }
            let removable = if self.enforce_constraints {
                self.check_not_referenced(pos)
            } else {
                Ok(())
            };
            if let Err(e) = removable {
                result = Err(e);
                break;
            }
            let row = self.rows.remove(pos);
            self.changed.remove(&row.key);
        }
        if result.is_ok() {
            self.changed.clear();
        }
        self.rebuild_self_lookups();
        self.recompute_all_derived();
        result
    }
}
