//! Transactions spanning more than one table.
//!
//! [`TransactionCoordinator`] runs work against one [`Store`] in a single
//! transaction and keeps the in-memory tables consistent with the outcome.
//!
//! # Modes
//!
//! - **Statement list**: [`TransactionCoordinator::execute_statements`] runs raw
//!   SQL in order and rolls everything back on the first failure. It knows
//!   nothing about tables.
//! - **Table callback**: [`TransactionCoordinator::save_tables`] flushes each
//!   table on its own, opens one transaction and hands it to a callback that
//!   edits the tables and calls [`Table::save_in`] on each. Success accepts the
//!   rows of every table; failure rolls back and reverts every table.
//!
//! # Example
//!
//! ```ignore
//! let mut coordinator = TransactionCoordinator::new(&store);
//! coordinator.save_tables(&mut [&mut orders, &mut lines], |tx, tables| {
//!     tables[0].set_value(order, "status", Value::from("closed"))?;
//!     tables[1].add_row(&[("order_id", Value::Integer(7))])?;
//!     for table in tables.iter_mut() {
//!         table.save_in(tx)?;
//!     }
//!     Ok(())
//! })?;
//! ```

use tablemirror_core::{Error, Result};
use tablemirror_sqlite::{Executor, Store, Transaction};
use tablemirror_table::Table;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for coordinator behavior.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Flush every table with its own save before the shared transaction opens.
    pub flush_before_transaction: bool,
    /// Turn in-memory constraint enforcement off while reverting tables that
    /// relate to themselves. Reverting a new parent row together with a new
    /// child of it fails otherwise.
    pub relax_self_relations_on_revert: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            flush_before_transaction: true,
            relax_self_relations_on_revert: true,
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs statement lists and multi-table saves as single transactions.
#[derive(Debug)]
pub struct TransactionCoordinator {
    store: Store,
    config: CoordinatorConfig,
    committed: usize,
    rolled_back: usize,
}

impl TransactionCoordinator {
    /// Create a coordinator for `store` with default configuration.
    pub fn new(store: &Store) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    /// Create a coordinator with explicit configuration.
    pub fn with_config(store: &Store, config: CoordinatorConfig) -> Self {
        Self {
            store: store.clone(),
            config,
            committed: 0,
            rolled_back: 0,
        }
    }

    /// The store transactions are opened on.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ========================================================================
    // Statement list
    // ========================================================================

    /// Run `statements` in order inside one transaction.
    ///
    /// Any failure rolls the whole list back and is returned as is. Returns
    /// the total number of affected rows.
    #[tracing::instrument(level = "debug", skip(self, statements), fields(count = statements.len()))]
    pub fn execute_statements<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<usize> {
        if statements.is_empty() {
            return Ok(0);
        }
        let store = self.store.clone();
        let tx = store.begin()?;
        let outcome = statements
            .iter()
            .try_fold(0, |affected, sql| -> Result<usize> {
                Ok(affected + tx.execute(sql.as_ref(), &[])?)
            });

        match outcome {
            Ok(affected) => {
                tx.commit()?;
                self.committed += 1;
                tracing::info!(statements = statements.len(), affected, "Executed statement list");
                Ok(affected)
            }
            Err(e) => {
                self.rollback(tx);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Table callback
    // ========================================================================

    /// Save several tables atomically.
    ///
    /// Each table is first saved on its own so it enters the shared
    /// transaction with a clean baseline. `callback` then receives the open
    /// transaction and the tables; it must call [`Table::save_in`] on each
    /// table exactly once. On success the transaction commits and every table
    /// accepts its rows. On failure the transaction rolls back, every table
    /// reverts to its baseline and the original error is returned.
    ///
    /// Fails with an argument error if `tables` is empty or a table is bound
    /// to a different store.
    #[tracing::instrument(
        level = "debug",
        skip(self, tables, callback),
        fields(tables = tables.len())
    )]
    pub fn save_tables<F>(&mut self, tables: &mut [&mut Table], callback: F) -> Result<()>
    where
        F: FnOnce(&Transaction<'_>, &mut [&mut Table]) -> Result<()>,
    {
        if tables.is_empty() {
            return Err(Error::argument("at least one table is required"));
        }
        if let Some(foreign) = tables.iter().find(|t| !t.store().same_store(&self.store)) {
            return Err(Error::argument(format!(
                "table '{}' is bound to a different store",
                foreign.name()
            )));
        }

        if self.config.flush_before_transaction {
            for table in tables.iter_mut() {
                table.save()?;
            }
        }

        let store = self.store.clone();
        let tx = store.begin()?;
        let outcome = match callback(&tx, &mut *tables) {
            Ok(()) => tx.commit(),
            Err(e) => {
                self.rollback(tx);
                Err(e)
            }
        };

        match outcome {
            Ok(()) => {
                for table in tables.iter_mut() {
                    table.accept_changes();
                }
                self.committed += 1;
                tracing::info!(tables = tables.len(), "Committed multi-table save");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Multi-table save failed; reverting tables");
                self.revert(tables);
                Err(e)
            }
        }
    }

    fn rollback(&mut self, tx: Transaction<'_>) {
        self.rolled_back += 1;
        if let Err(e) = tx.rollback() {
            tracing::error!(error = %e, "Rollback failed");
        }
    }

    /// Revert every table to its baseline. Errors are logged so they never
    /// mask the failure that caused the revert.
    fn revert(&self, tables: &mut [&mut Table]) {
        for table in tables.iter_mut() {
            let relax = self.config.relax_self_relations_on_revert && table.has_self_relation();
            let previous = relax.then(|| table.set_enforce_constraints(false));
            if let Err(e) = table.reject_changes() {
                tracing::error!(table = %table.name(), error = %e, "Reverting table failed");
            }
            if let Some(previous) = previous {
                table.set_enforce_constraints(previous);
            }
        }
    }

    // ========================================================================
    // Debugging
    // ========================================================================

    /// Dump coordinator state for debugging.
    pub fn debug_state(&self) -> CoordinatorDebugInfo {
        CoordinatorDebugInfo {
            committed: self.committed,
            rolled_back: self.rolled_back,
            in_transaction: self.store.in_transaction_on_this_thread(),
        }
    }
}

/// Debug information about coordinator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorDebugInfo {
    /// Transactions committed.
    pub committed: usize,
    /// Transactions rolled back after a failure inside them.
    pub rolled_back: usize,
    /// Whether the calling thread holds a transaction on the store.
    pub in_transaction: bool,
}

// ============================================================================
// Unit Tests
// ============================================================================
