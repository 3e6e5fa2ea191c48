//! Typed in-memory table mirrors synchronized to embedded SQLite.
//!
//! `tablemirror` loads a store table into memory, tracks edits per row and per
//! column, and writes back the minimal set of INSERT, UPDATE and DELETE
//! statements inside one transaction. When anything fails, the transaction
//! rolls back and the in-memory rows return to their last accepted baseline.
//!
//! # Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `tablemirror-core` | `Value`, `ColumnDefinition`, `Relation`, `Error` |
//! | `tablemirror-sqlite` | `Store`, `Transaction`, `Executor`, catalog queries |
//! | `tablemirror-table` | `Table`, `RowAccessor`, `ChangeSet`, `TableSchema` |
//! | `tablemirror-session` | `TransactionCoordinator` |
//!
//! # Example
//!
//! ```ignore
//! use tablemirror::prelude::*;
//!
//! struct Heroes;
//!
//! impl TableSchema for Heroes {
//!     fn table_name(&self) -> &str { "heroes" }
//!     fn ddl(&self) -> String {
//!         render_create_table(&[
//!             ColumnDefinition::new("id", ColumnType::Integer).primary_key(),
//!             ColumnDefinition::new("name", ColumnType::Text).not_null(),
//!         ])
//!     }
//!     fn set_column_properties(&self, columns: &mut ColumnFlagsEditor<'_>) -> Result<()> {
//!         columns.generated_key("id");
//!         Ok(())
//!     }
//!     fn schema_version(&self) -> u32 { 1 }
//! }
//!
//! let store = Store::open(StoreConfig::file("app.db"))?;
//! let mut heroes = Table::new(&store, Heroes);
//! heroes.ensure_created()?;
//! heroes.load(&LoadOptions::new())?;
//! let row = heroes.add_row(&[("name", Value::from("Deadpond"))])?;
//! heroes.save()?;
//! assert_eq!(heroes.row_state(row)?, RowState::Unchanged);
//! ```

pub use tablemirror_core as core;
pub use tablemirror_session as session;
pub use tablemirror_sqlite as sqlite;
pub use tablemirror_table as table;

pub use tablemirror_core::{
    AcceptRejectRule, ColumnDefinition, ColumnFlags, ColumnType, DeleteRule, Error,
    IndexDescriptor, OperationErrorKind, QueryErrorKind, ROW_ID_ALIAS, Relation, Result, Value,
    render_create_table,
};
pub use tablemirror_session::{CoordinatorConfig, CoordinatorDebugInfo, TransactionCoordinator};
pub use tablemirror_sqlite::{Executor, Store, StoreConfig, Transaction, catalog};
pub use tablemirror_table::{
    ChangeSet, Column, ColumnFlagsEditor, LoadOptions, NewRow, RowAccessor, RowHandle, RowState,
    RowValues, SaveSummary, Table, TableDebugInfo, TableOptions, TableSchema,
};

/// Everything an application needs to define schemas and save tables.
pub mod prelude {
    pub use chrono::NaiveDateTime;
    pub use rust_decimal::Decimal;

    pub use crate::{
        ColumnDefinition, ColumnFlagsEditor, ColumnType, DeleteRule, Error, Executor,
        LoadOptions, NewRow, Result, RowAccessor, RowHandle, RowState, RowValues, SaveSummary,
        Store, StoreConfig, Table, TableOptions, TableSchema, Transaction, TransactionCoordinator,
        Value, render_create_table,
    };
}
