//! In-memory table mirrors for tablemirror.
//!
//! A [`Table`] loads rows from one store table, lets the application edit them
//! through [`RowAccessor`] or [`Table::set_value`], and writes back exactly what
//! changed:
//!
//! - row status (added, modified, deleted) is derived from the accepted
//!   baseline, never stored;
//! - per-row dirty tracking records which write-eligible columns were edited,
//!   so UPDATE statements list only those columns;
//! - [`Table::save`] runs INSERTs, UPDATEs and DELETEs in one transaction and
//!   reverts every row if any statement fails;
//! - [`Table::save_in`] emits into a transaction owned by the caller, which is
//!   how several tables commit together.
//!
//! Concrete tables implement [`TableSchema`] to supply DDL, seed data and
//! column write-eligibility.

pub mod accessor;
pub mod change_set;
pub mod column;
mod derived;
pub mod row;
pub mod save;
pub mod schema;
pub mod statement;
pub mod table;

pub use accessor::RowAccessor;
pub use change_set::ChangeSet;
pub use column::{Column, ColumnFlagsEditor};
pub use row::{NewRow, RowHandle, RowKey, RowState, RowValues, TableId};
pub use save::SaveSummary;
pub use schema::{TableOptions, TableSchema};
pub use table::{LoadOptions, Table, TableDebugInfo};
