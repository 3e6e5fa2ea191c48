//! Core types for tablemirror.
//!
//! `tablemirror-core` is the **foundation layer** of the workspace. It defines the
//! data types every other crate builds on and has no knowledge of the storage
//! engine.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `Value` and `ColumnType` describe cell contents and the logical
//!   type of a column.
//! - **Schema metadata**: `ColumnDefinition` renders DDL, `ColumnFlags` carries the
//!   per-column write-eligibility markers, `Relation` links parent and child columns.
//! - **Errors**: a single `Error` enum shared by the store, table and session layers.
//!
//! # Who Uses This Crate
//!
//! - `tablemirror-sqlite` maps `Value` to and from SQLite storage classes and maps
//!   engine failures onto `Error`.
//! - `tablemirror-table` builds the in-memory mirror on top of `ColumnDefinition`,
//!   `ColumnFlags`, `ColumnSet` and `Relation`.
//! - `tablemirror-session` only needs `Error` and `Result`.
//!
//! Most applications should use the `tablemirror` facade.

pub mod column;
pub mod column_set;
pub mod error;
pub mod identifiers;
pub mod relation;
pub mod types;
pub mod value;

pub use column::{
    ColumnDefinition, ColumnFlags, IndexDescriptor, ROW_ID_ALIAS, render_create_table,
};
pub use column_set::ColumnSet;
pub use error::{
    ConnectionError, Error, OperationError, OperationErrorKind, QueryError, QueryErrorKind,
    Result, SchemaError,
};
pub use identifiers::{
    NAME_PLACEHOLDER, NS_PLACEHOLDER, is_valid_identifier, quote_ident, quote_literal,
    substitute_placeholders,
};
pub use relation::{AcceptRejectRule, DeleteRule, Relation};
pub use types::ColumnType;
pub use value::{TIMESTAMP_FORMAT, Value, parse_timestamp};
