//! SQLite store for tablemirror.
//!
//! This crate owns everything that touches the engine:
//!
//! - [`Store`]: a cloneable handle to one connection plus the lock that makes
//!   begin → commit/rollback atomic across threads.
//! - [`Transaction`]: an open transaction holding that lock; rolls back on drop.
//! - [`Executor`]: the statement interface shared by both, so table code can run
//!   inside or outside a caller-supplied transaction.
//! - [`catalog`]: existence checks, row counts and column introspection.
//!
//! Values cross the boundary through [`convert`]; engine failures are mapped onto
//! `tablemirror_core::Error` by [`map_sqlite_error`].

pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod store;

pub use config::{MAIN_NAMESPACE, StoreConfig};
pub use error::map_sqlite_error;
pub use store::{Executor, QueryResult, Store, Transaction};
