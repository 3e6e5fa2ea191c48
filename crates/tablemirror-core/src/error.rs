//! Error types shared by every tablemirror crate.
//!
//! The taxonomy mirrors how failures are handled:
//!
//! - [`Error::Schema`] and [`Error::Argument`] are caller mistakes and are raised
//!   immediately.
//! - [`Error::Operation`] rejects a request the table is not configured to serve
//!   (writing to a read-only table, creating a default row on a table that does
//!   not support it).
//! - [`Error::Query`] and [`Error::Connection`] come from the storage engine. During
//!   a save they trigger rollback of the transaction and of the in-memory rows
//!   before being returned unchanged.

use std::fmt;

/// Boxed source error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias used throughout tablemirror.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for all tablemirror operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid or missing schema input (empty DDL, blank relation names, unknown columns).
    Schema(SchemaError),
    /// The table refused the operation.
    Operation(OperationError),
    /// The storage engine rejected a statement.
    Query(QueryError),
    /// The storage engine could not be opened or configured.
    Connection(ConnectionError),
    /// A collaborator argument was empty or inconsistent.
    Argument(String),
    /// A row accessor was bound to a table of the wrong schema type.
    TypeMismatch {
        /// The schema type the accessor expected.
        expected: &'static str,
        /// The schema type of the table the row belongs to.
        actual: &'static str,
    },
    /// Anything else.
    Custom(String),
}

impl Error {
    /// Shorthand for a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(SchemaError {
            message: message.into(),
        })
    }

    /// Shorthand for an operation error.
    pub fn operation(kind: OperationErrorKind, message: impl Into<String>) -> Self {
        Error::Operation(OperationError {
            kind,
            message: message.into(),
        })
    }

    /// Shorthand for an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument(message.into())
    }

    /// Shorthand for an in-memory constraint violation.
    pub fn constraint(message: impl Into<String>) -> Self {
        Error::Query(QueryError::new(QueryErrorKind::Constraint, message))
    }

    /// True if this error originated in the storage engine.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Query(_) | Error::Connection(_))
    }

    /// The query error kind, if this is a query error.
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            Error::Query(q) => Some(q.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => write!(f, "schema error: {}", e.message),
            Error::Operation(e) => write!(f, "operation error ({}): {}", e.kind, e.message),
            Error::Query(e) => {
                write!(f, "query error ({}): {}", e.kind, e.message)?;
                if let Some(sql) = &e.sql {
                    write!(f, " [sql: {}]", sql)?;
                }
                Ok(())
            }
            Error::Connection(e) => write!(f, "connection error: {}", e.message),
            Error::Argument(msg) => write!(f, "argument error: {}", msg),
            Error::TypeMismatch { expected, actual } => write!(
                f,
                "type mismatch: row belongs to a `{}` table, expected `{}`",
                actual, expected
            ),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|s| s as &(dyn std::error::Error + 'static)),
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|s| s as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

/// Invalid schema input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Human readable description.
    pub message: String,
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationErrorKind {
    /// Write attempted on a read-only table.
    ReadOnlyTable,
    /// Write attempted on a read-only or derived column.
    ReadOnlyColumn,
    /// The schema does not implement the requested capability.
    NotImplemented,
    /// The store lock is already held by this thread's open transaction.
    LockReentry,
    /// Edit attempted on a row marked for deletion.
    DeletedRow,
}

impl fmt::Display for OperationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationErrorKind::ReadOnlyTable => "read-only table",
            OperationErrorKind::ReadOnlyColumn => "read-only column",
            OperationErrorKind::NotImplemented => "not implemented",
            OperationErrorKind::LockReentry => "lock re-entry",
            OperationErrorKind::DeletedRow => "deleted row",
        };
        f.write_str(s)
    }
}

/// A refused operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    /// Category.
    pub kind: OperationErrorKind,
    /// Human readable description.
    pub message: String,
}

/// Category of a storage-engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Constraint violation (NOT NULL, UNIQUE, FOREIGN KEY, CHECK, in-memory relation).
    Constraint,
    /// Malformed SQL or unknown object.
    Syntax,
    /// Database busy or locked.
    Busy,
    /// A statement expected to return a row returned none.
    NotFound,
    /// Any other engine failure, including "no transaction is active".
    Database,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryErrorKind::Constraint => "constraint",
            QueryErrorKind::Syntax => "syntax",
            QueryErrorKind::Busy => "busy",
            QueryErrorKind::NotFound => "not found",
            QueryErrorKind::Database => "database",
        };
        f.write_str(s)
    }
}

/// A storage-engine failure.
#[derive(Debug)]
pub struct QueryError {
    /// Category.
    pub kind: QueryErrorKind,
    /// Engine message.
    pub message: String,
    /// The statement that failed, when known.
    pub sql: Option<String>,
    /// Underlying error.
    pub source: Option<BoxError>,
}

impl QueryError {
    /// Create a query error without SQL or source.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Attach the failing statement.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

/// The store could not be opened or configured.
#[derive(Debug)]
pub struct ConnectionError {
    /// Human readable description.
    pub message: String,
    /// Underlying error.
    pub source: Option<BoxError>,
}
