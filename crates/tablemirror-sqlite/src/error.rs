//! Mapping of `rusqlite` failures onto tablemirror errors.

use rusqlite::ErrorCode;
use tablemirror_core::{ConnectionError, Error, QueryError, QueryErrorKind};

/// Convert an engine error raised while running `sql` into a tablemirror error.
pub fn map_sqlite_error(err: rusqlite::Error, sql: Option<&str>) -> Error {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(ffi, msg) => match ffi.code {
            ErrorCode::ConstraintViolation => QueryErrorKind::Constraint,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => QueryErrorKind::Busy,
            _ => {
                let text = msg.as_deref().unwrap_or_default();
                if text.contains("syntax error") || text.starts_with("no such") {
                    QueryErrorKind::Syntax
                } else {
                    QueryErrorKind::Database
                }
            }
        },
        rusqlite::Error::QueryReturnedNoRows => QueryErrorKind::NotFound,
        rusqlite::Error::InvalidColumnName(_) | rusqlite::Error::InvalidParameterName(_) => {
            QueryErrorKind::Syntax
        }
        _ => QueryErrorKind::Database,
    };

    Error::Query(QueryError {
        kind,
        message: err.to_string(),
        sql: sql.map(str::to_string),
        source: Some(Box::new(err)),
    })
}

/// Convert an error raised while opening or configuring the connection.
pub fn connection_error(message: impl Into<String>, err: rusqlite::Error) -> Error {
    Error::Connection(ConnectionError {
        message: format!("{}: {}", message.into(), err),
        source: Some(Box::new(err)),
    })
}
