//! Logical column types.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::value::{Value, parse_timestamp};

/// Logical type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnType {
    /// 64-bit integer.
    Integer,
    /// UTF-8 text.
    #[default]
    Text,
    /// Boolean, stored as 0/1.
    Boolean,
    /// Timestamp, stored as ISO-8601 text.
    Timestamp,
    /// Exact decimal.
    Numeric,
    /// Raw bytes.
    Blob,
    /// A declared type this crate does not recognize. Rendered as TEXT.
    Other(String),
}

impl ColumnType {
    /// SQL type name used in DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text | ColumnType::Other(_) => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Blob => "BLOB",
        }
    }

    /// Map a declared SQLite column type onto a logical type.
    ///
    /// Follows SQLite's affinity rules, with BOOL and DATE/TIME recognized before
    /// the generic numeric fallback.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return ColumnType::Blob;
        }
        if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("BLOB") {
            ColumnType::Blob
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnType::Timestamp
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUM")
            || upper.contains("DEC")
        {
            ColumnType::Numeric
        } else {
            ColumnType::Other(declared.trim().to_string())
        }
    }

    /// Coerce a raw store value into this logical type.
    ///
    /// Values that cannot be represented in the target type are passed through
    /// unchanged rather than dropped.
    pub fn coerce(&self, value: Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            ColumnType::Boolean => value.as_bool().map_or(value, Value::Boolean),
            ColumnType::Timestamp => match &value {
                Value::Text(s) => parse_timestamp(s).map_or(value, Value::Timestamp),
                Value::Integer(secs) => chrono::DateTime::from_timestamp(*secs, 0)
                    .map(|dt| Value::Timestamp(dt.naive_utc()))
                    .unwrap_or(value),
                _ => value,
            },
            ColumnType::Numeric => match &value {
                Value::Integer(_) | Value::Real(_) | Value::Text(_) => {
                    value.as_decimal().map_or(value, Value::Numeric)
                }
                _ => value,
            },
            ColumnType::Integer => match &value {
                Value::Boolean(b) => Value::Integer(i64::from(*b)),
                _ => value,
            },
            ColumnType::Text | ColumnType::Blob | ColumnType::Other(_) => value,
        }
    }

    /// Deterministic zero value used by typed getters when a cell is NULL.
    pub fn zero_value(&self) -> Value {
        match self {
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Text | ColumnType::Other(_) => Value::Text(String::new()),
            ColumnType::Boolean => Value::Boolean(false),
            ColumnType::Timestamp => Value::Timestamp(NaiveDateTime::default()),
            ColumnType::Numeric => Value::Numeric(Decimal::ZERO),
            ColumnType::Blob => Value::Blob(Vec::new()),
        }
    }
}
