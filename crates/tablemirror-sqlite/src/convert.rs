//! Conversion between tablemirror values and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};
use tablemirror_core::{TIMESTAMP_FORMAT, Value};

/// Convert a value into the storage class SQLite receives.
///
/// Booleans become 0/1, timestamps and decimals become text so no precision
/// is lost on the way in.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Numeric(d) => SqlValue::Text(d.to_string()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Convert a borrowed SQLite cell into an owned value.
///
/// No logical-type coercion happens here; tables coerce per column.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_goes_in_as_integer() {
        assert_eq!(to_sql_value(&Value::Boolean(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&Value::Boolean(false)), SqlValue::Integer(0));
    }

    #[test]
    fn test_decimal_goes_in_as_text() {
        let d: rust_decimal::Decimal = "10.25".parse().unwrap();
        assert_eq!(
            to_sql_value(&Value::Numeric(d)),
            SqlValue::Text("10.25".to_string())
        );
    }

    #[test]
    fn test_from_value_ref_text() {
        assert_eq!(
            from_value_ref(ValueRef::Text(b"hello")),
            Value::Text("hello".to_string())
        );
        assert_eq!(from_value_ref(ValueRef::Null), Value::Null);
    }
}
