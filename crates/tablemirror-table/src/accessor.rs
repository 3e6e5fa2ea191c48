//! Typed access to one row.
//!
//! Getters never fail on NULL; they return the type's zero value, or `None`
//! from the `opt` variants. Setters compare against the current value, write
//! only on change and report whether they wrote.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tablemirror_core::{Error, Result, Value};

use crate::row::{RowHandle, RowState};
use crate::schema::TableSchema;
use crate::table::Table;

type ChangeHook<'t> = Box<dyn FnMut(&str, &Value) + 't>;

/// A row of a table whose schema is known to be `S`.
///
/// # Example
///
/// ```ignore
/// let mut person = RowAccessor::new::<People>(&mut people, handle)?;
/// person.set_string("name", "Ana")?;
/// assert_eq!(person.get_i64("age")?, 0);
/// ```
pub struct RowAccessor<'t> {
    table: &'t mut Table,
    handle: RowHandle,
    on_changed: Option<ChangeHook<'t>>,
}

impl<'t> RowAccessor<'t> {
    /// Bind to `handle` of `table`.
    ///
    /// Fails with [`Error::TypeMismatch`] if the table's schema is not `S`, and
    /// with an argument error if the handle was not issued by `table` or the
    /// row is gone.
    pub fn new<S: TableSchema>(table: &'t mut Table, handle: RowHandle) -> Result<Self> {
        if !table.is_schema::<S>() {
            return Err(Error::TypeMismatch {
                expected: std::any::type_name::<S>(),
                actual: table.schema_type_name(),
            });
        }
        table.position(handle)?;
        Ok(Self {
            table,
            handle,
            on_changed: None,
        })
    }

    /// Call `hook` with the column name and new value after every write.
    #[must_use]
    pub fn on_changed(mut self, hook: impl FnMut(&str, &Value) + 't) -> Self {
        self.on_changed = Some(Box::new(hook));
        self
    }

    /// The row handle.
    pub fn handle(&self) -> RowHandle {
        self.handle
    }

    /// The owning table.
    pub fn table(&self) -> &Table {
        self.table
    }

    /// Pending-change status.
    pub fn state(&self) -> Result<RowState> {
        self.table.row_state(self.handle)
    }

    /// Raw value.
    pub fn get(&self, column: &str) -> Result<&Value> {
        self.table.value(self.handle, column)
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Integer value; NULL reads as 0.
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        Ok(self.get_opt_i64(column)?.unwrap_or(0))
    }

    /// Integer value, or `None` for NULL.
    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>> {
        Ok(self.get(column)?.as_i64())
    }

    /// Decimal value; NULL reads as zero.
    pub fn get_decimal(&self, column: &str) -> Result<Decimal> {
        Ok(self.get_opt_decimal(column)?.unwrap_or(Decimal::ZERO))
    }

    /// Decimal value, or `None` for NULL.
    pub fn get_opt_decimal(&self, column: &str) -> Result<Option<Decimal>> {
        Ok(self.get(column)?.as_decimal())
    }

    /// Text form of the value; NULL reads as the empty string.
    pub fn get_string(&self, column: &str) -> Result<String> {
        Ok(self.get_opt_string(column)?.unwrap_or_default())
    }

    /// Text form of the value, or `None` for NULL.
    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>> {
        Ok(match self.get(column)? {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }

    /// Timestamp; NULL reads as the epoch.
    pub fn get_datetime(&self, column: &str) -> Result<NaiveDateTime> {
        Ok(self.get_opt_datetime(column)?.unwrap_or_default())
    }

    /// Timestamp, or `None` for NULL.
    pub fn get_opt_datetime(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        Ok(self.get(column)?.as_timestamp())
    }

    /// Boolean; NULL reads as false.
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        Ok(self.get(column)?.as_bool().unwrap_or(false))
    }

    /// Blob contents; NULL reads as empty.
    pub fn get_bytes(&self, column: &str) -> Result<Vec<u8>> {
        Ok(self
            .get(column)?
            .as_bytes()
            .map(<[u8]>::to_vec)
            .unwrap_or_default())
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Write an integer.
    pub fn set_i64(&mut self, column: &str, value: i64) -> Result<bool> {
        self.set(column, Value::Integer(value))
    }

    /// Write an integer, or NULL for `None`.
    pub fn set_opt_i64(&mut self, column: &str, value: Option<i64>) -> Result<bool> {
        self.set(column, value.into())
    }

    /// Write a decimal.
    pub fn set_decimal(&mut self, column: &str, value: Decimal) -> Result<bool> {
        self.set(column, Value::Numeric(value))
    }

    /// Write a decimal, or NULL for `None`.
    pub fn set_opt_decimal(&mut self, column: &str, value: Option<Decimal>) -> Result<bool> {
        self.set(column, value.into())
    }

    /// Blank or whitespace-only text is stored as NULL.
    pub fn set_string(&mut self, column: &str, value: &str) -> Result<bool> {
        self.set_opt_string(column, Some(value))
    }

    /// Write text, or NULL for `None` and blank input.
    pub fn set_opt_string(&mut self, column: &str, value: Option<&str>) -> Result<bool> {
        let value = match value {
            Some(s) if !s.trim().is_empty() => Value::Text(s.to_string()),
            _ => Value::Null,
        };
        self.set(column, value)
    }

    /// Write a timestamp.
    pub fn set_datetime(&mut self, column: &str, value: NaiveDateTime) -> Result<bool> {
        self.set(column, Value::Timestamp(value))
    }

    /// Write a timestamp, or NULL for `None`.
    pub fn set_opt_datetime(&mut self, column: &str, value: Option<NaiveDateTime>) -> Result<bool> {
        self.set(column, value.into())
    }

    /// Write a boolean.
    pub fn set_bool(&mut self, column: &str, value: bool) -> Result<bool> {
        self.set(column, Value::Boolean(value))
    }

    /// Write a blob.
    pub fn set_bytes(&mut self, column: &str, value: &[u8]) -> Result<bool> {
        self.set(column, Value::Blob(value.to_vec()))
    }

    /// Write a raw value.
    pub fn set(&mut self, column: &str, value: Value) -> Result<bool> {
        let written = self.table.set_value(self.handle, column, value)?;
        if written {
            if let Some(hook) = self.on_changed.as_mut() {
                let current = self.table.value(self.handle, column)?;
                hook(column, current);
            }
        }
        Ok(written)
    }
}
