//! Catalog lookups against `sqlite_master` and `PRAGMA table_info`.

use tablemirror_core::{ColumnDefinition, ColumnType, Result, Value, quote_ident};

use crate::store::Executor;

/// True if a table named `table` exists in `namespace`.
pub fn table_exists<E: Executor + ?Sized>(exec: &E, namespace: &str, table: &str) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
        quote_ident(namespace)
    );
    let count = exec.query_scalar(&sql, &[Value::from(table)])?;
    Ok(count.as_i64().unwrap_or(0) > 0)
}

/// Number of rows in `namespace.table`.
pub fn row_count<E: Executor + ?Sized>(exec: &E, namespace: &str, table: &str) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.{}",
        quote_ident(namespace),
        quote_ident(table)
    );
    Ok(exec.query_scalar(&sql, &[])?.as_i64().unwrap_or(0))
}

/// Column definitions of `namespace.table`, in declaration order.
pub fn table_columns<E: Executor + ?Sized>(
    exec: &E,
    namespace: &str,
    table: &str,
) -> Result<Vec<ColumnDefinition>> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_ident(namespace),
        quote_ident(table)
    );
    let result = exec.query(&sql, &[])?;
    let idx = |name: &str| result.column_index(name);
    let (Some(name_i), Some(type_i), Some(notnull_i), Some(default_i), Some(pk_i)) = (
        idx("name"),
        idx("type"),
        idx("notnull"),
        idx("dflt_value"),
        idx("pk"),
    ) else {
        return Ok(Vec::new());
    };

    let columns = result
        .rows
        .iter()
        .map(|row| {
            let name = row[name_i].as_str().unwrap_or_default().to_string();
            let column_type = ColumnType::from_declared(row[type_i].as_str().unwrap_or_default());
            let mut def = ColumnDefinition::new(name, column_type)
                .nullable(row[notnull_i].as_i64().unwrap_or(0) == 0);
            if row[pk_i].as_i64().unwrap_or(0) > 0 {
                def = def.primary_key();
            }
            if let Some(expr) = row[default_i].as_str() {
                def = def.with_default(parse_default(expr));
            }
            def
        })
        .collect();
    Ok(columns)
}

/// Interpret the default-expression text SQLite reports for a column.
fn parse_default(expr: &str) -> Value {
    let expr = expr.trim();
    if expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\'') {
        return Value::Text(expr[1..expr.len() - 1].replace("''", "'"));
    }
    if expr.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if let Ok(i) = expr.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = expr.parse::<f64>() {
        return Value::Real(f);
    }
    Value::Text(expr.to_string())
}
