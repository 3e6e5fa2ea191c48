//! SQL builders for the statements a table issues.
//!
//! Every builder renders `?N` placeholders and returns the SQL together with
//! the parameter values in placeholder order. Identifiers are always quoted.

use tablemirror_core::{ROW_ID_ALIAS, Value, quote_ident};

/// A namespace-qualified table reference.
#[derive(Debug, Clone, Copy)]
pub struct TableRef<'a> {
    namespace: &'a str,
    name: &'a str,
}

impl<'a> TableRef<'a> {
    /// Reference `namespace.name`.
    pub fn new(namespace: &'a str, name: &'a str) -> Self {
        Self { namespace, name }
    }

    /// `"namespace"."name"`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(self.namespace), quote_ident(self.name))
    }
}

/// SELECT used by loads: the surrogate row id first, then the requested fields.
#[derive(Debug, Clone)]
pub struct SelectStatement<'a> {
    table: TableRef<'a>,
    fields: Vec<String>,
    filter: Option<String>,
    order_by: Option<String>,
}

impl<'a> SelectStatement<'a> {
    /// Select every column.
    pub fn new(table: TableRef<'a>) -> Self {
        Self {
            table,
            fields: Vec::new(),
            filter: None,
            order_by: None,
        }
    }

    /// Restrict to the given fields. Empty means all columns.
    #[must_use]
    pub fn fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Raw WHERE clause text, without the keyword.
    #[must_use]
    pub fn filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.filter(|f| !f.trim().is_empty()).map(str::to_string);
        self
    }

    /// Raw ORDER BY clause text, without the keyword.
    #[must_use]
    pub fn order_by(mut self, order_by: Option<&str>) -> Self {
        self.order_by = order_by
            .filter(|o| !o.trim().is_empty())
            .map(str::to_string);
        self
    }

    /// Render the statement.
    pub fn build(&self) -> String {
        let projection = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields
                .iter()
                .map(|f| quote_ident(f))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!(
            "SELECT rowid AS {}, {} FROM {}",
            quote_ident(ROW_ID_ALIAS),
            projection,
            self.table.qualified()
        );
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        sql
    }
}

/// INSERT of one row.
#[derive(Debug, Clone)]
pub struct InsertStatement<'a> {
    table: TableRef<'a>,
    values: Vec<(&'a str, Value)>,
}

impl<'a> InsertStatement<'a> {
    /// Insert into `table`.
    pub fn new(table: TableRef<'a>) -> Self {
        Self {
            table,
            values: Vec::new(),
        }
    }

    /// Add a column value.
    #[must_use]
    pub fn value(mut self, column: &'a str, value: Value) -> Self {
        self.values.push((column, value));
        self
    }

    /// Render the statement. With no columns, renders `DEFAULT VALUES`.
    pub fn build(self) -> (String, Vec<Value>) {
        if self.values.is_empty() {
            return (
                format!("INSERT INTO {} DEFAULT VALUES", self.table.qualified()),
                Vec::new(),
            );
        }
        let columns: Vec<String> = self.values.iter().map(|(c, _)| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=self.values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table.qualified(),
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, self.values.into_iter().map(|(_, v)| v).collect())
    }
}

/// UPDATE of one row, targeted by row id.
#[derive(Debug, Clone)]
pub struct UpdateStatement<'a> {
    table: TableRef<'a>,
    sets: Vec<(&'a str, Value)>,
    row_id: Value,
}

impl<'a> UpdateStatement<'a> {
    /// Update the row with `row_id`.
    pub fn new(table: TableRef<'a>, row_id: Value) -> Self {
        Self {
            table,
            sets: Vec::new(),
            row_id,
        }
    }

    /// Add a SET clause.
    #[must_use]
    pub fn set(mut self, column: &'a str, value: Value) -> Self {
        self.sets.push((column, value));
        self
    }

    /// True if no column would be written.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Render the statement.
    pub fn build(self) -> (String, Vec<Value>) {
        let assignments: Vec<String> = self
            .sets
            .iter()
            .enumerate()
            .map(|(i, (col, _))| format!("{} = ?{}", quote_ident(col), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE rowid = ?{}",
            self.table.qualified(),
            assignments.join(", "),
            self.sets.len() + 1
        );
        let mut params: Vec<Value> = self.sets.into_iter().map(|(_, v)| v).collect();
        params.push(self.row_id);
        (sql, params)
    }
}

/// DELETE of one row, targeted by row id.
#[derive(Debug, Clone)]
pub struct DeleteStatement<'a> {
    table: TableRef<'a>,
    row_id: Value,
}

impl<'a> DeleteStatement<'a> {
    /// Delete the row with `row_id`.
    pub fn new(table: TableRef<'a>, row_id: Value) -> Self {
        Self { table, row_id }
    }

    /// Render the statement.
    pub fn build(self) -> (String, Vec<Value>) {
        (
            format!("DELETE FROM {} WHERE rowid = ?1", self.table.qualified()),
            vec![self.row_id],
        )
    }
}
