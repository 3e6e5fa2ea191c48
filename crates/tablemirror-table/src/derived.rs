//! Derived columns: same-row expressions, parent lookups and action columns.
//!
//! Derived columns are read-only and never eligible for INSERT or UPDATE, so
//! recomputing them can never make a row dirty.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use tablemirror_core::Value;

use crate::column::Column;
use crate::row::{Row, RowValues};

/// Callback computing a derived value from the other values of its row.
pub(crate) type ExpressionFn = Arc<dyn Fn(&RowValues<'_>) -> Value + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Derivation {
    Expression(ExpressionFn),
    ParentLookup(ParentLookup),
    Action(ActionExpression),
}

impl Derivation {
    /// Whether an edit of `column` in table `table` invalidates this value.
    pub(crate) fn triggered_by(&self, table: &str, own_table: &str, column: &str) -> bool {
        match self {
            Derivation::Expression(_) => table == own_table,
            Derivation::ParentLookup(lookup) => table == own_table && lookup.child_column == column,
            Derivation::Action(action) => action.depends_on(table, column),
        }
    }

    pub(crate) fn evaluate(&self, row: &RowValues<'_>) -> Value {
        match self {
            Derivation::Expression(f) => f(row),
            Derivation::ParentLookup(lookup) => lookup.resolve(row),
            Derivation::Action(action) => (action.callback)(row),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Derivation::Expression(_) => "expression",
            Derivation::ParentLookup(_) => "parent lookup",
            Derivation::Action(_) => "action",
        }
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivation::Expression(_) => f.write_str("Expression(..)"),
            Derivation::ParentLookup(lookup) => lookup.fmt(f),
            Derivation::Action(action) => action.fmt(f),
        }
    }
}

/// Pulls a value from the parent row a child row references.
#[derive(Debug, Clone)]
pub(crate) struct ParentLookup {
    pub(crate) relation: String,
    pub(crate) parent_table: String,
    pub(crate) parent_key: String,
    pub(crate) parent_value: String,
    pub(crate) child_column: String,
    /// Snapshot of parent key to value, refreshed from the parent table.
    pub(crate) values: HashMap<LookupKey, Value>,
}

impl ParentLookup {
    /// Rebuild the snapshot from the parent's live rows.
    pub(crate) fn rebuild(&mut self, columns: &[Column], rows: &[Row]) {
        let position = |name: &str| columns.iter().position(|c| c.name() == name);
        let (Some(key_idx), Some(value_idx)) =
            (position(&self.parent_key), position(&self.parent_value))
        else {
            self.values.clear();
            return;
        };
        self.values = rows
            .iter()
            .filter(|row| !row.pending_delete)
            .filter_map(|row| {
                let key = row.current.get(key_idx).and_then(LookupKey::from_value)?;
                let value = row.current.get(value_idx).cloned().unwrap_or_default();
                Some((key, value))
            })
            .collect();
    }

    fn resolve(&self, row: &RowValues<'_>) -> Value {
        row.get(&self.child_column)
            .and_then(LookupKey::from_value)
            .and_then(|k| self.values.get(&k))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// A computed column that depends on named columns of some table, possibly
/// another one.
#[derive(Clone)]
pub(crate) struct ActionExpression {
    pub(crate) callback: ExpressionFn,
    pub(crate) dependent_table: String,
    pub(crate) dependent_columns: Vec<String>,
}

impl ActionExpression {
    fn depends_on(&self, table: &str, column: &str) -> bool {
        self.dependent_table == table && self.dependent_columns.iter().any(|c| c == column)
    }
}

impl fmt::Debug for ActionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExpression")
            .field("dependent_table", &self.dependent_table)
            .field("dependent_columns", &self.dependent_columns)
            .finish_non_exhaustive()
    }
}

/// A non-null key value in comparable form. Integer-valued keys compare
/// alike whatever their storage class, so a TEXT child column can still find
/// an INTEGER parent key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LookupKey {
    Integer(i64),
    Real(u64),
    Text(String),
    Timestamp(NaiveDateTime),
    Numeric(String),
    Blob(Vec<u8>),
}

impl LookupKey {
    pub(crate) fn from_value(v: &Value) -> Option<Self> {
        Some(match v {
            Value::Null => return None,
            Value::Integer(i) => LookupKey::Integer(*i),
            Value::Boolean(b) => LookupKey::Integer(i64::from(*b)),
            Value::Real(f) => LookupKey::Real(f.to_bits()),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_or_else(|_| LookupKey::Text(s.clone()), LookupKey::Integer),
            Value::Timestamp(ts) => LookupKey::Timestamp(*ts),
            Value::Numeric(d) => LookupKey::Numeric(d.normalize().to_string()),
            Value::Blob(b) => LookupKey::Blob(b.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowKey;
    use tablemirror_core::{ColumnDefinition, ColumnType};

    fn columns(names: &[&str]) -> Vec<Column> {
        names
            .iter()
            .map(|n| Column::stored(ColumnDefinition::new(*n, ColumnType::Text)))
            .collect()
    }

    fn key(v: impl Into<Value>) -> Option<LookupKey> {
        LookupKey::from_value(&v.into())
    }

    #[test]
    fn test_lookup_key_normalization() {
        assert_eq!(key(42_i64), key(42_i64));
        assert_ne!(key(42_i64), key(43_i64));
        assert_eq!(key(42_i64), key("42"));
        assert_eq!(key(1_i64), key(true));
        assert_ne!(key("a"), key("b"));
        assert_ne!(key("a"), key(vec![b'a']));
        assert_eq!(key(Value::Null), None);
    }

    #[test]
    fn test_distinct_keys_never_share_a_parent_value() {
        let parent_cols = columns(&["code", "name"]);
        let parent_rows = vec![
            Row::loaded(RowKey::new(1), vec![Value::from("x1"), Value::from("One")]),
            Row::loaded(RowKey::new(2), vec![Value::Blob(b"x1".to_vec()), Value::from("Two")]),
        ];
        let mut lookup = ParentLookup {
            relation: "codes".into(),
            parent_table: "codes".into(),
            parent_key: "code".into(),
            parent_value: "name".into(),
            child_column: "code_ref".into(),
            values: HashMap::new(),
        };
        lookup.rebuild(&parent_cols, &parent_rows);
        assert_eq!(lookup.values.len(), 2);

        let child_cols = columns(&["code_ref"]);
        let derivation = Derivation::ParentLookup(lookup);
        let text = [Value::from("x1")];
        let blob = [Value::Blob(b"x1".to_vec())];
        assert_eq!(derivation.evaluate(&RowValues::new(&child_cols, &text)), Value::from("One"));
        assert_eq!(derivation.evaluate(&RowValues::new(&child_cols, &blob)), Value::from("Two"));
    }

    #[test]
    fn test_parent_lookup_resolves_through_snapshot() {
        let parent_cols = columns(&["id", "name"]);
        let parent_rows = vec![
            Row::loaded(RowKey::new(1), vec![Value::Integer(1), Value::from("Preventers")]),
            Row::loaded(RowKey::new(2), vec![Value::Integer(2), Value::from("Z-Force")]),
        ];
        let mut lookup = ParentLookup {
            relation: "team_heroes".into(),
            parent_table: "teams".into(),
            parent_key: "id".into(),
            parent_value: "name".into(),
            child_column: "team_id".into(),
            values: HashMap::new(),
        };
        lookup.rebuild(&parent_cols, &parent_rows);

        let child_cols = columns(&["team_id"]);
        let child = [Value::Integer(2)];
        let derivation = Derivation::ParentLookup(lookup);
        assert_eq!(
            derivation.evaluate(&RowValues::new(&child_cols, &child)),
            Value::from("Z-Force")
        );

        let orphan = [Value::Integer(9)];
        assert_eq!(
            derivation.evaluate(&RowValues::new(&child_cols, &orphan)),
            Value::Null
        );
    }

    #[test]
    fn test_triggers() {
        let action = Derivation::Action(ActionExpression {
            callback: Arc::new(|_| Value::Null),
            dependent_table: "orders".into(),
            dependent_columns: vec!["total".into()],
        });
        assert!(action.triggered_by("orders", "customers", "total"));
        assert!(!action.triggered_by("orders", "customers", "status"));
        assert!(!action.triggered_by("customers", "customers", "total"));

        let expr = Derivation::Expression(Arc::new(|_| Value::Null));
        assert!(expr.triggered_by("people", "people", "anything"));
        assert!(!expr.triggered_by("orders", "people", "anything"));
    }
}
