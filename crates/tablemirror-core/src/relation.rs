//! Parent/child relation metadata.
//!
//! A relation links a parent column to a child column. Tables use it to
//! propagate deletes to child rows and to resolve derived columns that pull a
//! value from the related parent row. A relation whose parent and child are the
//! same table is self-referential; those are the only relations a table can
//! enforce on its own.

use crate::value::Value;

/// What happens to child rows when their parent row is deleted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DeleteRule {
    /// Child rows are left alone.
    None,
    /// Child rows are deleted too.
    #[default]
    Cascade,
    /// The child column is set to NULL.
    SetNull,
    /// The child column is set to the given default value.
    SetDefault(Value),
}

impl DeleteRule {
    /// Short name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteRule::None => "NONE",
            DeleteRule::Cascade => "CASCADE",
            DeleteRule::SetNull => "SET NULL",
            DeleteRule::SetDefault(_) => "SET DEFAULT",
        }
    }
}

/// Whether accepting or rejecting a parent row also accepts or rejects children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptRejectRule {
    /// Children are accepted/rejected independently.
    #[default]
    None,
    /// Children follow their parent.
    Cascade,
}

/// A named parent-column to child-column link.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Relation name, unique within the parent table.
    pub name: String,
    /// Parent table name.
    pub parent_table: String,
    /// Key column on the parent table.
    pub parent_column: String,
    /// Child table name.
    pub child_table: String,
    /// Referencing column on the child table.
    pub child_column: String,
    /// Delete propagation.
    pub delete_rule: DeleteRule,
    /// Accept/reject propagation.
    pub accept_reject_rule: AcceptRejectRule,
}

impl Relation {
    /// Create a relation with the default rules (cascade delete, independent accept).
    pub fn new(
        name: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
        child_table: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parent_table: parent_table.into(),
            parent_column: parent_column.into(),
            child_table: child_table.into(),
            child_column: child_column.into(),
            delete_rule: DeleteRule::default(),
            accept_reject_rule: AcceptRejectRule::default(),
        }
    }

    /// Set the delete rule.
    #[must_use]
    pub fn delete_rule(mut self, rule: DeleteRule) -> Self {
        self.delete_rule = rule;
        self
    }

    /// Set the accept/reject rule.
    #[must_use]
    pub fn accept_reject_rule(mut self, rule: AcceptRejectRule) -> Self {
        self.accept_reject_rule = rule;
        self
    }

    /// True if parent and child are the same table.
    pub fn is_self_referential(&self) -> bool {
        self.parent_table == self.child_table
    }
}
