//! The in-memory table mirror: columns, rows, relations and derived values.
//!
//! The save pipeline lives in `save.rs`; this module covers schema creation,
//! loading, editing and the relation bookkeeping edits depend on.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tablemirror_core::{
    ColumnDefinition, ColumnSet, ColumnType, DeleteRule, Error, OperationErrorKind, ROW_ID_ALIAS,
    Relation, Result, Value, substitute_placeholders,
};
use tablemirror_sqlite::{Executor, Store, catalog};

use crate::column::{Column, ColumnFlagsEditor};
use crate::derived::{ActionExpression, Derivation, ParentLookup};
use crate::row::{NewRow, Row, RowHandle, RowKey, RowState, RowValues, TableId};
use crate::schema::{TableOptions, TableSchema};
use crate::statement::{SelectStatement, TableRef};

/// Filter, ordering and projection of a [`Table::load`].
///
/// `filter` and `order_by` are raw SQL fragments without their keywords;
/// `params` bind `?N` placeholders used inside `filter`.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// WHERE clause text.
    pub filter: Option<String>,
    /// ORDER BY clause text.
    pub order_by: Option<String>,
    /// Columns to load; empty loads all.
    pub fields: Vec<String>,
    /// Parameters for `filter`.
    pub params: Vec<Value>,
}

impl LoadOptions {
    /// Load every row and column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the WHERE clause.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the ORDER BY clause.
    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Restrict the loaded columns.
    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Bind the next filter parameter.
    #[must_use]
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// An in-memory mirror of one store table.
///
/// A table exclusively owns its rows. Rows are addressed through
/// [`RowHandle`]s minted by the table; handles from another table instance are
/// rejected.
pub struct Table {
    pub(crate) id: TableId,
    pub(crate) name: String,
    pub(crate) schema: Box<dyn TableSchema>,
    schema_type: TypeId,
    schema_type_name: &'static str,
    pub(crate) store: Store,
    pub(crate) options: TableOptions,
    pub(crate) enforce_constraints: bool,
    pub(crate) columns: Vec<Column>,
    pub(crate) rows: Vec<Row>,
    /// Update-eligible columns edited since the last accept, per row.
    pub(crate) changed: HashMap<RowKey, ColumnSet>,
    pub(crate) relations: Vec<Relation>,
    next_key: u64,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("schema", &self.schema_type_name)
            .field("columns", &self.columns.len())
            .field("rows", &self.rows.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Create an empty, unloaded table bound to `store`.
    pub fn new<S: TableSchema>(store: &Store, schema: S) -> Self {
        Self::with_options(store, schema, TableOptions::default())
    }

    /// Create an empty, unloaded table with explicit options.
    pub fn with_options<S: TableSchema>(store: &Store, schema: S, options: TableOptions) -> Self {
        let name = schema.table_name().to_string();
        Self {
            id: TableId::next(),
            name,
            schema: Box::new(schema),
            schema_type: TypeId::of::<S>(),
            schema_type_name: type_name::<S>(),
            store: store.clone(),
            options,
            enforce_constraints: !options.relaxed_constraints,
            columns: Vec::new(),
            rows: Vec::new(),
            changed: HashMap::new(),
            relations: Vec::new(),
            next_key: 0,
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Identity of this instance.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store namespace the table lives in.
    pub fn namespace(&self) -> &str {
        self.store.namespace()
    }

    /// The store this table reads from and writes to.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The schema capabilities.
    pub fn schema(&self) -> &dyn TableSchema {
        self.schema.as_ref()
    }

    /// Type name of the schema, for diagnostics.
    pub fn schema_type_name(&self) -> &'static str {
        self.schema_type_name
    }

    pub(crate) fn is_schema<S: TableSchema>(&self) -> bool {
        self.schema_type == TypeId::of::<S>()
    }

    /// Options this table was created with.
    pub fn options(&self) -> TableOptions {
        self.options
    }

    /// Whether saves are no-ops.
    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    /// Whether deletes are withheld from the store.
    pub fn is_delete_restricted(&self) -> bool {
        self.options.delete_restricted
    }

    /// Whether self-referential relations are enforced in memory.
    pub fn enforce_constraints(&self) -> bool {
        self.enforce_constraints
    }

    /// Turn in-memory relation enforcement on or off. Returns the previous setting.
    pub fn set_enforce_constraints(&mut self, enforce: bool) -> bool {
        std::mem::replace(&mut self.enforce_constraints, enforce)
    }

    /// Materialized columns: stored columns in select order, then derived ones.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Ordinal of a column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| Error::schema(format!("table '{}' has no column '{}'", self.name, name)))
    }

    /// Relations this table takes part in, as parent or child.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// True if some relation links this table to itself.
    pub fn has_self_relation(&self) -> bool {
        self.relations.iter().any(Relation::is_self_referential)
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// True if the table exists in the store namespace.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn exists(&self) -> Result<bool> {
        catalog::table_exists(&self.store, self.namespace(), &self.name)
    }

    /// True if the stored table has at least one row.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn has_rows(&self) -> Result<bool> {
        Ok(catalog::row_count(&self.store, self.namespace(), &self.name)? > 0)
    }

    /// Run the schema's DDL with placeholders substituted.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn create_from_ddl(&self) -> Result<()> {
        let ddl = self.schema.ddl();
        if ddl.trim().is_empty() {
            return Err(Error::schema(format!(
                "table '{}' supplied no DDL",
                self.name
            )));
        }
        let sql = substitute_placeholders(&ddl, self.namespace(), &self.name);
        self.store.execute_batch(&sql)?;
        tracing::info!(table = %self.name, "Created table");
        Ok(())
    }

    /// Run the schema's seed statements, if any. Returns whether any ran.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn populate(&self) -> Result<bool> {
        let Some(seed) = self.schema.seed_sql().filter(|s| !s.trim().is_empty()) else {
            return Ok(false);
        };
        let sql = substitute_placeholders(&seed, self.namespace(), &self.name);
        self.store.execute_batch(&sql)?;
        tracing::info!(table = %self.name, "Populated table");
        Ok(true)
    }

    /// Create the table if missing, seeding it when it starts out empty.
    /// Returns whether the table was created.
    pub fn ensure_created(&self) -> Result<bool> {
        if self.exists()? {
            return Ok(false);
        }
        self.create_from_ddl()?;
        if !self.has_rows()? {
            self.populate()?;
        }
        Ok(true)
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Replace rows and stored columns with a fresh read from the store.
    ///
    /// Derived columns survive and are recomputed. Pending edits are discarded.
    /// Returns the number of rows loaded.
    #[tracing::instrument(level = "debug", skip(self, options), fields(table = %self.name))]
    pub fn load(&mut self, options: &LoadOptions) -> Result<usize> {
        let namespace = self.namespace().to_string();
        let sql = SelectStatement::new(TableRef::new(&namespace, &self.name))
            .fields(&options.fields)
            .filter(options.filter.as_deref())
            .order_by(options.order_by.as_deref())
            .build();
        let result = self.store.query(&sql, &options.params)?;
        let declared = catalog::table_columns(&self.store, &namespace, &self.name)?;

        let derived: Vec<Column> = self
            .columns
            .drain(..)
            .filter(Column::is_derived)
            .collect();
        let mut columns: Vec<Column> = result
            .columns
            .iter()
            .map(|name| {
                if name == ROW_ID_ALIAS {
                    return Column::row_id();
                }
                let definition = declared
                    .iter()
                    .find(|d| d.name() == name)
                    .cloned()
                    .unwrap_or_else(|| ColumnDefinition::new(name.clone(), ColumnType::Text));
                Column::stored(definition)
            })
            .collect();
        let stored = columns.len();
        columns.extend(derived);
        self.columns = columns;

        self.rows.clear();
        self.changed.clear();
        let width = self.columns.len();
        for raw in result.rows {
            let mut values: Vec<Value> = raw
                .into_iter()
                .zip(&self.columns)
                .map(|(value, col)| col.definition().column_type().coerce(value))
                .collect();
            values.resize(width, Value::Null);
            let key = self.mint_key();
            self.rows.push(Row::loaded(key, values));
        }

        self.schema
            .set_column_properties(&mut ColumnFlagsEditor::new(&mut self.columns[..stored]))?;
        self.rebuild_self_lookups();
        self.recompute_all_derived();

        tracing::info!(
            table = %self.name,
            rows = self.rows.len(),
            columns = stored,
            "Loaded table"
        );
        Ok(self.rows.len())
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// Handles of every row, including rows marked deleted, in table order.
    pub fn rows(&self) -> impl Iterator<Item = RowHandle> + '_ {
        self.rows.iter().map(|r| RowHandle::new(self.id, r.key))
    }

    /// Handles of rows not marked deleted.
    pub fn live_rows(&self) -> impl Iterator<Item = RowHandle> + '_ {
        self.rows
            .iter()
            .filter(|r| !r.pending_delete)
            .map(|r| RowHandle::new(self.id, r.key))
    }

    /// Number of rows, including rows marked deleted.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First live row whose `column` equals `value`.
    pub fn find_row(&self, column: &str, value: &Value) -> Option<RowHandle> {
        let idx = self.column_index(column).ok()?;
        self.rows
            .iter()
            .find(|r| !r.pending_delete && r.current.get(idx) == Some(value))
            .map(|r| RowHandle::new(self.id, r.key))
    }

    /// Live row with the given surrogate row id.
    pub fn row_by_id(&self, row_id: i64) -> Option<RowHandle> {
        self.find_row(ROW_ID_ALIAS, &Value::Integer(row_id))
    }

    pub(crate) fn position(&self, handle: RowHandle) -> Result<usize> {
        if handle.table_id() != self.id {
            return Err(Error::argument(format!(
                "row {} was not issued by table '{}'",
                handle.key(),
                self.name
            )));
        }
        self.position_of_key(handle.key())
    }

    pub(crate) fn position_of_key(&self, key: RowKey) -> Result<usize> {
        self.rows.iter().position(|r| r.key == key).ok_or_else(|| {
            Error::argument(format!("row {} is no longer in table '{}'", key, self.name))
        })
    }

    /// Current value of a cell.
    pub fn value(&self, handle: RowHandle, column: &str) -> Result<&Value> {
        let pos = self.position(handle)?;
        let idx = self.column_index(column)?;
        Ok(&self.rows[pos].current[idx])
    }

    /// Accepted value of a cell; the current value for rows never saved.
    pub fn original_value(&self, handle: RowHandle, column: &str) -> Result<&Value> {
        let pos = self.position(handle)?;
        let idx = self.column_index(column)?;
        self.rows[pos]
            .original(idx)
            .ok_or_else(|| Error::schema(format!("column '{}' has no value", column)))
    }

    /// All current values of a row.
    pub fn row_values(&self, handle: RowHandle) -> Result<RowValues<'_>> {
        let pos = self.position(handle)?;
        Ok(RowValues::new(&self.columns, &self.rows[pos].current))
    }

    /// Pending-change status of a row.
    pub fn row_state(&self, handle: RowHandle) -> Result<RowState> {
        let pos = self.position(handle)?;
        Ok(self.state_at(pos))
    }

    pub(crate) fn state_at(&self, pos: usize) -> RowState {
        let columns = &self.columns;
        self.rows[pos].state(|idx| columns.get(idx).is_some_and(Column::eligible_for_update))
    }

    /// Set a cell, coercing to the column type. Returns whether the value changed.
    ///
    /// Fails for read-only and derived columns, for rows marked deleted and,
    /// while constraints are enforced, when a self-referential child key would
    /// point at no row.
    #[tracing::instrument(level = "trace", skip(self, value), fields(table = %self.name))]
    pub fn set_value(&mut self, handle: RowHandle, column: &str, value: Value) -> Result<bool> {
        let pos = self.position(handle)?;
        let idx = self.column_index(column)?;
        let col = &self.columns[idx];
        if !col.is_writable() {
            return Err(Error::operation(
                OperationErrorKind::ReadOnlyColumn,
                format!("column '{}.{}' is read-only", self.name, column),
            ));
        }
        if self.rows[pos].pending_delete {
            return Err(Error::operation(
                OperationErrorKind::DeletedRow,
                format!("row {} of '{}' is marked deleted", handle.key(), self.name),
            ));
        }
        let value = col.definition().column_type().coerce(value);
        if self.rows[pos].current[idx] == value {
            return Ok(false);
        }
        if self.enforce_constraints && self.has_self_relation() {
            let mut candidate = self.rows[pos].current.clone();
            candidate[idx] = value.clone();
            self.check_parent_exists(Some(pos), &candidate)?;
        }
        self.write_value(pos, idx, value);
        Ok(true)
    }

    /// Write without checks, record dirtiness and refresh dependent values.
    pub(crate) fn write_value(&mut self, pos: usize, idx: usize, value: Value) {
        self.rows[pos].current[idx] = value;
        if self.columns[idx].eligible_for_update() {
            let width = self.columns.len();
            self.changed
                .entry(self.rows[pos].key)
                .or_insert_with(|| ColumnSet::with_capacity(width))
                .insert(idx);
        }
        let name = self.columns[idx].name().to_string();
        if self.self_lookup_depends_on(&name) {
            self.rebuild_self_lookups();
            self.recompute_all_derived();
        } else {
            self.recompute_row(pos, Some(&name));
        }
    }

    /// Add a row built from column defaults plus `values`.
    #[tracing::instrument(level = "debug", skip(self, values), fields(table = %self.name))]
    pub fn add_row(&mut self, values: &[(&str, Value)]) -> Result<RowHandle> {
        let mut current = self.new_row_values()?;
        for (column, value) in values {
            let idx = self.column_index(column)?;
            let col = &self.columns[idx];
            if !col.is_writable() {
                return Err(Error::operation(
                    OperationErrorKind::ReadOnlyColumn,
                    format!("column '{}.{}' is read-only", self.name, column),
                ));
            }
            current[idx] = col.definition().column_type().coerce(value.clone());
        }
        self.insert_row(current)
    }

    /// Create a row through the schema's default-row hook and save it at once.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn add_default_row(&mut self) -> Result<RowHandle> {
        if self.options.read_only {
            return Err(Error::operation(
                OperationErrorKind::ReadOnlyTable,
                format!("table '{}' is read-only", self.name),
            ));
        }
        let mut values = self.new_row_values()?;
        self.schema
            .populate_default_row(&mut NewRow::new(&self.columns, &mut values))?;
        let handle = self.insert_row(values)?;
        self.save()?;
        Ok(handle)
    }

    fn new_row_values(&self) -> Result<Vec<Value>> {
        if self.columns.is_empty() {
            return Err(Error::schema(format!(
                "table '{}' has no columns; load it before adding rows",
                self.name
            )));
        }
        Ok(self
            .columns
            .iter()
            .map(|col| {
                if !col.is_writable() {
                    return Value::Null;
                }
                let column_type = col.definition().column_type();
                let value = col
                    .definition()
                    .default_value()
                    .cloned()
                    .map_or(Value::Null, |v| column_type.coerce(v));
                // Expression defaults such as CURRENT_TIMESTAMP are left to the engine.
                let textual = matches!(column_type, ColumnType::Text | ColumnType::Other(_));
                if matches!(value, Value::Text(_)) && !textual {
                    Value::Null
                } else {
                    value
                }
            })
            .collect())
    }

    fn insert_row(&mut self, values: Vec<Value>) -> Result<RowHandle> {
        if self.enforce_constraints {
            self.check_parent_exists(None, &values)?;
        }
        let key = self.mint_key();
        self.rows.push(Row::added(key, values));
        if self.has_self_lookups() {
            self.rebuild_self_lookups();
            self.recompute_all_derived();
        } else {
            let pos = self.rows.len() - 1;
            self.recompute_row(pos, None);
        }
        tracing::debug!(table = %self.name, row = %key, "Added row");
        Ok(RowHandle::new(self.id, key))
    }

    fn mint_key(&mut self) -> RowKey {
        self.next_key += 1;
        RowKey::new(self.next_key)
    }

    /// Mark a row deleted, applying self-referential delete rules.
    ///
    /// A row that never reached the store is removed outright.
    pub fn delete_row(&mut self, handle: RowHandle) -> Result<usize> {
        self.delete_with_children(handle, &mut [])
    }

    /// Mark a row deleted and apply the delete rule of every relation in which
    /// this table is the parent: self-referential ones always, others for the
    /// child tables supplied. Returns the number of rows deleted or updated.
    #[tracing::instrument(level = "debug", skip(self, children), fields(table = %self.name))]
    pub fn delete_with_children(
        &mut self,
        handle: RowHandle,
        children: &mut [&mut Table],
    ) -> Result<usize> {
        let pos = self.position(handle)?;
        if self.rows[pos].pending_delete {
            return Ok(0);
        }
        let parent_relations: Vec<Relation> = self
            .relations
            .iter()
            .filter(|r| r.parent_table == self.name)
            .cloned()
            .collect();

        let mut keys = Vec::with_capacity(parent_relations.len());
        for rel in &parent_relations {
            let key = self.rows[pos].current[self.column_index(&rel.parent_column)?].clone();
            if rel.is_self_referential()
                && self.enforce_constraints
                && rel.delete_rule == DeleteRule::None
                && !key.is_null()
                && !self.dependents(pos, rel, &key)?.is_empty()
            {
                return Err(Error::constraint(format!(
                    "relation '{}': row {} of '{}' is still referenced",
                    rel.name,
                    handle.key(),
                    self.name
                )));
            }
            keys.push(key);
        }

        // Mark first so cyclic cascades terminate.
        self.rows[pos].pending_delete = true;
        let mut affected = 1;
        for (rel, key) in parent_relations.iter().zip(&keys) {
            if key.is_null() {
                continue;
            }
            if rel.is_self_referential() {
                affected += self.apply_parent_delete(rel, key, children)?;
            } else if let Some(child) = children.iter_mut().find(|c| c.name == rel.child_table) {
                affected += child.apply_parent_delete(rel, key, &mut [])?;
            } else {
                tracing::debug!(relation = %rel.name, "Child table not supplied; delete rule skipped");
            }
        }

        let pos = self.position(handle)?;
        if self.rows[pos].baseline.is_none() {
            self.rows.remove(pos);
            self.changed.remove(&handle.key());
        }
        if self.has_self_lookups() {
            self.rebuild_self_lookups();
            self.recompute_all_derived();
        }
        tracing::debug!(table = %self.name, row = %handle.key(), affected, "Deleted row");
        Ok(affected)
    }

    /// Clear the deleted mark of a row. Returns whether it was marked.
    pub fn undelete_row(&mut self, handle: RowHandle) -> Result<bool> {
        let pos = self.position(handle)?;
        Ok(std::mem::replace(&mut self.rows[pos].pending_delete, false))
    }

    fn dependents(&self, parent_pos: usize, rel: &Relation, key: &Value) -> Result<Vec<RowHandle>> {
        let child_idx = self.column_index(&rel.child_column)?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, r)| {
                *i != parent_pos && !r.pending_delete && r.current.get(child_idx) == Some(key)
            })
            .map(|(_, r)| RowHandle::new(self.id, r.key))
            .collect())
    }

    fn apply_parent_delete(
        &mut self,
        rel: &Relation,
        key: &Value,
        children: &mut [&mut Table],
    ) -> Result<usize> {
        let child_idx = self.column_index(&rel.child_column)?;
        let dependents = self.dependents(usize::MAX, rel, key)?;
        let mut affected = 0;
        for handle in dependents {
            match &rel.delete_rule {
                DeleteRule::None => {}
                DeleteRule::Cascade => affected += self.delete_with_children(handle, children)?,
                DeleteRule::SetNull => {
                    let pos = self.position(handle)?;
                    self.write_value(pos, child_idx, Value::Null);
                    affected += 1;
                }
                DeleteRule::SetDefault(default) => {
                    let pos = self.position(handle)?;
                    let value = self.columns[child_idx]
                        .definition()
                        .column_type()
                        .coerce(default.clone());
                    self.write_value(pos, child_idx, value);
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Link `parent_column` of this table to `child_column` of `child`.
    ///
    /// The relation is registered on both tables. Registering a name that
    /// already exists on this table is a no-op.
    #[tracing::instrument(level = "debug", skip(self, child), fields(table = %self.name))]
    pub fn create_parent_child_relation(
        &mut self,
        name: &str,
        parent_column: &str,
        child: &mut Table,
        child_column: &str,
        delete_rule: DeleteRule,
    ) -> Result<()> {
        validate_relation_args(name, parent_column, child_column)?;
        if self.relations.iter().any(|r| r.name == name) {
            return Ok(());
        }
        self.column_index(parent_column)?;
        child.column_index(child_column)?;

        let relation = Relation::new(name, &self.name, parent_column, &child.name, child_column)
            .delete_rule(delete_rule);
        child.relations.push(relation.clone());
        self.relations.push(relation);
        tracing::info!(
            relation = %name,
            parent = %self.name,
            child = %child.name,
            "Created relation"
        );
        Ok(())
    }

    /// Link `parent_column` to `child_column` within this table.
    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.name))]
    pub fn create_self_relation(
        &mut self,
        name: &str,
        parent_column: &str,
        child_column: &str,
        delete_rule: DeleteRule,
    ) -> Result<()> {
        validate_relation_args(name, parent_column, child_column)?;
        if self.relations.iter().any(|r| r.name == name) {
            return Ok(());
        }
        self.column_index(parent_column)?;
        self.column_index(child_column)?;
        self.relations.push(
            Relation::new(name, &self.name, parent_column, &self.name, child_column)
                .delete_rule(delete_rule),
        );
        tracing::info!(relation = %name, table = %self.name, "Created self relation");
        Ok(())
    }

    // ========================================================================
    // Derived columns
    // ========================================================================

    /// Add a column computed from other values of the same row.
    /// Returns false if a column with that name already exists.
    pub fn create_expression_column<F>(
        &mut self,
        column: &str,
        column_type: ColumnType,
        expression: F,
    ) -> Result<bool>
    where
        F: Fn(&RowValues<'_>) -> Value + Send + Sync + 'static,
    {
        if !self.can_add_column(column)? {
            return Ok(false);
        }
        self.push_derived(
            ColumnDefinition::new(column, column_type),
            Derivation::Expression(Arc::new(expression)),
        );
        Ok(true)
    }

    /// Add a column pulling `parent_column` from the parent row that
    /// `relation` points at. `parent` is required unless the relation is
    /// self-referential. Returns false if the column already exists.
    pub fn create_child_to_parent_column(
        &mut self,
        column: &str,
        relation: &str,
        parent_column: &str,
        parent: Option<&Table>,
    ) -> Result<bool> {
        if !self.can_add_column(column)? {
            return Ok(false);
        }
        let rel = self
            .relations
            .iter()
            .find(|r| r.name == relation && r.child_table == self.name)
            .cloned()
            .ok_or_else(|| {
                Error::schema(format!(
                    "table '{}' is not the child of a relation named '{}'",
                    self.name, relation
                ))
            })?;

        let mut lookup = ParentLookup {
            relation: rel.name.clone(),
            parent_table: rel.parent_table.clone(),
            parent_key: rel.parent_column.clone(),
            parent_value: parent_column.to_string(),
            child_column: rel.child_column.clone(),
            values: HashMap::new(),
        };
        let column_type = if rel.is_self_referential() {
            let idx = self.column_index(parent_column)?;
            lookup.rebuild(&self.columns, &self.rows);
            self.columns[idx].definition().column_type().clone()
        } else {
            let parent = parent.filter(|p| p.name == rel.parent_table).ok_or_else(|| {
                Error::argument(format!(
                    "relation '{}' needs its parent table '{}'",
                    rel.name, rel.parent_table
                ))
            })?;
            let idx = parent.column_index(parent_column)?;
            lookup.rebuild(&parent.columns, &parent.rows);
            parent.columns[idx].definition().column_type().clone()
        };

        self.push_derived(
            ColumnDefinition::new(column, column_type),
            Derivation::ParentLookup(lookup),
        );
        Ok(true)
    }

    /// Add a computed column that is refreshed when any of
    /// `dependent_columns` of `dependent_table` changes.
    /// Returns false if the column already exists.
    pub fn create_action_expression_column<F>(
        &mut self,
        column: &str,
        column_type: ColumnType,
        dependent_table: &str,
        dependent_columns: &[&str],
        callback: F,
    ) -> Result<bool>
    where
        F: Fn(&RowValues<'_>) -> Value + Send + Sync + 'static,
    {
        if !self.can_add_column(column)? {
            return Ok(false);
        }
        if dependent_table.trim().is_empty() {
            return Err(Error::schema("dependent table name is required"));
        }
        self.push_derived(
            ColumnDefinition::new(column, column_type),
            Derivation::Action(ActionExpression {
                callback: Arc::new(callback),
                dependent_table: dependent_table.to_string(),
                dependent_columns: dependent_columns.iter().map(|c| (*c).to_string()).collect(),
            }),
        );
        Ok(true)
    }

    /// Re-snapshot parent values for every lookup column fed by `parent`.
    /// Returns the number of lookup columns refreshed.
    pub fn refresh_parent_lookups(&mut self, parent: &Table) -> usize {
        let mut refreshed = 0;
        for col in &mut self.columns {
            if let Some(Derivation::ParentLookup(lookup)) = col.derivation_mut() {
                if lookup.parent_table == parent.name {
                    lookup.rebuild(&parent.columns, &parent.rows);
                    tracing::trace!(relation = %lookup.relation, "Refreshed parent lookup");
                    refreshed += 1;
                }
            }
        }
        if refreshed > 0 {
            self.recompute_all_derived();
        }
        refreshed
    }

    /// Recompute action columns depending on `table.column`.
    /// Returns the number of columns recomputed.
    pub fn notify_dependency_changed(&mut self, table: &str, column: &str) -> usize {
        let targets: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| match c.derivation() {
                Some(d) => {
                    matches!(d, Derivation::Action(_)) && d.triggered_by(table, &self.name, column)
                }
                None => false,
            })
            .map(|(idx, _)| idx)
            .collect();
        for pos in 0..self.rows.len() {
            for &idx in &targets {
                self.evaluate_into(pos, idx);
            }
        }
        targets.len()
    }

    fn can_add_column(&self, column: &str) -> Result<bool> {
        if column.trim().is_empty() {
            return Err(Error::schema("column name is required"));
        }
        Ok(self.column(column).is_none())
    }

    fn push_derived(&mut self, definition: ColumnDefinition, derivation: Derivation) {
        tracing::debug!(
            table = %self.name,
            column = %definition.name(),
            kind = derivation.kind(),
            "Added derived column"
        );
        self.columns.push(Column::derived(definition, derivation));
        for row in &mut self.rows {
            row.push_column(Value::Null);
        }
        self.recompute_all_derived();
    }

    fn evaluate_into(&mut self, pos: usize, idx: usize) {
        let Some(derivation) = self.columns[idx].derivation() else {
            return;
        };
        let value = derivation.evaluate(&RowValues::new(&self.columns, &self.rows[pos].current));
        self.rows[pos].current[idx] = value;
    }

    /// Recompute derived values of one row; with `trigger`, only those
    /// invalidated by an edit of that column.
    pub(crate) fn recompute_row(&mut self, pos: usize, trigger: Option<&str>) {
        for idx in 0..self.columns.len() {
            let stale = match (self.columns[idx].derivation(), trigger) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(d), Some(column)) => d.triggered_by(&self.name, &self.name, column),
            };
            if stale {
                self.evaluate_into(pos, idx);
            }
        }
    }

    pub(crate) fn recompute_all_derived(&mut self) {
        if !self.columns.iter().any(Column::is_derived) {
            return;
        }
        for pos in 0..self.rows.len() {
            self.recompute_row(pos, None);
        }
    }

    fn has_self_lookups(&self) -> bool {
        self.columns.iter().any(|c| {
            matches!(c.derivation(), Some(Derivation::ParentLookup(l)) if l.parent_table == self.name)
        })
    }

    fn self_lookup_depends_on(&self, column: &str) -> bool {
        self.columns.iter().any(|c| {
            matches!(
                c.derivation(),
                Some(Derivation::ParentLookup(l))
                    if l.parent_table == self.name
                        && (l.parent_key == column || l.parent_value == column)
            )
        })
    }

    pub(crate) fn rebuild_self_lookups(&mut self) {
        for idx in 0..self.columns.len() {
            let fresh = match self.columns[idx].derivation() {
                Some(Derivation::ParentLookup(lookup)) if lookup.parent_table == self.name => {
                    let mut fresh = lookup.clone();
                    fresh.rebuild(&self.columns, &self.rows);
                    fresh
                }
                _ => continue,
            };
            if let Some(Derivation::ParentLookup(slot)) = self.columns[idx].derivation_mut() {
                *slot = fresh;
            }
        }
    }

    // ========================================================================
    // In-memory constraints
    // ========================================================================

    /// Every non-null self-referential child key in `values` must match the
    /// parent key of a live row (or of `values` itself).
    fn check_parent_exists(&self, skip: Option<usize>, values: &[Value]) -> Result<()> {
        for rel in self.relations.iter().filter(|r| r.is_self_referential()) {
            let child_idx = self.column_index(&rel.child_column)?;
            let parent_idx = self.column_index(&rel.parent_column)?;
            let Some(key) = values.get(child_idx).filter(|k| !k.is_null()) else {
                continue;
            };
            let found = values.get(parent_idx) == Some(key)
                || self.rows.iter().enumerate().any(|(i, r)| {
                    Some(i) != skip && !r.pending_delete && r.current.get(parent_idx) == Some(key)
                });
            if !found {
                return Err(Error::constraint(format!(
                    "relation '{}': no row of '{}' has {} = {}",
                    rel.name, self.name, rel.parent_column, key
                )));
            }
        }
        Ok(())
    }

    /// The row at `pos` may only disappear if no other live row references it.
    pub(crate) fn check_not_referenced(&self, pos: usize) -> Result<()> {
        for rel in self.relations.iter().filter(|r| r.is_self_referential()) {
            let parent_idx = self.column_index(&rel.parent_column)?;
            let key = &self.rows[pos].current[parent_idx];
            if key.is_null() {
                continue;
            }
            if !self.dependents(pos, rel, key)?.is_empty() {
                return Err(Error::constraint(format!(
                    "relation '{}': cannot remove row {} of '{}' while rows still reference {} = {}",
                    rel.name, self.rows[pos].key, self.name, rel.parent_column, key
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Row counts by state, for debugging.
    pub fn debug_state(&self) -> TableDebugInfo {
        let mut info = TableDebugInfo {
            table: self.name.clone(),
            rows: self.rows.len(),
            dirty_rows: self.changed.values().filter(|c| !c.is_empty()).count(),
            read_only: self.options.read_only,
            delete_restricted: self.options.delete_restricted,
            enforce_constraints: self.enforce_constraints,
            ..TableDebugInfo::default()
        };
        for pos in 0..self.rows.len() {
            match self.state_at(pos) {
                RowState::Added => info.added += 1,
                RowState::Modified => info.modified += 1,
                RowState::Deleted => info.deleted += 1,
                RowState::Unchanged => {}
            }
        }
        info
    }

    /// Live rows as a JSON array of objects.
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .filter(|r| !r.pending_delete)
            .map(|r| {
                let object: serde_json::Map<String, serde_json::Value> =
                    RowValues::new(&self.columns, &r.current)
                        .iter()
                        .map(|(name, value)| (name.to_string(), value.to_json()))
                        .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

fn validate_relation_args(name: &str, parent_column: &str, child_column: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::schema("relation name is required"));
    }
    if parent_column.trim().is_empty() {
        return Err(Error::schema("parent column name is required"));
    }
    if child_column.trim().is_empty() {
        return Err(Error::schema("child column name is required"));
    }
    Ok(())
}

/// Debug information about table state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDebugInfo {
    /// Table name.
    pub table: String,
    /// Total rows, including rows marked deleted.
    pub rows: usize,
    /// Rows pending INSERT.
    pub added: usize,
    /// Rows pending UPDATE.
    pub modified: usize,
    /// Rows pending DELETE.
    pub deleted: usize,
    /// Rows with recorded edits to update-eligible columns.
    pub dirty_rows: usize,
    /// Read-only option.
    pub read_only: bool,
    /// Delete-restricted option.
    pub delete_restricted: bool,
    /// In-memory relation enforcement.
    pub enforce_constraints: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablemirror_core::{OperationErrorKind, QueryErrorKind};

    struct Fixture {
        name: &'static str,
        ddl: &'static str,
        seed: Option<&'static str>,
    }

    impl TableSchema for Fixture {
        fn table_name(&self) -> &str {
            self.name
        }

        fn ddl(&self) -> String {
            self.ddl.to_string()
        }

        fn set_column_properties(&self, columns: &mut ColumnFlagsEditor<'_>) -> Result<()> {
            columns.generated_key("id");
            Ok(())
        }

        fn schema_version(&self) -> u32 {
            1
        }

        fn seed_sql(&self) -> Option<String> {
            self.seed.map(str::to_string)
        }
    }

    const TEAMS: Fixture = Fixture {
        name: "teams",
        ddl: "CREATE TABLE {NS}.\"{NAME}\" (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        seed: Some(
            "INSERT INTO {NS}.\"{NAME}\" (name) VALUES ('Preventers'); \
             INSERT INTO {NS}.\"{NAME}\" (name) VALUES ('Z-Force')",
        ),
    };

    const HEROES: Fixture = Fixture {
        name: "heroes",
        ddl: "CREATE TABLE {NS}.\"{NAME}\" (\
                id INTEGER PRIMARY KEY, \
                name TEXT NOT NULL, \
                team_id INTEGER, \
                power INTEGER NOT NULL DEFAULT 0)",
        seed: Some(
            "INSERT INTO {NS}.\"{NAME}\" (name, team_id, power) VALUES \
             ('Deadpond', 2, 10), ('Rusty-Man', 1, 40), ('Spider-Boy', 1, 25)",
        ),
    };

    const STAFF: Fixture = Fixture {
        name: "staff",
        ddl: "CREATE TABLE {NS}.\"{NAME}\" (\
                id INTEGER PRIMARY KEY, \
                code TEXT NOT NULL UNIQUE, \
                manager TEXT, \
                name TEXT)",
        seed: Some(
            "INSERT INTO {NS}.\"{NAME}\" (code, manager, name) VALUES \
             ('A', NULL, 'Ada'), ('B', 'A', 'Bo')",
        ),
    };

    fn open(store: &Store, fixture: Fixture) -> Table {
        let mut table = Table::new(store, fixture);
        table.ensure_created().unwrap();
        table.load(&LoadOptions::new().order_by("id")).unwrap();
        table
    }

    fn handle_of(table: &Table, column: &str, value: impl Into<Value>) -> RowHandle {
        table.find_row(column, &value.into()).unwrap()
    }

    #[test]
    fn test_ensure_created_seeds_once() {
        let store = Store::open_memory().unwrap();
        let table = Table::new(&store, TEAMS);
        assert!(!table.exists().unwrap());
        assert!(table.ensure_created().unwrap());
        assert!(table.has_rows().unwrap());
        assert!(!table.ensure_created().unwrap());
        assert_eq!(catalog::row_count(&store, "main", "teams").unwrap(), 2);
    }

    #[test]
    fn test_empty_ddl_is_schema_error() {
        let store = Store::open_memory().unwrap();
        let table = Table::new(
            &store,
            Fixture {
                name: "nothing",
                ddl: "  ",
                seed: None,
            },
        );
        assert!(matches!(table.create_from_ddl(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_load_materializes_columns() {
        let store = Store::open_memory().unwrap();
        let table = open(&store, HEROES);
        let names: Vec<&str> = table.columns().iter().map(Column::name).collect();
        assert_eq!(names, vec![ROW_ID_ALIAS, "id", "name", "team_id", "power"]);
        assert!(table.column(ROW_ID_ALIAS).unwrap().is_read_only());
        assert!(table.column("id").unwrap().flags().receives_generated_id);
        assert!(!table.column("id").unwrap().eligible_for_insert());
        assert!(table.column("name").unwrap().eligible_for_update());
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_load_with_fields_filter_and_params() {
        let store = Store::open_memory().unwrap();
        let mut table = open(&store, HEROES);
        let loaded = table
            .load(
                &LoadOptions::new()
                    .fields(&["name"])
                    .filter("power > ?1")
                    .param(20_i64)
                    .order_by("name DESC"),
            )
            .unwrap();
        assert_eq!(loaded, 2);
        let names: Vec<&str> = table.columns().iter().map(Column::name).collect();
        assert_eq!(names, vec![ROW_ID_ALIAS, "name"]);
        let first = table.rows().next().unwrap();
        assert_eq!(table.value(first, "name").unwrap(), &Value::from("Spider-Boy"));
    }

    #[test]
    fn test_edit_deleted_row_is_refused() {
        let store = Store::open_memory().unwrap();
        let mut table = open(&store, TEAMS);
        let row = handle_of(&table, "name", "Z-Force");
        table.delete_row(row).unwrap();
        let err = table.set_value(row, "name", Value::from("x")).unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(ref op) if op.kind == OperationErrorKind::DeletedRow
        ));
    }

    #[test]
    fn test_deleting_added_row_removes_it() {
        let store = Store::open_memory().unwrap();
        let mut table = open(&store, TEAMS);
        let row = table.add_row(&[("name", Value::from("Avengers"))]).unwrap();
        assert_eq!(table.row_state(row).unwrap(), RowState::Added);
        table.delete_row(row).unwrap();
        assert!(table.row_state(row).is_err());
        assert!(!table.change_set().has_any());
    }

    #[test]
    fn test_expression_column() {
        let store = Store::open_memory().unwrap();
        let mut heroes = open(&store, HEROES);
        let added = heroes
            .create_expression_column("label", ColumnType::Text, |row| {
                Value::from(format!("{} ({})", row.get_string("name"), row.get_i64("power")))
            })
            .unwrap();
        assert!(added);
        assert!(
            !heroes
                .create_expression_column("label", ColumnType::Text, |_| Value::Null)
                .unwrap()
        );

        let row = handle_of(&heroes, "name", "Deadpond");
        assert_eq!(heroes.value(row, "label").unwrap(), &Value::from("Deadpond (10)"));
        assert_eq!(heroes.row_state(row).unwrap(), RowState::Unchanged);

        heroes.set_value(row, "power", Value::Integer(11)).unwrap();
        assert_eq!(heroes.value(row, "label").unwrap(), &Value::from("Deadpond (11)"));
        assert!(matches!(
            heroes.set_value(row, "label", Value::from("x")),
            Err(Error::Operation(ref op)) if op.kind == OperationErrorKind::ReadOnlyColumn
        ));

        // Derived columns survive a reload.
        heroes.load(&LoadOptions::new()).unwrap();
        let row = handle_of(&heroes, "name", "Deadpond");
        assert_eq!(heroes.value(row, "label").unwrap(), &Value::from("Deadpond (10)"));
    }

    #[test]
    fn test_relation_arguments_are_validated() {
        let store = Store::open_memory().unwrap();
        let mut teams = open(&store, TEAMS);
        let mut heroes = open(&store, HEROES);
        assert!(matches!(
            teams.create_parent_child_relation("", "id", &mut heroes, "team_id", DeleteRule::Cascade),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            teams.create_parent_child_relation("r", "id", &mut heroes, " ", DeleteRule::Cascade),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            teams.create_parent_child_relation("r", "id", &mut heroes, "missing", DeleteRule::Cascade),
            Err(Error::Schema(_))
        ));
        teams
            .create_parent_child_relation("team_heroes", "id", &mut heroes, "team_id", DeleteRule::Cascade)
            .unwrap();
        assert_eq!(teams.relations().len(), 1);
        assert_eq!(heroes.relations().len(), 1);
        assert!(!teams.has_self_relation());
    }

    #[test]
    fn test_parent_lookup_column() {
        let store = Store::open_memory().unwrap();
        let mut teams = open(&store, TEAMS);
        let mut heroes = open(&store, HEROES);
        teams
            .create_parent_child_relation("team_heroes", "id", &mut heroes, "team_id", DeleteRule::SetNull)
            .unwrap();

        assert!(matches!(
            heroes.create_child_to_parent_column("team_name", "team_heroes", "name", None),
            Err(Error::Argument(_))
        ));
        assert!(
            heroes
                .create_child_to_parent_column("team_name", "team_heroes", "name", Some(&teams))
                .unwrap()
        );

        let row = handle_of(&heroes, "name", "Deadpond");
        assert_eq!(heroes.value(row, "team_name").unwrap(), &Value::from("Z-Force"));
        heroes.set_value(row, "team_id", Value::Integer(1)).unwrap();
        assert_eq!(heroes.value(row, "team_name").unwrap(), &Value::from("Preventers"));

        let preventers = handle_of(&teams, "name", "Preventers");
        teams.set_value(preventers, "name", Value::from("Guardians")).unwrap();
        assert_eq!(heroes.refresh_parent_lookups(&teams), 1);
        assert_eq!(heroes.value(row, "team_name").unwrap(), &Value::from("Guardians"));
    }

    #[test]
    fn test_action_column_tracks_other_table() {
        let store = Store::open_memory().unwrap();
        let mut heroes = open(&store, HEROES);
        let rate = std::sync::Arc::new(std::sync::atomic::AtomicI64::new(2));
        let factor = rate.clone();
        heroes
            .create_action_expression_column(
                "scaled",
                ColumnType::Integer,
                "settings",
                &["rate"],
                move |row| {
                    Value::Integer(
                        row.get_i64("power") * factor.load(std::sync::atomic::Ordering::SeqCst),
                    )
                },
            )
            .unwrap();
        let row = handle_of(&heroes, "name", "Rusty-Man");
        assert_eq!(heroes.value(row, "scaled").unwrap(), &Value::Integer(80));

        rate.store(3, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(heroes.notify_dependency_changed("settings", "other"), 0);
        assert_eq!(heroes.value(row, "scaled").unwrap(), &Value::Integer(80));
        assert_eq!(heroes.notify_dependency_changed("settings", "rate"), 1);
        assert_eq!(heroes.value(row, "scaled").unwrap(), &Value::Integer(120));
    }

    #[test]
    fn test_action_column_same_table_dependency() {
        let store = Store::open_memory().unwrap();
        let mut heroes = open(&store, HEROES);
        heroes
            .create_action_expression_column(
                "strong",
                ColumnType::Boolean,
                "heroes",
                &["power"],
                |row| Value::Boolean(row.get_i64("power") >= 30),
            )
            .unwrap();
        let row = handle_of(&heroes, "name", "Spider-Boy");
        assert_eq!(heroes.value(row, "strong").unwrap(), &Value::Boolean(false));
        heroes.set_value(row, "power", Value::Integer(30)).unwrap();
        assert_eq!(heroes.value(row, "strong").unwrap(), &Value::Boolean(true));
    }

    #[test]
    fn test_delete_rules_reach_supplied_children() {
        let store = Store::open_memory().unwrap();
        let mut teams = open(&store, TEAMS);
        let mut heroes = open(&store, HEROES);
        teams
            .create_parent_child_relation("team_heroes", "id", &mut heroes, "team_id", DeleteRule::Cascade)
            .unwrap();

        let preventers = handle_of(&teams, "name", "Preventers");
        let affected = teams
            .delete_with_children(preventers, &mut [&mut heroes])
            .unwrap();
        assert_eq!(affected, 3);
        assert_eq!(heroes.debug_state().deleted, 2);
        assert_eq!(heroes.live_rows().count(), 1);
    }

    #[test]
    fn test_set_null_rule() {
        let store = Store::open_memory().unwrap();
        let mut teams = open(&store, TEAMS);
        let mut heroes = open(&store, HEROES);
        teams
            .create_parent_child_relation("team_heroes", "id", &mut heroes, "team_id", DeleteRule::SetNull)
            .unwrap();
        let z_force = handle_of(&teams, "name", "Z-Force");
        teams.delete_with_children(z_force, &mut [&mut heroes]).unwrap();

        let deadpond = handle_of(&heroes, "name", "Deadpond");
        assert_eq!(heroes.value(deadpond, "team_id").unwrap(), &Value::Null);
        assert_eq!(heroes.row_state(deadpond).unwrap(), RowState::Modified);
    }

    #[test]
    fn test_set_default_rule() {
        let store = Store::open_memory().unwrap();
        let mut teams = open(&store, TEAMS);
        let mut heroes = open(&store, HEROES);
        teams
            .create_parent_child_relation(
                "team_heroes",
                "id",
                &mut heroes,
                "team_id",
                DeleteRule::SetDefault(Value::Boolean(true)),
            )
            .unwrap();
        let z_force = handle_of(&teams, "name", "Z-Force");
        assert_eq!(teams.delete_with_children(z_force, &mut [&mut heroes]).unwrap(), 2);

        // The default is coerced to the child column's INTEGER type.
        let deadpond = handle_of(&heroes, "name", "Deadpond");
        assert_eq!(heroes.value(deadpond, "team_id").unwrap(), &Value::Integer(1));
        assert_eq!(heroes.row_state(deadpond).unwrap(), RowState::Modified);
        let rusty = handle_of(&heroes, "name", "Rusty-Man");
        assert_eq!(heroes.row_state(rusty).unwrap(), RowState::Unchanged);
    }

    #[test]
    fn test_self_relation_enforced_on_edit() {
        let store = Store::open_memory().unwrap();
        let mut staff = open(&store, STAFF);
        staff
            .create_self_relation("reports_to", "code", "manager", DeleteRule::Cascade)
            .unwrap();
        assert!(staff.has_self_relation());

        let bo = handle_of(&staff, "code", "B");
        let err = staff.set_value(bo, "manager", Value::from("Z")).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
        assert_eq!(staff.value(bo, "manager").unwrap(), &Value::from("A"));

        let err = staff
            .add_row(&[("code", Value::from("C")), ("manager", Value::from("Q"))])
            .unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));

        assert!(staff.set_enforce_constraints(false));
        assert!(staff.set_value(bo, "manager", Value::from("Z")).unwrap());
    }

    #[test]
    fn test_self_relation_cascade_delete() {
        let store = Store::open_memory().unwrap();
        let mut staff = open(&store, STAFF);
        staff
            .create_self_relation("reports_to", "code", "manager", DeleteRule::Cascade)
            .unwrap();
        let ada = handle_of(&staff, "code", "A");
        assert_eq!(staff.delete_row(ada).unwrap(), 2);
        assert_eq!(staff.live_rows().count(), 0);
    }

    #[test]
    fn test_self_relation_without_rule_blocks_delete() {
        let store = Store::open_memory().unwrap();
        let mut staff = open(&store, STAFF);
        staff
            .create_self_relation("reports_to", "code", "manager", DeleteRule::None)
            .unwrap();
        let ada = handle_of(&staff, "code", "A");
        let err = staff.delete_row(ada).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
        assert_eq!(staff.row_state(ada).unwrap(), RowState::Unchanged);
    }

    #[test]
    fn test_reject_fails_on_referenced_new_parent() {
        let store = Store::open_memory().unwrap();
        let mut staff = open(&store, STAFF);
        staff
            .create_self_relation("reports_to", "code", "manager", DeleteRule::Cascade)
            .unwrap();
        staff.add_row(&[("code", Value::from("N"))]).unwrap();
        staff
            .add_row(&[("code", Value::from("M")), ("manager", Value::from("N"))])
            .unwrap();

        let err = staff.reject_changes().unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
        assert_eq!(staff.row_count(), 4);

        staff.set_enforce_constraints(false);
        staff.reject_changes().unwrap();
        assert_eq!(staff.row_count(), 2);
    }

    #[test]
    fn test_self_parent_lookup() {
        let store = Store::open_memory().unwrap();
        let mut staff = open(&store, STAFF);
        staff
            .create_self_relation("reports_to", "code", "manager", DeleteRule::Cascade)
            .unwrap();
        staff
            .create_child_to_parent_column("manager_name", "reports_to", "name", None)
            .unwrap();
        let bo = handle_of(&staff, "code", "B");
        assert_eq!(staff.value(bo, "manager_name").unwrap(), &Value::from("Ada"));

        let ada = handle_of(&staff, "code", "A");
        staff.set_value(ada, "name", Value::from("Adele")).unwrap();
        assert_eq!(staff.value(bo, "manager_name").unwrap(), &Value::from("Adele"));
    }

    #[test]
    fn test_debug_state_and_json() {
        let store = Store::open_memory().unwrap();
        let mut teams = open(&store, TEAMS);
        let z_force = handle_of(&teams, "name", "Z-Force");
        teams.set_value(z_force, "name", Value::from("Z")).unwrap();
        teams.add_row(&[("name", Value::from("New"))]).unwrap();

        let info = teams.debug_state();
        assert_eq!(info.rows, 3);
        assert_eq!(info.added, 1);
        assert_eq!(info.modified, 1);
        assert_eq!(info.dirty_rows, 1);
        assert!(info.enforce_constraints);

        let json = teams.to_json();
        assert_eq!(json[1]["name"], serde_json::json!("Z"));
        assert_eq!(json[2]["id"], serde_json::Value::Null);
        assert_eq!(json.as_array().map(Vec::len), Some(3));
    }
}
