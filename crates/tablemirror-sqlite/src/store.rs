//! The store handle: one SQLite connection, its lock, and transactions.
//!
//! SQLite only starts a new transaction when none is active on the connection.
//! If two threads each ran BEGIN ... COMMIT on a shared connection without
//! coordination, the second COMMIT could find no transaction left to commit.
//! A [`Transaction`] therefore holds the connection lock for its whole
//! begin → commit/rollback span, and code that is handed a `&Transaction` never
//! locks again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use rusqlite::Connection;
use tablemirror_core::{Error, OperationErrorKind, QueryErrorKind, Result, Value, quote_ident};

use crate::config::StoreConfig;
use crate::convert::{from_value_ref, to_sql_value};
use crate::error::{connection_error, map_sqlite_error};

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result column names, in select order.
    pub columns: Vec<String>,
    /// Raw values, one vector per row, uncoerced.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Ordinal of a result column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// True if no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Something statements can be run against: the store itself (locks per call)
/// or an open [`Transaction`] (already holds the lock).
pub trait Executor {
    /// Run one statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run several `;`-separated statements without parameters.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a query and collect every row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Row id generated by the most recent INSERT on this connection.
    fn last_insert_rowid(&self) -> Result<i64>;

    /// Namespace substituted for `{NS}`.
    fn namespace(&self) -> &str;

    /// First column of the first row.
    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        let result = self.query(sql, params)?;
        result
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| {
                Error::Query(
                    tablemirror_core::QueryError::new(
                        QueryErrorKind::NotFound,
                        "query returned no rows",
                    )
                    .with_sql(sql),
                )
            })
    }
}

struct StoreInner {
    conn: Mutex<Connection>,
    /// Thread currently inside a self-managed transaction, if any.
    tx_owner: Mutex<Option<ThreadId>>,
    config: StoreConfig,
    statements: Mutex<Vec<String>>,
}

/// Shared handle to one SQLite connection.
///
/// Cloning is cheap; every clone refers to the same connection and lock.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.config.path)
            .field("namespace", &self.inner.config.namespace)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open a store.
    #[tracing::instrument(level = "debug", skip(config), fields(path = ?config.path))]
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| connection_error("failed to open database", e))?;

        conn.busy_timeout(config.busy_timeout)
            .map_err(|e| connection_error("failed to set busy timeout", e))?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(|e| connection_error("failed to configure foreign keys", e))?;

        if config.needs_attach() {
            let target = config
                .namespace_path
                .as_ref()
                .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string());
            conn.execute(
                &format!("ATTACH DATABASE ?1 AS {}", quote_ident(&config.namespace)),
                [target],
            )
            .map_err(|e| connection_error("failed to attach namespace", e))?;
        }

        tracing::info!(
            namespace = %config.namespace,
            in_memory = config.path.is_none(),
            "Opened store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                conn: Mutex::new(conn),
                tx_owner: Mutex::new(None),
                config,
                statements: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Open a private in-memory store with default settings.
    pub fn open_memory() -> Result<Self> {
        Self::open(StoreConfig::memory())
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// True if both handles refer to the same connection.
    pub fn same_store(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Acquire the connection lock and begin a transaction.
    ///
    /// Blocks while another thread holds a transaction. Fails with a lock
    /// re-entry error if the calling thread already holds one.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let guard = self.lock()?;
        *self.owner_slot() = Some(thread::current().id());

        let tx = Transaction {
            store: self,
            conn: guard,
            finished: false,
        };
        // On failure `tx` drops and clears the owner.
        tx.run_control("BEGIN")?;
        tracing::info!("Beginning transaction");
        Ok(tx)
    }

    /// Whether the calling thread currently holds a transaction on this store.
    pub fn in_transaction_on_this_thread(&self) -> bool {
        *self.owner_slot() == Some(thread::current().id())
    }

    /// Statements recorded so far (empty unless `record_statements` is on).
    pub fn recorded_statements(&self) -> Vec<String> {
        self.inner
            .statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget recorded statements.
    pub fn clear_recorded_statements(&self) {
        self.inner
            .statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn owner_slot(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.inner
            .tx_owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        if self.in_transaction_on_this_thread() {
            return Err(Error::operation(
                OperationErrorKind::LockReentry,
                "this thread already holds a transaction on the store; \
                 run the statement through that transaction instead",
            ));
        }
        Ok(self
            .inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, sql: &str) {
        tracing::debug!(sql = %sql, "Executing statement");
        if self.inner.config.record_statements {
            self.inner
                .statements
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(sql.to_string());
        }
    }
}

impl Executor for Store {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let conn = self.lock()?;
        self.record(sql);
        execute_on(&conn, sql, params)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.lock()?;
        self.record(sql);
        conn.execute_batch(sql)
            .map_err(|e| map_sqlite_error(e, Some(sql)))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.lock()?;
        self.record(sql);
        query_on(&conn, sql, params)
    }

    fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.lock()?.last_insert_rowid())
    }

    fn namespace(&self) -> &str {
        &self.inner.config.namespace
    }
}

/// An open transaction holding the store lock.
///
/// Dropping an unfinished transaction rolls it back.
pub struct Transaction<'s> {
    store: &'s Store,
    conn: MutexGuard<'s, Connection>,
    finished: bool,
}

impl<'s> Transaction<'s> {
    /// The store this transaction belongs to.
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Commit.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(mut self) -> Result<()> {
        tracing::info!("Committing transaction");
        self.run_control("COMMIT")?;
        self.finish();
        Ok(())
    }

    /// Roll back.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(mut self) -> Result<()> {
        tracing::info!("Rolling back transaction");
        let result = self.run_control("ROLLBACK");
        self.finish();
        result
    }

    fn run_control(&self, sql: &str) -> Result<()> {
        self.store.record(sql);
        self.conn
            .execute_batch(sql)
            .map_err(|e| map_sqlite_error(e, Some(sql)))
    }

    fn finish(&mut self) {
        self.finished = true;
        *self.store.owner_slot() = None;
    }
}

impl Executor for Transaction<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.store.record(sql);
        execute_on(&self.conn, sql, params)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.store.record(sql);
        self.conn
            .execute_batch(sql)
            .map_err(|e| map_sqlite_error(e, Some(sql)))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.store.record(sql);
        query_on(&self.conn, sql, params)
    }

    fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.conn.last_insert_rowid())
    }

    fn namespace(&self) -> &str {
        self.store.namespace()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if !self.conn.is_autocommit() {
            tracing::warn!("Transaction dropped without commit; rolling back");
            if let Err(e) = self.run_control("ROLLBACK") {
                tracing::error!(error = %e, "Rollback of dropped transaction failed");
            }
        }
        self.finish();
    }
}

fn execute_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<usize> {
    conn.execute(sql, rusqlite::params_from_iter(params.iter().map(to_sql_value)))
        .map_err(|e| map_sqlite_error(e, Some(sql)))
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let map_err = |e| map_sqlite_error(e, Some(sql));
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows_out = Vec::new();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter().map(to_sql_value)))
        .map_err(map_err)?;
    while let Some(row) = rows.next().map_err(map_err)? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(from_value_ref(row.get_ref(idx).map_err(map_err)?));
        }
        rows_out.push(values);
    }

    tracing::trace!(sql = %sql, rows = rows_out.len(), "Query complete");
    Ok(QueryResult {
        columns,
        rows: rows_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_store() -> Store {
        Store::open(StoreConfig::memory().record_statements(true)).unwrap()
    }

    #[test]
    fn test_execute_and_query() {
        let store = recording_store();
        store
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        store
            .execute("INSERT INTO t (name) VALUES (?1)", &[Value::from("a")])
            .unwrap();
        let result = store.query("SELECT id, name FROM t", &[]).unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(
            result.rows,
            vec![vec![Value::Integer(1), Value::Text("a".into())]]
        );
        assert_eq!(store.recorded_statements().len(), 3);
    }

    #[test]
    fn test_transaction_commit_and_rollback() {
        let store = recording_store();
        store.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();

        let tx = store.begin().unwrap();
        tx.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
        tx.commit().unwrap();

        let tx = store.begin().unwrap();
        tx.execute("INSERT INTO t VALUES (2)", &[]).unwrap();
        tx.rollback().unwrap();

        let count = store.query_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, Value::Integer(1));
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = recording_store();
        store.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        {
            let tx = store.begin().unwrap();
            tx.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
        }
        assert!(!store.in_transaction_on_this_thread());
        let count = store.query_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, Value::Integer(0));
        assert!(store.recorded_statements().iter().any(|s| s == "ROLLBACK"));
    }

    #[test]
    fn test_reentry_is_reported_not_deadlocked() {
        let store = recording_store();
        let tx = store.begin().unwrap();
        let err = store.execute("SELECT 1", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(ref op) if op.kind == OperationErrorKind::LockReentry
        ));
        assert!(matches!(
            store.begin(),
            Err(Error::Operation(ref op)) if op.kind == OperationErrorKind::LockReentry
        ));
        tx.commit().unwrap();
        assert!(store.execute("SELECT 1", &[]).is_ok());
    }

    #[test]
    fn test_query_scalar_no_rows() {
        let store = recording_store();
        store.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        let err = store.query_scalar("SELECT v FROM t", &[]).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::NotFound));
    }

    #[test]
    fn test_same_store() {
        let a = Store::open_memory().unwrap();
        let b = a.clone();
        let c = Store::open_memory().unwrap();
        assert!(a.same_store(&b));
        assert!(!a.same_store(&c));
    }

    #[test]
    fn test_attached_namespace() {
        let store = Store::open(StoreConfig::memory().namespace("aux")).unwrap();
        store
            .execute_batch("CREATE TABLE aux.t (v INTEGER); INSERT INTO aux.t VALUES (7)")
            .unwrap();
        assert_eq!(
            store.query_scalar("SELECT v FROM aux.t", &[]).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(store.namespace(), "aux");
    }
}
