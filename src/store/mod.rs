//! Durable entity store.
//!
//! # Responsibilities
//! - Own the single SQLite connection of the process
//! - Run every save inside one IMMEDIATE transaction
//! - Map entity structs to rows (canonical columns + JSON text columns)
//!
//! # Data Flow
//! ```text
//! Store::transaction(|tx| ...)
//!     → BEGIN IMMEDIATE
//!     → closure (queries in the per-table modules take &Connection)
//!     → Ok  → COMMIT
//!     → Err → ROLLBACK, error returned unchanged
//! ```
//!
//! # Design Decisions
//! - The connection mutex is the only writer lock; IMMEDIATE takes the
//!   SQLite write lock up front so two saves never interleave
//! - A panic inside the closure drops the open transaction, which rolls it
//!   back before the panic continues to unwind
//! - Query modules are free functions over `&Connection`, so they work the
//!   same on a plain connection and inside a transaction

pub mod changes;
pub mod clients;
pub mod endpoints;
pub mod error;
pub mod inbounds;
pub mod outbounds;
mod schema;
pub mod settings;
pub mod tls;

pub use error::{StoreError, StoreResult};

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::error::QueryContext;

/// Persistent store for all configuration entities, backed by SQLite.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the store at the given path.
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).op("open database")?;
        conn.busy_timeout(busy_timeout).op("set busy timeout")?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .op("enable WAL")?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "Store opened");
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for tests and dry runs).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().op("open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panicking save has already rolled back; the connection is usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` inside an IMMEDIATE transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .op("begin transaction")?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().op("commit")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::error!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Runs read-only queries against the connection.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = self.lock();
        f(&conn)
    }
}

/// Id of the row in `table` whose `column` equals `value`.
///
/// `table` and `column` are always compile-time names.
pub(crate) fn lookup_id(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    value: &str,
) -> StoreResult<Option<i64>> {
    let sql = format!("SELECT id FROM {table} WHERE \"{column}\" = ?1");
    conn.query_row(&sql, params![value], |row| row.get(0))
        .optional()
        .op("lookup id")
}

pub(crate) fn count(conn: &Connection, table: &'static str) -> StoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    conn.query_row(&sql, [], |row| row.get(0)).op("count rows")
}

pub(crate) fn delete_by_id(conn: &Connection, table: &'static str, id: i64) -> StoreResult<bool> {
    let sql = format!("DELETE FROM {table} WHERE id = ?1");
    let removed = conn.execute(&sql, params![id]).op("delete row")?;
    Ok(removed > 0)
}

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(
    table: &'static str,
    column: &'static str,
    id: i64,
    text: &str,
) -> StoreResult<T> {
    serde_json::from_str(text).map_err(|source| StoreError::Corrupt {
        table,
        column,
        id,
        source,
    })
}
