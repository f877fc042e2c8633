//! Named state entries (local index, offline queue) persisted wholesale.
//!
//! Several processes may share one state file, so every mutation re-reads
//! the stored entry inside a write transaction instead of trusting a cached
//! copy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Database;
use crate::error::{Error, Result};

/// Durable key-value storage for whole collections.
///
/// Each key holds one serialized collection that is rewritten in full on
/// every mutation.
pub trait StateStore: Send + Sync {
    /// Load the raw value stored under `key`
    fn load_value(&self, key: &str) -> Result<Option<String>>;

    /// Replace the raw value stored under `key`
    fn save_value(&self, key: &str, value: &str) -> Result<()>;

    /// Read-modify-write the value under `key` atomically.
    ///
    /// `apply` receives the currently stored value and returns the new one.
    /// No other writer of the same store, in this process or another, can
    /// change the entry between the read and the write. An error from
    /// `apply` leaves the entry untouched.
    fn update_value(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<()>;
}

/// Load and decode a JSON entry, falling back to `T::default()` when absent.
pub fn load_json<T>(store: &dyn StateStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match store.load_value(key)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(T::default()),
    }
}

/// Decode the stored JSON entry, let `apply` change it, and store it again
/// in one atomic step. Returns the value that was written.
pub fn update_json<T, F>(store: &dyn StateStore, key: &str, apply: F) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T),
{
    let mut apply = Some(apply);
    let mut written = None;
    store.update_value(key, &mut |current: Option<String>| -> Result<String> {
        let mut value: T = match current {
            Some(raw) => serde_json::from_str(&raw)?,
            None => T::default(),
        };
        if let Some(apply) = apply.take() {
            apply(&mut value);
        }
        let raw = serde_json::to_string(&value)?;
        written = Some(value);
        Ok(raw)
    })?;
    written.ok_or_else(|| Error::Store(format!("state entry {key} was not rewritten")))
}

/// `SQLite` implementation of `StateStore`
pub struct SqliteStateStore {
    db: Mutex<Database>,
}

impl SqliteStateStore {
    /// Open (or create) the state database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Open an in-memory state database (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Store("state database lock poisoned".to_string()))
    }
}

impl StateStore for SqliteStateStore {
    fn load_value(&self, key: &str) -> Result<Option<String>> {
        let db = self.lock()?;
        let value = db
            .connection()
            .query_row(
                "SELECT value FROM kv_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save_value(&self, key: &str, value: &str) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT OR REPLACE INTO kv_state (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn update_value(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<()> {
        let mut db = self.lock()?;
        // IMMEDIATE takes the write lock up front so two processes cannot both
        // read the old value.
        let tx = db
            .connection_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row(
                "SELECT value FROM kv_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let value = apply(current)?;
        tx.execute(
            "INSERT OR REPLACE INTO kv_state (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// In-memory implementation of `StateStore`, useful for tests and dry runs.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("memory state lock poisoned".to_string()))
    }
}

impl StateStore for MemoryStateStore {
    fn load_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save_value(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn update_value(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<()> {
        let mut entries = self.lock()?;
        let value = apply(entries.get(key).cloned())?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}
