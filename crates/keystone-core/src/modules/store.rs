//! Persisted module state.
//!
//! A module is installed exactly when a record exists for it. Records are
//! written only by the [`Module`](crate::modules::Module) hook wrappers once
//! a hook reported success.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur in the state store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] rusqlite::Error),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data error.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The store lock was poisoned by a panicking writer.
    #[error("state store lock poisoned")]
    LockPoisoned,
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persisted state of one installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Numeric id assigned at install time.
    pub id: i64,
    /// Technical module name.
    pub name: String,
    /// Installed version.
    pub version: Option<String>,
    /// Primary activation flag.
    pub active: bool,
    /// Variant activation flag.
    pub active_on_variant: bool,
    /// When the module was installed.
    pub installed_at: DateTime<Utc>,
}

/// Storage for installed-module records.
pub trait StateStore: Send + Sync {
    /// Fetches the record for `name`.
    fn get(&self, name: &str) -> StoreResult<Option<ModuleRecord>>;

    /// Lists all records ordered by name.
    fn list(&self) -> StoreResult<Vec<ModuleRecord>>;

    /// Records a fresh install; the module starts active on both contexts.
    fn insert(&self, name: &str, version: Option<&str>) -> StoreResult<ModuleRecord>;

    /// Removes the record. Returns whether one existed.
    fn remove(&self, name: &str) -> StoreResult<bool>;

    /// Updates the primary activation flag.
    fn set_active(&self, name: &str, active: bool) -> StoreResult<()>;

    /// Updates the variant activation flag.
    fn set_active_on_variant(&self, name: &str, active: bool) -> StoreResult<()>;

    /// Updates the installed version.
    fn set_version(&self, name: &str, version: &str) -> StoreResult<()>;
}

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Opens (and initializes) a database file.
    ///
    /// # Errors
    /// * `StoreError::Connection` - If the database connection fails
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database for testing.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        info!("Initializing module state schema");
        let conn = self.lock()?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS modules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                version TEXT,
                active INTEGER NOT NULL,
                active_on_variant INTEGER NOT NULL,
                installed_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn update_flag(&self, column: &str, name: &str, value: bool) -> StoreResult<()> {
        let conn = self.lock()?;
        let sql = format!("UPDATE modules SET {column} = ?1 WHERE name = ?2");
        let changed = conn.execute(&sql, params![value, name])?;
        if changed == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

/// Parses an RFC3339 timestamp column.
fn parse_timestamp(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let timestamp_str: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&timestamp_str).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Text,
        )
    })
}

fn row_to_record(row: &Row) -> rusqlite::Result<ModuleRecord> {
    Ok(ModuleRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        active: row.get(3)?,
        active_on_variant: row.get(4)?,
        installed_at: parse_timestamp(row, 5, "installed_at")?,
    })
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, version, active, active_on_variant, installed_at FROM modules";

impl StateStore for SqliteStateStore {
    fn get(&self, name: &str) -> StoreResult<Option<ModuleRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE name = ?1"), params![name], row_to_record)
            .optional()?;
        Ok(record)
    }

    fn list(&self) -> StoreResult<Vec<ModuleRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY name"))?;
        let records = stmt.query_map([], row_to_record)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn insert(&self, name: &str, version: Option<&str>) -> StoreResult<ModuleRecord> {
        let installed_at = Utc::now();
        let id = {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO modules (name, version, active, active_on_variant, installed_at)
                 VALUES (?1, ?2, 1, 1, ?3)",
                params![name, version, installed_at.to_rfc3339()],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(failure, _)
                    if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::InvalidData(format!("module already recorded: {name}"))
                }
                other => StoreError::Connection(other),
            })?;
            conn.last_insert_rowid()
        };
        debug!(module = %name, id, "Recorded module install");

        Ok(ModuleRecord {
            id,
            name: name.to_string(),
            version: version.map(str::to_string),
            active: true,
            active_on_variant: true,
            installed_at,
        })
    }

    fn remove(&self, name: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM modules WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    }

    fn set_active(&self, name: &str, active: bool) -> StoreResult<()> {
        self.update_flag("active", name, active)
    }

    fn set_active_on_variant(&self, name: &str, active: bool) -> StoreResult<()> {
        self.update_flag("active_on_variant", name, active)
    }

    fn set_version(&self, name: &str, version: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute("UPDATE modules SET version = ?1 WHERE name = ?2", params![version, name])?;
        if changed == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

/// In-memory state store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: BTreeMap<String, ModuleRecord>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<F>(&self, name: &str, update: F) -> StoreResult<()>
    where
        F: FnOnce(&mut ModuleRecord),
    {
        let mut state = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        let record =
            state.records.get_mut(name).ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        update(record);
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, name: &str) -> StoreResult<Option<ModuleRecord>> {
        let state = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.records.get(name).cloned())
    }

    fn list(&self) -> StoreResult<Vec<ModuleRecord>> {
        let state = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.records.values().cloned().collect())
    }

    fn insert(&self, name: &str, version: Option<&str>) -> StoreResult<ModuleRecord> {
        let mut state = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        if state.records.contains_key(name) {
            return Err(StoreError::InvalidData(format!("module already recorded: {name}")));
        }
        state.next_id += 1;
        let record = ModuleRecord {
            id: state.next_id,
            name: name.to_string(),
            version: version.map(str::to_string),
            active: true,
            active_on_variant: true,
            installed_at: Utc::now(),
        };
        state.records.insert(name.to_string(), record.clone());
        Ok(record)
    }

    fn remove(&self, name: &str) -> StoreResult<bool> {
        let mut state = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.records.remove(name).is_some())
    }

    fn set_active(&self, name: &str, active: bool) -> StoreResult<()> {
        self.with_record(name, |record| record.active = active)
    }

    fn set_active_on_variant(&self, name: &str, active: bool) -> StoreResult<()> {
        self.with_record(name, |record| record.active_on_variant = active)
    }

    fn set_version(&self, name: &str, version: &str) -> StoreResult<()> {
        self.with_record(name, |record| record.version = Some(version.to_string()))
    }
}
