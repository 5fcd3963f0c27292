//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CacheEntry, Cacheable};

/// Trait for cache storage backends.
///
/// A backend holds at most one entry per key. `store` replaces the entry
/// wholesale; there is no merge.
pub trait CacheStorage: Send + Sync {
  /// Get the entry stored under `key`, if any.
  fn load<T: Cacheable>(&self, key: &str) -> Result<Option<CacheEntry<T>>>;

  /// Replace the entry stored under `key`.
  fn store<T: Cacheable>(&self, key: &str, entry: &CacheEntry<T>) -> Result<()>;
}

/// Process-lifetime storage. Entries live until the storage is dropped.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn load<T: Cacheable>(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    match entries.get(key) {
      Some(boxed) => boxed
        .downcast_ref::<CacheEntry<T>>()
        .cloned()
        .map(Some)
        .ok_or_else(|| eyre!("Cache key '{}' holds a different entity type", key)),
      None => Ok(None),
    }
  }

  fn store<T: Cacheable>(&self, key: &str, entry: &CacheEntry<T>) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(key.to_string(), Box::new(entry.clone()));
    Ok(())
  }
}

/// SQLite-based cache storage, so a new process can start from the last
/// good data when the backend is unreachable.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Create a new SQLite storage at `path`, creating parent directories.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Storage that disappears with the process. Mostly for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("academe").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    data BLOB NOT NULL,
    item_count INTEGER NOT NULL,
    fetched_at TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn load<T: Cacheable>(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, fetched_at FROM cache_entries
         WHERE cache_key = ? AND entity_type = ?",
        params![key, T::entity_type()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry '{}': {}", key, e))?;

    let Some((data, fetched_at)) = row else {
      return Ok(None);
    };

    let items: Vec<T> = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Failed to deserialize cache entry '{}': {}", key, e))?;

    Ok(Some(CacheEntry::new(items, parse_datetime(&fetched_at)?)))
  }

  fn store<T: Cacheable>(&self, key: &str, entry: &CacheEntry<T>) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data = serde_json::to_vec(&entry.items)
      .map_err(|e| eyre!("Failed to serialize cache entry '{}': {}", key, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (cache_key, entity_type, data, item_count, fetched_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          key,
          T::entity_type(),
          data,
          entry.items.len(),
          entry.fetched_at.to_rfc3339()
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry '{}': {}", key, e))?;

    Ok(())
  }
}

/// Storage chosen at runtime from configuration.
pub enum StorageBackend {
  Memory(MemoryStorage),
  Sqlite(SqliteStorage),
}

impl CacheStorage for StorageBackend {
  fn load<T: Cacheable>(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
    match self {
      StorageBackend::Memory(s) => s.load(key),
      StorageBackend::Sqlite(s) => s.load(key),
    }
  }

  fn store<T: Cacheable>(&self, key: &str, entry: &CacheEntry<T>) -> Result<()> {
    match self {
      StorageBackend::Memory(s) => s.store(key, entry),
      StorageBackend::Sqlite(s) => s.store(key, entry),
    }
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
