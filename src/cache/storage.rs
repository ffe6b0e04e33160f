//! Durable slot storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::listing::{FilterState, SortState, ValueRange};

/// Applied filters and sort as kept across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilters {
  pub rooms: Vec<u32>,
  pub price_range: ValueRange,
  pub area_range: ValueRange,
  #[serde(default)]
  pub sort: SortState,
}

impl SavedFilters {
  pub fn new(filters: &FilterState, sort: &SortState) -> Self {
    Self {
      rooms: filters.rooms.iter().copied().collect(),
      price_range: filters.price_range,
      area_range: filters.area_range,
      sort: sort.clone(),
    }
  }

  pub fn into_parts(self) -> (FilterState, SortState) {
    let filters = FilterState {
      rooms: self.rooms.into_iter().collect(),
      price_range: self.price_range,
      area_range: self.area_range,
    };
    (filters, self.sort)
  }
}

/// A value read back from a slot.
#[derive(Debug, Clone)]
pub struct StoredSlot<T> {
  pub value: T,
  /// When the value was written
  pub saved_at: DateTime<Utc>,
}

/// Trait for named key-value slot backends.
pub trait SlotStorage: Send + Sync {
  /// Read a slot. `Ok(None)` when nothing has been saved yet.
  fn load<T: DeserializeOwned>(&self, slot: &str) -> Result<Option<StoredSlot<T>>>;

  /// Overwrite a slot.
  fn save<T: Serialize>(&self, slot: &str, value: &T) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when storage is disabled - all operations are no-ops.
pub struct NoopStorage;

impl SlotStorage for NoopStorage {
  fn load<T: DeserializeOwned>(&self, _slot: &str) -> Result<Option<StoredSlot<T>>> {
    Ok(None) // Always empty
  }

  fn save<T: Serialize>(&self, _slot: &str, _value: &T) -> Result<()> {
    Ok(()) // Discard
  }
}

/// SQLite-based slot storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the storage at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Private in-memory database, gone when dropped.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory storage: {}", e))?;
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

    Ok(data_dir.join("aptcat").join("state.db"))
  }

  /// Run database migrations for slot tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SLOT_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for slot tables.
const SLOT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS slots (
    name TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SlotStorage for SqliteStorage {
  fn load<T: DeserializeOwned>(&self, slot: &str) -> Result<Option<StoredSlot<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, saved_at FROM slots WHERE name = ?",
        params![slot],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read slot {}: {}", slot, e))?;

    match row {
      Some((data, saved_at_str)) => {
        let value: T = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize slot {}: {}", slot, e))?;
        let saved_at = parse_datetime(&saved_at_str)?;
        Ok(Some(StoredSlot { value, saved_at }))
      }
      None => Ok(None),
    }
  }

  fn save<T: Serialize>(&self, slot: &str, value: &T) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize slot: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO slots (name, data, saved_at)
         VALUES (?, ?, datetime('now'))",
        params![slot, data],
      )
      .map_err(|e| eyre!("Failed to write slot {}: {}", slot, e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::SortDirection;

  fn saved() -> SavedFilters {
    let mut filters = FilterState::new(ValueRange(6_000_000, 12_000_000), ValueRange(40, 80));
    filters.rooms.extend([3, 1]);
    SavedFilters::new(&filters, &SortState::new("area", SortDirection::Desc))
  }

  #[test]
  fn test_round_trip_reproduces_state() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let original = saved();
    storage.save("filters", &original).unwrap();

    let loaded: StoredSlot<SavedFilters> = storage.load("filters").unwrap().unwrap();
    assert_eq!(loaded.value, original);

    let (filters, sort) = loaded.value.into_parts();
    let (expected_filters, expected_sort) = original.into_parts();
    assert_eq!(filters, expected_filters);
    assert_eq!(sort, expected_sort);
  }

  #[test]
  fn test_missing_slot_is_none() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let loaded: Option<StoredSlot<SavedFilters>> = storage.load("filters").unwrap();
    assert!(loaded.is_none());
  }

  #[test]
  fn test_save_overwrites() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.save("filters", &saved()).unwrap();

    let mut newer = saved();
    newer.rooms = vec![2];
    storage.save("filters", &newer).unwrap();

    let loaded: StoredSlot<SavedFilters> = storage.load("filters").unwrap().unwrap();
    assert_eq!(loaded.value.rooms, vec![2]);
  }

  #[test]
  fn test_corrupt_slot_is_an_error() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.save("filters", &"not filters").unwrap();
    assert!(storage.load::<SavedFilters>("filters").is_err());
  }

  #[test]
  fn test_wire_format() {
    let json = serde_json::to_value(saved()).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "rooms": [1, 3],
        "priceRange": [6000000, 12000000],
        "areaRange": [40, 80],
        "sort": {"field": "area", "direction": "desc"}
      })
    );
  }

  #[test]
  fn test_noop_storage() {
    let storage = NoopStorage;
    storage.save("filters", &saved()).unwrap();
    assert!(storage.load::<SavedFilters>("filters").unwrap().is_none());
  }
}
