//! Table-oriented cache store
//!
//! Each table is one JSON object file mapping string keys to arbitrary JSON
//! values. A table does not exist until the first `set` on it; lookups on a
//! missing table report `TableMissing` rather than `NotFound` so callers can
//! tell "never populated" apart from "populated without this key".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::lock::{LockOptions, TableLock};
use crate::namespace::{table_file_stem, Namespace};

/// Configuration for a cache store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding one subdirectory per namespace
    pub root: PathBuf,
    /// How writers wait for a table lock
    pub lock: LockOptions,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".sheetshard/db_cache"),
            lock: LockOptions::default(),
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// The key is present in the table
    Found(Value),
    /// The table exists but has no such key
    NotFound,
    /// The table has never been written
    TableMissing,
}

impl CacheLookup {
    /// The stored value, if any.
    pub fn found(self) -> Option<Value> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound | Self::TableMissing => None,
        }
    }

    pub fn is_table_missing(&self) -> bool {
        matches!(self, Self::TableMissing)
    }

    /// Error semantics: a missing table becomes `InvalidCacheTable`.
    pub fn into_result(self, table: &str) -> CacheResult<Option<Value>> {
        match self {
            Self::Found(value) => Ok(Some(value)),
            Self::NotFound => Ok(None),
            Self::TableMissing => Err(CacheError::InvalidCacheTable(table.to_string())),
        }
    }
}

/// Outcome of a key removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotPresent,
    TableMissing,
}

impl Removal {
    pub fn removed(&self) -> bool {
        matches!(self, Self::Removed)
    }

    /// Error semantics: a missing table becomes `InvalidCacheTable`.
    pub fn into_result(self, table: &str) -> CacheResult<bool> {
        match self {
            Self::Removed => Ok(true),
            Self::NotPresent => Ok(false),
            Self::TableMissing => Err(CacheError::InvalidCacheTable(table.to_string())),
        }
    }
}

/// Cache store scoped to one namespace.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    namespace: Namespace,
    lock: LockOptions,
}

impl CacheStore {
    /// Open (creating if needed) the namespace directory under `config.root`.
    pub fn open(config: &CacheConfig, namespace: Namespace) -> CacheResult<Self> {
        let dir = config.root.join(namespace.as_str());
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            namespace,
            lock: config.lock.clone(),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Directory holding this namespace's table files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the JSON file backing `table`.
    pub fn table_path(&self, table: &str) -> CacheResult<PathBuf> {
        Ok(self.dir.join(format!("{}.json", table_file_stem(table)?)))
    }

    /// Path of the lock marker for `table`.
    pub fn lock_path(&self, table: &str) -> CacheResult<PathBuf> {
        Ok(self.dir.join(format!("{}.lock", table_file_stem(table)?)))
    }

    /// Upsert `key -> value`, creating the table if needed.
    pub fn set(&self, table: &str, key: &str, value: Value) -> CacheResult<()> {
        let path = self.table_path(table)?;
        let _lock = TableLock::acquire(&self.lock_path(table)?, &self.lock)?;

        let mut entries = match Self::read_table(&path)? {
            Some(entries) => entries,
            None => Map::new(),
        };
        entries.insert(key.to_string(), value);
        Self::write_table(&path, &entries)?;

        debug!(namespace = %self.namespace, table, key, "cache entry stored");
        Ok(())
    }

    /// Look up `key` without taking the table lock.
    pub fn get(&self, table: &str, key: &str) -> CacheResult<CacheLookup> {
        let path = self.table_path(table)?;
        let lookup = match Self::read_table(&path)? {
            None => CacheLookup::TableMissing,
            Some(mut entries) => match entries.remove(key) {
                Some(value) => CacheLookup::Found(value),
                None => CacheLookup::NotFound,
            },
        };
        Ok(lookup)
    }

    /// Remove `key` from an existing table.
    pub fn delete(&self, table: &str, key: &str) -> CacheResult<Removal> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Ok(Removal::TableMissing);
        }

        let _lock = TableLock::acquire(&self.lock_path(table)?, &self.lock)?;
        let Some(mut entries) = Self::read_table(&path)? else {
            // Dropped while we waited for the lock
            return Ok(Removal::TableMissing);
        };
        if entries.remove(key).is_none() {
            return Ok(Removal::NotPresent);
        }
        Self::write_table(&path, &entries)?;

        debug!(namespace = %self.namespace, table, key, "cache entry removed");
        Ok(Removal::Removed)
    }

    /// Remove a whole table. Returns whether it existed.
    pub fn drop_table(&self, table: &str) -> CacheResult<bool> {
        let path = self.table_path(table)?;
        let _lock = TableLock::acquire(&self.lock_path(table)?, &self.lock)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(namespace = %self.namespace, table, "cache table dropped");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Read a table file; `None` when it does not exist.
    fn read_table(path: &Path) -> CacheResult<Option<Map<String, Value>>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };
        let value: Value = serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(entries) => Ok(Some(entries)),
            _ => Err(CacheError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Persist a table by writing a sibling temp file and renaming it over.
    ///
    /// Callers hold the table lock, so the temp name cannot collide.
    fn write_table(path: &Path, entries: &Map<String, Value>) -> CacheResult<()> {
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(entries).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
