//! Ordered key-value record store abstraction.
//!
//! # Responsibility
//! - Define the point-lookup / overwrite / delete / ordered-scan contract
//!   shared by every entity table.
//! - Enforce per-table capacity budgets on serialized records.
//!
//! # Invariants
//! - `values()` yields records in ascending key order.
//! - A rejected `put` leaves the table unchanged.
//! - Budgets are measured on the `serde_json` encoding, so every backend
//!   accepts and rejects the same records.

use crate::db::DbError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;
pub mod tables;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub use tables::{MemoryTables, SqliteTables, Tables};

/// Logical table name for user records.
pub const USERS_TABLE: &str = "users";
/// Logical table name for proposal records.
pub const PROPOSALS_TABLE: &str = "proposals";
/// Logical table name for vote records.
pub const VOTES_TABLE: &str = "votes";

const DEFAULT_MAX_ENTRIES: u64 = 100_000;
const DEFAULT_MAX_KEY_BYTES: usize = 44;
/// Users and proposals embed every vote they touch. One embedded vote with
/// UUID ids is about 200 bytes of JSON, so 64 KiB holds roughly 320 votes
/// per proposal and per voter.
const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024;

pub type StoreResult<T> = Result<T, StoreError>;

/// Fixed capacity budget of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableBudget {
    /// Maximum number of live keys.
    pub max_entries: u64,
    /// Maximum key length in bytes.
    pub max_key_bytes: usize,
    /// Maximum serialized record length in bytes.
    pub max_record_bytes: usize,
}

impl Default for TableBudget {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_key_bytes: DEFAULT_MAX_KEY_BYTES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// Errors raised by record store backends.
#[derive(Debug)]
pub enum StoreError {
    /// Inserting a new key would exceed `max_entries`.
    StoreFull {
        table: &'static str,
        max_entries: u64,
    },
    /// Serialized record exceeds `max_record_bytes`.
    RecordTooLarge {
        table: &'static str,
        key: String,
        size: usize,
        max: usize,
    },
    /// Key exceeds `max_key_bytes`.
    KeyTooLarge {
        table: &'static str,
        key: String,
        size: usize,
        max: usize,
    },
    /// Record could not be encoded or a persisted payload could not be decoded.
    Codec {
        table: &'static str,
        source: serde_json::Error,
    },
    Db(DbError),
    /// Connection has not been migrated to the expected schema version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreFull { table, max_entries } => {
                write!(f, "table `{table}` is full ({max_entries} entries)")
            }
            Self::RecordTooLarge {
                table,
                key,
                size,
                max,
            } => write!(
                f,
                "record `{key}` in table `{table}` is {size} bytes, budget is {max}"
            ),
            Self::KeyTooLarge {
                table,
                key,
                size,
                max,
            } => write!(
                f,
                "key `{key}` for table `{table}` is {size} bytes, budget is {max}"
            ),
            Self::Codec { table, source } => {
                write!(f, "record codec failure in table `{table}`: {source}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required sqlite table `{table}` is missing")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable map from a unique string key to one serializable record.
///
/// Lookups by anything other than the key are full scans over `values()`.
pub trait RecordStore<V> {
    /// Logical table name, used in errors and log events.
    fn table(&self) -> &'static str;

    fn budget(&self) -> TableBudget;

    fn get(&self, key: &str) -> StoreResult<Option<V>>;

    fn contains_key(&self, key: &str) -> StoreResult<bool>;

    /// Runs every check `put` would run, without writing.
    fn check_put(&self, key: &str, value: &V) -> StoreResult<()>;

    /// Inserts or overwrites the record under `key`.
    fn put(&mut self, key: &str, value: &V) -> StoreResult<()>;

    /// Removes `key`. Returns `false` when the key was absent.
    fn delete(&mut self, key: &str) -> StoreResult<bool>;

    /// All records in ascending key order.
    fn values(&self) -> StoreResult<Vec<V>>;

    fn len(&self) -> StoreResult<u64>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn encode_record<V: Serialize>(table: &'static str, value: &V) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Codec { table, source })
}

pub(crate) fn decode_record<V: DeserializeOwned>(
    table: &'static str,
    payload: &str,
) -> StoreResult<V> {
    serde_json::from_str(payload).map_err(|source| StoreError::Codec { table, source })
}

/// Shared budget check for every backend.
///
/// `key_exists` marks an overwrite, which never counts against `max_entries`.
pub(crate) fn check_budget(
    table: &'static str,
    budget: &TableBudget,
    key: &str,
    payload: &str,
    key_exists: bool,
    current_len: u64,
) -> StoreResult<()> {
    if key.len() > budget.max_key_bytes {
        return Err(StoreError::KeyTooLarge {
            table,
            key: key.to_string(),
            size: key.len(),
            max: budget.max_key_bytes,
        });
    }
    if payload.len() > budget.max_record_bytes {
        return Err(StoreError::RecordTooLarge {
            table,
            key: key.to_string(),
            size: payload.len(),
            max: budget.max_record_bytes,
        });
    }
    if !key_exists && current_len >= budget.max_entries {
        return Err(StoreError::StoreFull {
            table,
            max_entries: budget.max_entries,
        });
    }
    Ok(())
}
