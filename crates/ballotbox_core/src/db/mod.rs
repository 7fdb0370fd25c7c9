//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections backing the record tables.
//! - Apply schema migrations in deterministic order.
//! - Provide a single commit point for multi-table operations.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Record stores must not read/write data before migrations succeed.

use log::{debug, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Runs `op` inside one SQLite transaction on `conn`.
///
/// Commits when `op` returns `Ok`, rolls back otherwise. Record stores that
/// borrow the same connection participate in the transaction, so a whole
/// service operation becomes one commit point.
///
/// # Errors
/// - Returns `op`'s error unchanged after rollback.
/// - Returns a converted `DbError` when begin/commit fails.
pub fn with_transaction<T, E, F>(conn: &Connection, op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<DbError>,
{
    let tx = conn
        .unchecked_transaction()
        .map_err(|err| E::from(DbError::from(err)))?;

    match op() {
        Ok(value) => {
            tx.commit().map_err(|err| E::from(DbError::from(err)))?;
            debug!("event=db_tx module=db status=committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!("event=db_tx module=db status=error error_code=rollback_failed error={rollback_err}");
            } else {
                debug!("event=db_tx module=db status=rolled_back");
            }
            Err(err)
        }
    }
}
