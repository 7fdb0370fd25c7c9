//! SQLite-backed record store.
//!
//! # Responsibility
//! - Map one logical table onto rows of the shared `records` table.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - Every statement is scoped by `table_name`; tables never observe each
//!   other's keys.
//! - Construction rejects connections that have not been migrated.

use super::{
    check_budget, decode_record, encode_record, RecordStore, StoreError, StoreResult, TableBudget,
};
use crate::db::migrations::{current_user_version, latest_version};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

const RECORDS_TABLE: &str = "records";

/// One logical record table stored in a borrowed SQLite connection.
pub struct SqliteRecordStore<'conn, V> {
    conn: &'conn Connection,
    table: &'static str,
    budget: TableBudget,
    _record: PhantomData<fn() -> V>,
}

impl<'conn, V> SqliteRecordStore<'conn, V> {
    /// Binds a logical table to a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` is behind.
    /// - `MissingRequiredTable` when the `records` table does not exist.
    pub fn try_new(
        conn: &'conn Connection,
        table: &'static str,
        budget: TableBudget,
    ) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version < expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [RECORDS_TABLE],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::MissingRequiredTable(RECORDS_TABLE));
        }

        Ok(Self {
            conn,
            table,
            budget,
            _record: PhantomData,
        })
    }

    fn count(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE table_name = ?1;",
            [self.table],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM records WHERE table_name = ?1 AND record_key = ?2
            );",
            params![self.table, key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn check_payload(&self, key: &str, payload: &str) -> StoreResult<()> {
        check_budget(
            self.table,
            &self.budget,
            key,
            payload,
            self.exists(key)?,
            self.count()?,
        )
    }
}

impl<V> RecordStore<V> for SqliteRecordStore<'_, V>
where
    V: Serialize + DeserializeOwned,
{
    fn table(&self) -> &'static str {
        self.table
    }

    fn budget(&self) -> TableBudget {
        self.budget
    }

    fn get(&self, key: &str) -> StoreResult<Option<V>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM records WHERE table_name = ?1 AND record_key = ?2;",
                params![self.table, key],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|payload| decode_record(self.table, &payload))
            .transpose()
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        self.exists(key)
    }

    fn check_put(&self, key: &str, value: &V) -> StoreResult<()> {
        let payload = encode_record(self.table, value)?;
        self.check_payload(key, &payload)
    }

    fn put(&mut self, key: &str, value: &V) -> StoreResult<()> {
        let payload = encode_record(self.table, value)?;
        self.check_payload(key, &payload)?;
        self.conn.execute(
            "INSERT INTO records (table_name, record_key, payload)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (table_name, record_key) DO UPDATE SET payload = excluded.payload;",
            params![self.table, key, payload],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM records WHERE table_name = ?1 AND record_key = ?2;",
            params![self.table, key],
        )?;
        Ok(changed > 0)
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM records
             WHERE table_name = ?1
             ORDER BY record_key ASC;",
        )?;
        let mut rows = stmt.query([self.table])?;
        let mut values = Vec::new();

        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            values.push(decode_record(self.table, &payload)?);
        }

        Ok(values)
    }

    fn len(&self) -> StoreResult<u64> {
        self.count()
    }
}
