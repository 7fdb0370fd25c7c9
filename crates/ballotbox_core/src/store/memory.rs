//! In-memory record store backed by a `BTreeMap`.
//!
//! Records are kept in their serialized form so budget checks and decode
//! behavior match the SQLite backend.

use super::{check_budget, decode_record, encode_record, RecordStore, StoreResult, TableBudget};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Ephemeral record table. Contents are lost on drop.
#[derive(Debug)]
pub struct MemoryRecordStore<V> {
    table: &'static str,
    budget: TableBudget,
    entries: BTreeMap<String, String>,
    _record: PhantomData<fn() -> V>,
}

impl<V> MemoryRecordStore<V> {
    pub fn new(table: &'static str, budget: TableBudget) -> Self {
        Self {
            table,
            budget,
            entries: BTreeMap::new(),
            _record: PhantomData,
        }
    }
}

impl<V> RecordStore<V> for MemoryRecordStore<V>
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
        self.entries
            .get(key)
            .map(|payload| decode_record(self.table, payload))
            .transpose()
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn check_put(&self, key: &str, value: &V) -> StoreResult<()> {
        let payload = encode_record(self.table, value)?;
        check_budget(
            self.table,
            &self.budget,
            key,
            &payload,
            self.entries.contains_key(key),
            self.entries.len() as u64,
        )
    }

    fn put(&mut self, key: &str, value: &V) -> StoreResult<()> {
        let payload = encode_record(self.table, value)?;
        check_budget(
            self.table,
            &self.budget,
            key,
            &payload,
            self.entries.contains_key(key),
            self.entries.len() as u64,
        )?;
        self.entries.insert(key.to_string(), payload);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn values(&self) -> StoreResult<Vec<V>> {
        self.entries
            .values()
            .map(|payload| decode_record(self.table, payload))
            .collect()
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.entries.len() as u64)
    }
}
