//! Bundle of the three entity tables owned by the integrity service.

use super::{
    MemoryRecordStore, SqliteRecordStore, StoreResult, PROPOSALS_TABLE, USERS_TABLE, VOTES_TABLE,
};
use crate::config::StoreConfig;
use crate::model::proposal::Proposal;
use crate::model::user::User;
use crate::model::vote::Vote;
use rusqlite::Connection;

/// One store per entity type. Constructed by the caller and injected.
#[derive(Debug)]
pub struct Tables<U, P, V> {
    pub users: U,
    pub proposals: P,
    pub votes: V,
}

pub type MemoryTables =
    Tables<MemoryRecordStore<User>, MemoryRecordStore<Proposal>, MemoryRecordStore<Vote>>;

pub type SqliteTables<'conn> = Tables<
    SqliteRecordStore<'conn, User>,
    SqliteRecordStore<'conn, Proposal>,
    SqliteRecordStore<'conn, Vote>,
>;

impl MemoryTables {
    /// Fresh, empty in-memory tables.
    pub fn in_memory(config: &StoreConfig) -> Self {
        Self {
            users: MemoryRecordStore::new(USERS_TABLE, config.users),
            proposals: MemoryRecordStore::new(PROPOSALS_TABLE, config.proposals),
            votes: MemoryRecordStore::new(VOTES_TABLE, config.votes),
        }
    }
}

impl<'conn> SqliteTables<'conn> {
    /// Binds the three logical tables to one migrated connection.
    pub fn sqlite(conn: &'conn Connection, config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self {
            users: SqliteRecordStore::try_new(conn, USERS_TABLE, config.users)?,
            proposals: SqliteRecordStore::try_new(conn, PROPOSALS_TABLE, config.proposals)?,
            votes: SqliteRecordStore::try_new(conn, VOTES_TABLE, config.votes)?,
        })
    }
}
