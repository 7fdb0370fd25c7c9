//! Core persistence layer for the ballotbox voting application.
//! This crate is the single source of truth for record integrity invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod ids;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BallotConfig, CascadePolicy, ConfigError, ServiceConfig, StoreConfig, VotePolicy};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::proposal::{Proposal, VoteTally};
pub use model::user::User;
pub use model::vote::Vote;
pub use model::{ProposalId, Timestamp, UserId, ValidationError, VoteId};
pub use service::voting_service::{ErrorKind, VotingError, VotingResult, VotingService};
pub use store::{
    MemoryRecordStore, MemoryTables, RecordStore, SqliteRecordStore, SqliteTables, StoreError,
    StoreResult, TableBudget, Tables,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
