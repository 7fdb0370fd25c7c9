//! Runtime configuration for tables and integrity policies.
//!
//! # Responsibility
//! - Hold per-table capacity budgets.
//! - Select cascade and vote policies for the integrity service.
//! - Overlay defaults with `BALLOTBOX_*` environment variables.
//!
//! # Invariants
//! - `Default` reproduces the compatible behavior: repeat votes allowed,
//!   user deletion leaves the user's votes in place.

use crate::store::TableBudget;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ENV_MAX_ENTRIES: &str = "BALLOTBOX_MAX_ENTRIES";
pub const ENV_MAX_RECORD_BYTES: &str = "BALLOTBOX_MAX_RECORD_BYTES";
pub const ENV_CASCADE: &str = "BALLOTBOX_CASCADE";
pub const ENV_VOTE_POLICY: &str = "BALLOTBOX_VOTE_POLICY";

/// What deleting a user or proposal removes besides the record itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CascadePolicy {
    /// User delete removes owned proposals only. Proposal delete removes
    /// the owner back-reference only. Vote rows stay.
    #[default]
    Compatible,
    /// Additionally purges votes cast by a deleted user and votes cast on a
    /// deleted proposal, from every table and denormalized list.
    Strict,
}

/// Whether a user may vote more than once on the same proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VotePolicy {
    #[default]
    AllowRepeat,
    OnePerUser,
}

/// Capacity budgets, one per entity table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub users: TableBudget,
    pub proposals: TableBudget,
    pub votes: TableBudget,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    pub cascade: CascadePolicy,
    pub vote_policy: VotePolicy,
}

/// Top-level configuration consumed by entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BallotConfig {
    pub store: StoreConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid value `{}` for {}; expected {}",
            self.value, self.variable, self.expected
        )
    }
}

impl Error for ConfigError {}

impl BallotConfig {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values returned by `lookup`.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = read(ENV_MAX_ENTRIES) {
            let max_entries = parse_positive(ENV_MAX_ENTRIES, &value)?;
            config.store.for_each_budget(|budget| budget.max_entries = max_entries);
        }
        if let Some(value) = read(ENV_MAX_RECORD_BYTES) {
            let max_bytes = parse_positive(ENV_MAX_RECORD_BYTES, &value)?;
            let max_bytes = usize::try_from(max_bytes).map_err(|_| ConfigError {
                variable: ENV_MAX_RECORD_BYTES,
                value: value.clone(),
                expected: "a byte count addressable on this platform",
            })?;
            config
                .store
                .for_each_budget(|budget| budget.max_record_bytes = max_bytes);
        }
        if let Some(value) = read(ENV_CASCADE) {
            config.service.cascade = match value.to_ascii_lowercase().as_str() {
                "compatible" => CascadePolicy::Compatible,
                "strict" => CascadePolicy::Strict,
                _ => {
                    return Err(ConfigError {
                        variable: ENV_CASCADE,
                        value,
                        expected: "compatible|strict",
                    })
                }
            };
        }
        if let Some(value) = read(ENV_VOTE_POLICY) {
            config.service.vote_policy = match value.to_ascii_lowercase().as_str() {
                "allow_repeat" => VotePolicy::AllowRepeat,
                "one_per_user" => VotePolicy::OnePerUser,
                _ => {
                    return Err(ConfigError {
                        variable: ENV_VOTE_POLICY,
                        value,
                        expected: "allow_repeat|one_per_user",
                    })
                }
            };
        }

        Ok(config)
    }
}

impl StoreConfig {
    fn for_each_budget<F>(&mut self, mut apply: F)
    where
        F: FnMut(&mut TableBudget),
    {
        apply(&mut self.users);
        apply(&mut self.proposals);
        apply(&mut self.votes);
    }
}

fn parse_positive(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError {
            variable,
            value: value.to_string(),
            expected: "a positive integer",
        }),
    }
}
