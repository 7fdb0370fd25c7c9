//! Integrity service for users, proposals and votes.
//!
//! # Responsibility
//! - Compose reads/writes across the three entity tables into use-case
//!   operations (create, delete, vote, read).
//! - Maintain back-references (`proposal_ids`, denormalized `votes`) and the
//!   per-proposal vote counter.
//!
//! # Invariants
//! - Usernames are unique among live users.
//! - A user's `proposal_ids` equals the set of proposals owned by that user.
//! - `proposal.votes.len() == proposal.no_of_votes`.
//! - Every mutation checks all of its writes against table budgets before
//!   the first write, then writes subordinate records first.
//! - Cascade sub-steps tolerate records that are already absent.

use crate::clock::{Clock, SystemClock};
use crate::config::{CascadePolicy, ServiceConfig, VotePolicy};
use crate::db::DbError;
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::model::proposal::{Proposal, VoteTally};
use crate::model::user::{validate_username, User};
use crate::model::vote::Vote;
use crate::model::{require_non_empty, ProposalId, UserId, ValidationError, VoteId};
use crate::store::{RecordStore, StoreError, Tables};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_ID_ATTEMPTS: usize = 3;

pub type VotingResult<T> = Result<T, VotingError>;

/// Stable error taxonomy preserved across transport boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    DuplicateUsername,
    DuplicateVote,
    NotFound,
    StoreFull,
    RecordTooLarge,
    InconsistentState,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::DuplicateUsername => "DuplicateUsername",
            Self::DuplicateVote => "DuplicateVote",
            Self::NotFound => "NotFound",
            Self::StoreFull => "StoreFull",
            Self::RecordTooLarge => "RecordTooLarge",
            Self::InconsistentState => "InconsistentState",
            Self::Storage => "Storage",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service error for voting use-cases.
#[derive(Debug)]
pub enum VotingError {
    /// Malformed, empty or out-of-range argument.
    InvalidInput(String),
    DuplicateUsername(String),
    /// Voter already voted on this proposal under `VotePolicy::OnePerUser`.
    DuplicateVote {
        proposal_id: ProposalId,
        voter_id: UserId,
    },
    UserNotFound(UserId),
    ProposalNotFound(ProposalId),
    VoteNotFound(VoteId),
    /// Proposal references an owner that no longer exists.
    OwnerNotFound {
        proposal_id: ProposalId,
        user_id: UserId,
    },
    InconsistentState(String),
    Store(StoreError),
}

impl VotingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::DuplicateUsername(_) => ErrorKind::DuplicateUsername,
            Self::DuplicateVote { .. } => ErrorKind::DuplicateVote,
            Self::UserNotFound(_) | Self::ProposalNotFound(_) | Self::VoteNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::OwnerNotFound { .. } | Self::InconsistentState(_) => {
                ErrorKind::InconsistentState
            }
            Self::Store(StoreError::StoreFull { .. }) => ErrorKind::StoreFull,
            Self::Store(StoreError::RecordTooLarge { .. }) => ErrorKind::RecordTooLarge,
            Self::Store(StoreError::KeyTooLarge { .. }) => ErrorKind::InvalidInput,
            Self::Store(_) => ErrorKind::Storage,
        }
    }
}

impl Display for VotingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(details) => write!(f, "invalid input: {details}"),
            Self::DuplicateUsername(username) => {
                write!(f, "username already exists: `{username}`")
            }
            Self::DuplicateVote {
                proposal_id,
                voter_id,
            } => write!(
                f,
                "user {voter_id} already voted on proposal {proposal_id}"
            ),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::ProposalNotFound(id) => write!(f, "proposal not found: {id}"),
            Self::VoteNotFound(id) => write!(f, "vote not found: {id}"),
            Self::OwnerNotFound {
                proposal_id,
                user_id,
            } => write!(
                f,
                "owner {user_id} of proposal {proposal_id} does not exist"
            ),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VotingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for VotingError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DbError> for VotingError {
    fn from(value: DbError) -> Self {
        Self::Store(StoreError::Db(value))
    }
}

impl From<ValidationError> for VotingError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

/// Use-case facade over injected entity tables.
///
/// Mutations take `&mut self`; one operation runs to completion before the
/// next starts.
pub struct VotingService<U, P, V> {
    tables: Tables<U, P, V>,
    config: ServiceConfig,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
}

impl<U, P, V> VotingService<U, P, V>
where
    U: RecordStore<User>,
    P: RecordStore<Proposal>,
    V: RecordStore<Vote>,
{
    /// Creates a service with default policies, UUID ids and the system clock.
    pub fn new(tables: Tables<U, P, V>) -> Self {
        Self::with_config(tables, ServiceConfig::default())
    }

    pub fn with_config(tables: Tables<U, P, V>, config: ServiceConfig) -> Self {
        Self {
            tables,
            config,
            ids: Box::new(UuidIdGenerator),
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the id source.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Replaces the timestamp source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn into_tables(self) -> Tables<U, P, V> {
        self.tables
    }

    /// Registers a new user with a unique username.
    ///
    /// # Errors
    /// - `InvalidInput` when the username is not 2-20 characters.
    /// - `DuplicateUsername` when any live user has the same username.
    pub fn create_user(&mut self, username: &str) -> VotingResult<User> {
        self.create_user_inner(username)
            .inspect_err(|err| log_failure("user_create", err))
    }

    fn create_user_inner(&mut self, username: &str) -> VotingResult<User> {
        validate_username(username)?;

        let taken = self
            .tables
            .users
            .values()?
            .iter()
            .any(|user| user.username == username);
        if taken {
            return Err(VotingError::DuplicateUsername(username.to_string()));
        }

        let id = allocate_id::<User, _>(self.ids.as_mut(), &self.tables.users)?;
        let user = User::new(id, username, self.clock.now());
        self.tables.users.put(&user.id, &user)?;

        info!(
            "event=user_create module=service status=ok user_id={}",
            user.id
        );
        Ok(user)
    }

    /// Deletes a user and the proposals they own.
    ///
    /// Returns the user as it was before deletion. Under
    /// `CascadePolicy::Strict` the user's votes, and all votes on their
    /// proposals, are purged as well.
    pub fn delete_user(&mut self, id: &str) -> VotingResult<User> {
        self.delete_user_inner(id)
            .inspect_err(|err| log_failure("user_delete", err))
    }

    fn delete_user_inner(&mut self, id: &str) -> VotingResult<User> {
        require_non_empty("id", id)?;
        let user = self
            .tables
            .users
            .get(id)?
            .ok_or_else(|| VotingError::UserNotFound(id.to_string()))?;

        let mut purged_votes = 0usize;
        if self.config.cascade == CascadePolicy::Strict {
            purged_votes = self.purge_votes_of_user(&user)?;
        }

        let mut removed_proposals = 0usize;
        for proposal_id in &user.proposal_ids {
            if self.tables.proposals.delete(proposal_id)? {
                removed_proposals += 1;
            } else {
                warn!(
                    "event=user_delete module=service status=skipped reason=already_absent proposal_id={proposal_id}"
                );
            }
        }

        if !self.tables.users.delete(&user.id)? {
            return Err(VotingError::InconsistentState(format!(
                "user {} vanished during delete",
                user.id
            )));
        }

        info!(
            "event=user_delete module=service status=ok user_id={} proposals_removed={} votes_purged={}",
            user.id, removed_proposals, purged_votes
        );
        Ok(user)
    }

    /// Creates a proposal owned by `user_id` with zero votes.
    ///
    /// # Errors
    /// - `InvalidInput` when any argument is empty.
    /// - `UserNotFound` when `user_id` does not resolve; nothing is written.
    pub fn create_proposal(
        &mut self,
        name: &str,
        description: &str,
        user_id: &str,
    ) -> VotingResult<Proposal> {
        self.create_proposal_inner(name, description, user_id)
            .inspect_err(|err| log_failure("proposal_create", err))
    }

    fn create_proposal_inner(
        &mut self,
        name: &str,
        description: &str,
        user_id: &str,
    ) -> VotingResult<Proposal> {
        require_non_empty("name", name)?;
        require_non_empty("description", description)?;
        require_non_empty("user_id", user_id)?;

        let mut owner = self
            .tables
            .users
            .get(user_id)?
            .ok_or_else(|| VotingError::UserNotFound(user_id.to_string()))?;

        let id = allocate_id::<Proposal, _>(self.ids.as_mut(), &self.tables.proposals)?;
        let proposal = Proposal::new(id, owner.id.clone(), name, description, self.clock.now());
        owner.proposal_ids.push(proposal.id.clone());

        self.tables.proposals.check_put(&proposal.id, &proposal)?;
        self.tables.users.check_put(&owner.id, &owner)?;

        self.tables.proposals.put(&proposal.id, &proposal)?;
        self.tables.users.put(&owner.id, &owner)?;

        info!(
            "event=proposal_create module=service status=ok proposal_id={} user_id={}",
            proposal.id, owner.id
        );
        Ok(proposal)
    }

    /// Deletes a proposal and its owner back-reference.
    ///
    /// # Errors
    /// - `ProposalNotFound` when `id` does not resolve.
    /// - `OwnerNotFound` when the owning user is gone; nothing is written.
    pub fn delete_proposal(&mut self, id: &str) -> VotingResult<Proposal> {
        self.delete_proposal_inner(id)
            .inspect_err(|err| log_failure("proposal_delete", err))
    }

    fn delete_proposal_inner(&mut self, id: &str) -> VotingResult<Proposal> {
        require_non_empty("id", id)?;
        let proposal = self
            .tables
            .proposals
            .get(id)?
            .ok_or_else(|| VotingError::ProposalNotFound(id.to_string()))?;

        let mut owner = self.tables.users.get(&proposal.user_id)?.ok_or_else(|| {
            VotingError::OwnerNotFound {
                proposal_id: proposal.id.clone(),
                user_id: proposal.user_id.clone(),
            }
        })?;
        owner.proposal_ids.retain(|owned| owned != &proposal.id);

        let mut touched_users = BTreeMap::new();
        let mut vote_rows = Vec::new();
        if self.config.cascade == CascadePolicy::Strict {
            vote_rows = self
                .tables
                .votes
                .values()?
                .into_iter()
                .filter(|vote| vote.proposal_id == proposal.id)
                .map(|vote| vote.id)
                .collect();
            for voter_id in voters_of(&proposal) {
                if voter_id == owner.id {
                    continue;
                }
                match self.tables.users.get(&voter_id)? {
                    Some(mut voter) => {
                        voter.votes.retain(|vote| vote.proposal_id != proposal.id);
                        touched_users.insert(voter.id.clone(), voter);
                    }
                    None => warn!(
                        "event=proposal_delete module=service status=skipped reason=already_absent user_id={voter_id}"
                    ),
                }
            }
            owner.votes.retain(|vote| vote.proposal_id != proposal.id);
        }
        touched_users.insert(owner.id.clone(), owner);

        for user in touched_users.values() {
            self.tables.users.check_put(&user.id, user)?;
        }

        for vote_id in &vote_rows {
            self.tables.votes.delete(vote_id)?;
        }
        for user in touched_users.values() {
            self.tables.users.put(&user.id, user)?;
        }
        self.tables.proposals.delete(&proposal.id)?;

        info!(
            "event=proposal_delete module=service status=ok proposal_id={} user_id={} votes_purged={}",
            proposal.id,
            proposal.user_id,
            vote_rows.len()
        );
        Ok(proposal)
    }

    /// Records one vote and returns the updated proposal.
    ///
    /// The vote is appended to the votes table and to both denormalized
    /// lists, and the proposal counter is incremented. Repeat votes are
    /// accepted unless `VotePolicy::OnePerUser` is configured.
    ///
    /// # Errors
    /// - `ProposalNotFound` / `UserNotFound` for the missing side.
    /// - `RecordTooLarge` / `StoreFull` when any write would exceed its
    ///   table budget; no table is modified in that case.
    pub fn vote(
        &mut self,
        proposal_id: &str,
        voter_id: &str,
        vote_type: bool,
    ) -> VotingResult<Proposal> {
        self.vote_inner(proposal_id, voter_id, vote_type)
            .inspect_err(|err| log_failure("vote_cast", err))
    }

    fn vote_inner(
        &mut self,
        proposal_id: &str,
        voter_id: &str,
        vote_type: bool,
    ) -> VotingResult<Proposal> {
        require_non_empty("proposal_id", proposal_id)?;
        require_non_empty("voter_id", voter_id)?;

        let mut proposal = self
            .tables
            .proposals
            .get(proposal_id)?
            .ok_or_else(|| VotingError::ProposalNotFound(proposal_id.to_string()))?;
        let mut voter = self
            .tables
            .users
            .get(voter_id)?
            .ok_or_else(|| VotingError::UserNotFound(voter_id.to_string()))?;

        if self.config.vote_policy == VotePolicy::OnePerUser && proposal.has_vote_from(&voter.id) {
            return Err(VotingError::DuplicateVote {
                proposal_id: proposal.id,
                voter_id: voter.id,
            });
        }

        let vote = Vote {
            id: allocate_id::<Vote, _>(self.ids.as_mut(), &self.tables.votes)?,
            voter_id: voter.id.clone(),
            proposal_id: proposal.id.clone(),
            vote_type,
            created_at: self.clock.now(),
        };
        proposal.record_vote(vote.clone());
        voter.votes.push(vote.clone());

        self.tables.votes.check_put(&vote.id, &vote)?;
        self.tables.proposals.check_put(&proposal.id, &proposal)?;
        self.tables.users.check_put(&voter.id, &voter)?;

        self.tables.votes.put(&vote.id, &vote)?;
        self.tables.proposals.put(&proposal.id, &proposal)?;
        self.tables.users.put(&voter.id, &voter)?;

        info!(
            "event=vote_cast module=service status=ok vote_id={} proposal_id={} user_id={} no_of_votes={}",
            vote.id, proposal.id, voter.id, proposal.no_of_votes
        );
        Ok(proposal)
    }

    pub fn list_users(&self) -> VotingResult<Vec<User>> {
        Ok(self.tables.users.values()?)
    }

    pub fn list_proposals(&self) -> VotingResult<Vec<Proposal>> {
        Ok(self.tables.proposals.values()?)
    }

    pub fn list_votes(&self) -> VotingResult<Vec<Vote>> {
        Ok(self.tables.votes.values()?)
    }

    pub fn get_user(&self, id: &str) -> VotingResult<User> {
        require_non_empty("id", id)?;
        self.tables
            .users
            .get(id)?
            .ok_or_else(|| VotingError::UserNotFound(id.to_string()))
    }

    pub fn get_proposal(&self, id: &str) -> VotingResult<Proposal> {
        require_non_empty("id", id)?;
        self.tables
            .proposals
            .get(id)?
            .ok_or_else(|| VotingError::ProposalNotFound(id.to_string()))
    }

    /// Alias of `get_proposal` kept for detail-view callers.
    pub fn view_proposal_details(&self, id: &str) -> VotingResult<Proposal> {
        self.get_proposal(id)
    }

    pub fn get_vote(&self, id: &str) -> VotingResult<Vote> {
        require_non_empty("id", id)?;
        self.tables
            .votes
            .get(id)?
            .ok_or_else(|| VotingError::VoteNotFound(id.to_string()))
    }

    /// Current for/against counts of one proposal.
    pub fn proposal_tally(&self, id: &str) -> VotingResult<VoteTally> {
        Ok(self.get_proposal(id)?.tally())
    }

    /// Removes every trace of votes cast by `user`, plus every vote cast on
    /// proposals `user` owns. Returns the number of vote rows deleted.
    fn purge_votes_of_user(&mut self, user: &User) -> VotingResult<usize> {
        let owned: BTreeSet<&str> = user.proposal_ids.iter().map(String::as_str).collect();
        let doomed = |vote: &Vote| vote.voter_id == user.id || owned.contains(vote.proposal_id.as_str());

        let vote_rows: Vec<VoteId> = self
            .tables
            .votes
            .values()?
            .into_iter()
            .filter(|vote| doomed(vote))
            .map(|vote| vote.id)
            .collect();

        let mut proposals = Vec::new();
        for mut proposal in self.tables.proposals.values()? {
            if owned.contains(proposal.id.as_str()) {
                continue;
            }
            if proposal.retain_votes(|vote| vote.voter_id != user.id) > 0 {
                proposals.push(proposal);
            }
        }

        let mut users = Vec::new();
        for mut other in self.tables.users.values()? {
            if other.id == user.id {
                continue;
            }
            let before = other.votes.len();
            other
                .votes
                .retain(|vote| !owned.contains(vote.proposal_id.as_str()));
            if other.votes.len() != before {
                users.push(other);
            }
        }

        for proposal in &proposals {
            self.tables.proposals.check_put(&proposal.id, proposal)?;
        }
        for other in &users {
            self.tables.users.check_put(&other.id, other)?;
        }

        for vote_id in &vote_rows {
            self.tables.votes.delete(vote_id)?;
        }
        for proposal in &proposals {
            self.tables.proposals.put(&proposal.id, proposal)?;
        }
        for other in &users {
            self.tables.users.put(&other.id, other)?;
        }

        Ok(vote_rows.len())
    }
}

/// Distinct voter ids in first-vote order.
fn voters_of(proposal: &Proposal) -> Vec<UserId> {
    let mut seen = BTreeSet::new();
    proposal
        .votes
        .iter()
        .filter(|vote| seen.insert(vote.voter_id.as_str()))
        .map(|vote| vote.voter_id.clone())
        .collect()
}

/// Draws ids until one is free in `store`.
fn allocate_id<T, S>(ids: &mut dyn IdGenerator, store: &S) -> VotingResult<String>
where
    S: RecordStore<T>,
{
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = ids.next_id();
        if !store.contains_key(&id)? {
            return Ok(id);
        }
        warn!(
            "event=id_allocate module=service status=retry table={} reason=collision",
            store.table()
        );
    }
    Err(VotingError::InconsistentState(format!(
        "could not allocate a free id in table `{}` after {MAX_ID_ATTEMPTS} attempts",
        store.table()
    )))
}

fn log_failure(event: &'static str, err: &VotingError) {
    warn!(
        "event={event} module=service status=error error_kind={}",
        err.kind()
    );
}
