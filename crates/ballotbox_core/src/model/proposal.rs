//! Proposal record and its vote tally.

use super::vote::Vote;
use super::{ProposalId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Motion authored by one user and voted on by any user.
///
/// # Invariants
/// - `votes.len() == no_of_votes as usize`.
/// - `user_id` is immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub created_at: Timestamp,
    /// Monotonic counter of votes recorded on this proposal.
    pub no_of_votes: u32,
    /// Copies of every vote cast on this proposal, oldest first.
    pub votes: Vec<Vote>,
}

/// Aggregate outcome computed from a proposal's votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub in_favor: u32,
    pub against: u32,
}

impl VoteTally {
    pub fn total(&self) -> u32 {
        self.in_favor + self.against
    }

    /// Strict majority in favor. Ties are not accepted.
    pub fn is_accepted(&self) -> bool {
        self.in_favor > self.against
    }
}

impl Proposal {
    /// Creates a proposal with zero votes.
    pub fn new(
        id: ProposalId,
        user_id: UserId,
        name: impl Into<String>,
        description: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            description: description.into(),
            created_at,
            no_of_votes: 0,
            votes: Vec::new(),
        }
    }

    /// Appends a vote and bumps the counter.
    pub fn record_vote(&mut self, vote: Vote) {
        self.votes.push(vote);
        self.no_of_votes = self.no_of_votes.saturating_add(1);
    }

    /// Keeps only votes accepted by `keep` and resyncs the counter.
    ///
    /// Returns how many votes were removed.
    pub fn retain_votes<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&Vote) -> bool,
    {
        let before = self.votes.len();
        self.votes.retain(keep);
        let removed = before - self.votes.len();
        self.no_of_votes = u32::try_from(self.votes.len()).unwrap_or(u32::MAX);
        removed
    }

    pub fn has_vote_from(&self, voter_id: &str) -> bool {
        self.votes.iter().any(|vote| vote.voter_id == voter_id)
    }

    pub fn tally(&self) -> VoteTally {
        self.votes
            .iter()
            .fold(VoteTally::default(), |mut tally, vote| {
                if vote.vote_type {
                    tally.in_favor += 1;
                } else {
                    tally.against += 1;
                }
                tally
            })
    }
}

#[cfg(test)]
mod tests {
    use super::Proposal;
    use crate::model::vote::Vote;

    fn vote(id: &str, voter: &str, vote_type: bool) -> Vote {
        Vote {
            id: id.to_string(),
            voter_id: voter.to_string(),
            proposal_id: "p".to_string(),
            vote_type,
            created_at: 1,
        }
    }

    #[test]
    fn record_vote_keeps_counter_in_sync() {
        let mut proposal = Proposal::new("p".into(), "u".into(), "n", "d", 0);
        proposal.record_vote(vote("v1", "a", true));
        proposal.record_vote(vote("v2", "a", false));
        proposal.record_vote(vote("v3", "b", true));

        assert_eq!(proposal.no_of_votes, 3);
        let tally = proposal.tally();
        assert_eq!(tally.in_favor, 2);
        assert_eq!(tally.against, 1);
        assert_eq!(tally.total(), 3);
        assert!(tally.is_accepted());
    }

    #[test]
    fn retain_votes_recounts() {
        let mut proposal = Proposal::new("p".into(), "u".into(), "n", "d", 0);
        proposal.record_vote(vote("v1", "a", true));
        proposal.record_vote(vote("v2", "b", false));

        let removed = proposal.retain_votes(|v| v.voter_id != "a");
        assert_eq!(removed, 1);
        assert_eq!(proposal.no_of_votes, 1);
        assert!(!proposal.has_vote_from("a"));
        assert!(!proposal.tally().is_accepted());
    }
}
