//! Vote record. Votes are append-only.

use super::{ProposalId, Timestamp, UserId, VoteId};
use serde::{Deserialize, Serialize};

/// One ballot cast by a user on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub voter_id: UserId,
    pub proposal_id: ProposalId,
    /// `true` votes in favor, `false` against.
    pub vote_type: bool,
    pub created_at: Timestamp,
}
