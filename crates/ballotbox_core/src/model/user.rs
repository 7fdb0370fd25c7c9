//! User record.

use super::vote::Vote;
use super::{ProposalId, Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};

pub const USERNAME_MIN_CHARS: usize = 2;
pub const USERNAME_MAX_CHARS: usize = 20;

/// Registered voter and proposal author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub created_at: Timestamp,
    /// Unique among live users.
    pub username: String,
    /// Proposals authored by this user, in creation order.
    pub proposal_ids: Vec<ProposalId>,
    /// Copies of every vote this user cast.
    pub votes: Vec<Vote>,
    /// Owned by the recordings subsystem; only dropped with the user.
    pub recording_ids: Vec<String>,
}

impl User {
    /// Creates a user with empty back-reference lists.
    pub fn new(id: UserId, username: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id,
            created_at,
            username: username.into(),
            proposal_ids: Vec::new(),
            votes: Vec::new(),
            recording_ids: Vec::new(),
        }
    }
}

/// Checks the username length budget, counted in chars.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let actual = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&actual) {
        return Err(ValidationError::UsernameLength {
            actual,
            min: USERNAME_MIN_CHARS,
            max: USERNAME_MAX_CHARS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_username, User};
    use crate::model::ValidationError;

    #[test]
    fn username_bounds_are_inclusive() {
        validate_username("ab").expect("2 chars should pass");
        validate_username(&"a".repeat(20)).expect("20 chars should pass");

        let err = validate_username(&"a".repeat(21)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UsernameLength {
                actual: 21,
                min: 2,
                max: 20
            }
        );
        assert!(validate_username("").is_err());
        assert!(validate_username("a").is_err());
    }

    #[test]
    fn username_length_counts_chars_not_bytes() {
        validate_username("éé").expect("two multibyte chars should pass");
    }

    #[test]
    fn new_user_starts_with_empty_lists() {
        let user = User::new("u-1".to_string(), "alice", 7);
        assert!(user.proposal_ids.is_empty());
        assert!(user.votes.is_empty());
        assert!(user.recording_ids.is_empty());
    }
}
