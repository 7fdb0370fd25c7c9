//! Entity schemas for the voting record tables.
//!
//! # Responsibility
//! - Define the fixed-shape records stored in each entity table.
//! - Provide input validation shared by service operations.
//!
//! # Invariants
//! - Record ids are unique and immutable once assigned.
//! - `proposal_ids` and the denormalized `votes` lists are back-references
//!   maintained by the integrity service, never edited by callers.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod proposal;
pub mod user;
pub mod vote;

/// Stable identifier of a user record.
pub type UserId = String;
/// Stable identifier of a proposal record.
pub type ProposalId = String;
/// Stable identifier of a vote record.
pub type VoteId = String;

/// Creation timestamp in nanoseconds since the Unix epoch.
pub type Timestamp = u64;

/// Rejected caller input, raised before any table is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username length (in chars) is outside the accepted range.
    UsernameLength { actual: usize, min: usize, max: usize },
    /// A required text field is empty.
    EmptyField(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UsernameLength { actual, min, max } => write!(
                f,
                "username must be {min}-{max} characters, got {actual}"
            ),
            Self::EmptyField(field) => write!(f, "`{field}` must not be empty"),
        }
    }
}

impl Error for ValidationError {}

/// Rejects an empty required field.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}
