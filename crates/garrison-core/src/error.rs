//! Error types for garrison operations.
//!
//! Every mutating operation validates before it mutates, so an error always
//! leaves collection membership exactly as it was.

use std::fmt;

use garrison_model::{AgentId, GarrisonId, GroupId, InvalidSideError, UnitId};
use thiserror::Error;

use crate::mailbox::MailboxError;

/// Something that can be a member of an agent's collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    Unit(UnitId),
    Group(GroupId),
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Unit(id) => write!(f, "unit {}", id),
            Member::Group(id) => write!(f, "group {}", id),
        }
    }
}

/// Errors returned by garrison, group and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GarrisonError {
    #[error(transparent)]
    InvalidSide(#[from] InvalidSideError),

    /// A grouped unit was handed to an operation that only takes ungrouped units
    #[error("unit {unit} already belongs to group {group}")]
    AlreadyGrouped { unit: UnitId, group: GroupId },

    #[error("{member} is not a member of {owner}")]
    NotMember { member: Member, owner: AgentId },

    #[error("agent {0} is already owned here")]
    DuplicateAgent(AgentId),

    #[error("garrison {0} is not registered")]
    UnknownGarrison(GarrisonId),

    /// No registered garrison owns the group
    #[error("group {0} is not owned by any registered garrison")]
    UnknownGroup(GroupId),

    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

impl GarrisonError {
    pub fn unit_not_member(unit: UnitId, owner: impl Into<AgentId>) -> Self {
        GarrisonError::NotMember {
            member: Member::Unit(unit),
            owner: owner.into(),
        }
    }

    pub fn group_not_member(group: GroupId, owner: impl Into<AgentId>) -> Self {
        GarrisonError::NotMember {
            member: Member::Group(group),
            owner: owner.into(),
        }
    }

    /// Returns true for membership misses, which callers usually log and move on from.
    pub fn is_not_member(&self) -> bool {
        matches!(self, GarrisonError::NotMember { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_member_message() {
        let unit = UnitId::new();
        let garrison = GarrisonId::new();
        let err = GarrisonError::unit_not_member(unit, garrison);
        assert!(err.is_not_member());
        assert_eq!(
            err.to_string(),
            format!("unit {} is not a member of garrison:{}", unit, garrison)
        );
    }

    #[test]
    fn test_invalid_side_converts() {
        let err: GarrisonError = "purple".parse::<garrison_model::Side>().unwrap_err().into();
        assert!(matches!(err, GarrisonError::InvalidSide(_)));
        assert_eq!(err.to_string(), "unrecognized side 'purple'");
    }
}
