//! Identifier Types
//!
//! UUID newtypes for every addressable entity. Identifiers are plain values:
//! holding one never implies ownership of the entity it names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when an identifier cannot be parsed from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier '{input}'")]
pub struct ParseIdError {
    pub input: String,
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| ParseIdError {
                    input: s.to_string(),
                })
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a garrison.
    GarrisonId
);
uuid_id!(
    /// Unique identifier for a group.
    GroupId
);
uuid_id!(
    /// Unique identifier for a unit.
    UnitId
);
uuid_id!(
    /// Opaque handle naming a location owned by the world services.
    LocationId
);

/// Identity of a mailbox-owning agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AgentId {
    Garrison(GarrisonId),
    Group(GroupId),
}

impl AgentId {
    pub fn as_garrison(&self) -> Option<GarrisonId> {
        match self {
            AgentId::Garrison(id) => Some(*id),
            AgentId::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<GroupId> {
        match self {
            AgentId::Group(id) => Some(*id),
            AgentId::Garrison(_) => None,
        }
    }
}

impl From<GarrisonId> for AgentId {
    fn from(id: GarrisonId) -> Self {
        AgentId::Garrison(id)
    }
}

impl From<GroupId> for AgentId {
    fn from(id: GroupId) -> Self {
        AgentId::Group(id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentId::Garrison(id) => write!(f, "garrison:{}", id),
            AgentId::Group(id) => write!(f, "group:{}", id),
        }
    }
}
