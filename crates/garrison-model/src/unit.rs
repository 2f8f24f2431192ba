//! Unit Record
//!
//! A unit is a leaf actor. It carries its identity and a back-reference to
//! the group it currently belongs to. The back-reference is a lookup key,
//! never ownership: the group owns the unit, not the other way round.

use serde::{Deserialize, Serialize};

use crate::{GroupId, UnitId, UnitKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,
    /// Group this unit is a member of, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
}

impl Unit {
    /// Spawn a new ungrouped unit with a fresh id.
    pub fn spawn(kind: UnitKind) -> Self {
        Self {
            id: UnitId::new(),
            kind,
            group: None,
        }
    }

    pub fn with_id(id: UnitId, kind: UnitKind) -> Self {
        Self {
            id,
            kind,
            group: None,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }

    pub fn is_vehicle(&self) -> bool {
        self.kind.can_carry_crew()
    }
}
