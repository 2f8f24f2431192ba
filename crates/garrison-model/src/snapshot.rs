//! Garrison Snapshots
//!
//! Point-in-time views of a garrison and its groups. Group snapshots are
//! produced inside each group's own processing context and gathered by the
//! garrison, so a snapshot never reads another context's state directly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{GarrisonId, GroupId, GroupType, LocationId, Side, Unit, UnitId};

/// State of one group at the moment it answered the snapshot request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group_id: GroupId,
    pub side: Side,
    pub group_type: GroupType,
    /// Owning garrison, as recorded by the group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garrison: Option<GarrisonId>,
    #[serde(default)]
    pub units: Vec<Unit>,
}

/// State of a garrison together with its groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarrisonSnapshot {
    pub garrison_id: GarrisonId,
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationId>,
    /// Units held directly, outside any group
    #[serde(default)]
    pub units: Vec<Unit>,
    /// Vehicle id -> ids of units that entered it
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub crews: BTreeMap<UnitId, BTreeSet<UnitId>>,
    #[serde(default)]
    pub groups: Vec<GroupSnapshot>,
}

impl GarrisonSnapshot {
    /// Ids of every unit in the snapshot, direct and grouped, without duplicates.
    pub fn all_unit_ids(&self) -> BTreeSet<UnitId> {
        self.units
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.units.iter()))
            .map(|u| u.id)
            .collect()
    }

    pub fn group(&self, group_id: GroupId) -> Option<&GroupSnapshot> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
