//! Group and unit tags.

use serde::{Deserialize, Serialize};

/// Grouping type tag, used for type-based group lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    /// No particular assignment
    #[default]
    Idle,
    /// Moves along a patrol route
    Patrol,
    /// Guards a building
    BuildingSentry,
    /// Infantry holding a fixed position
    Static,
    /// Crew of static weapons or parked vehicles
    VehicleStatic,
    /// Crew of vehicles that move
    VehicleNonStatic,
}

/// What kind of actor a unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    #[default]
    Infantry,
    Vehicle,
    Drone,
    Cargo,
}

impl UnitKind {
    /// Returns true if other units can enter this one.
    pub fn can_carry_crew(self) -> bool {
        matches!(self, UnitKind::Vehicle | UnitKind::Drone)
    }
}
