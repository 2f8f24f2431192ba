//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! The sample stream describes one garrison's bad afternoon:
//! - a crewman climbs into a parked vehicle
//! - a rifleman from the fixture group is killed
//! - the vehicle is destroyed, and the destruction is reported twice
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // garrison-model = { path = "../garrison-model", features = ["test-fixtures"] }
//!
//! use garrison_model::fixtures;
//!
//! let events = fixtures::sample_events();
//! let vehicle = fixtures::vehicle();
//! ```

use uuid::Uuid;

use crate::{GroupId, LifecycleEvent, Unit, UnitId, UnitKind};

const VEHICLE_ID: &str = "5b0c2f0e-8a51-4c3e-9d0e-0f6f7b3a2c11";
const CREWMAN_ID: &str = "9e4d7a62-13f8-4b0b-a6c5-2d1e8f90ab22";
const RIFLEMAN_ID: &str = "c3a1e9b4-7d25-4f6a-8b90-4e2f1d6c5a33";
const GROUP_ID: &str = "e7f2b8c1-0a64-4d9e-b3f5-6a7c8d9e0f44";

fn fixed(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap_or_else(|e| panic!("bad fixture id {}: {}", id, e))
}

/// Returns the sample lifecycle events, in stream order.
pub fn sample_events() -> Vec<LifecycleEvent> {
    let jsonl = include_str!("../tests/fixtures/sample_lifecycle.jsonl");
    LifecycleEvent::parse_stream(jsonl)
        .unwrap_or_else(|e| panic!("Failed to parse sample_lifecycle.jsonl: {}", e))
}

/// The ungrouped vehicle referenced by the sample events.
pub fn vehicle() -> Unit {
    Unit::with_id(UnitId(fixed(VEHICLE_ID)), UnitKind::Vehicle)
}

/// The ungrouped crewman that enters the vehicle.
pub fn crewman() -> Unit {
    Unit::with_id(UnitId(fixed(CREWMAN_ID)), UnitKind::Infantry)
}

/// The rifleman, before being added to the fixture group.
pub fn rifleman() -> Unit {
    Unit::with_id(UnitId(fixed(RIFLEMAN_ID)), UnitKind::Infantry)
}

/// Id of the group the rifleman belongs to in the sample events.
pub fn group_id() -> GroupId {
    GroupId(fixed(GROUP_ID))
}
