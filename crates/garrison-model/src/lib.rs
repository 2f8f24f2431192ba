//! Shared vocabulary for the garrison agent engine.
//!
//! This crate contains pure data structures with no processing logic:
//! identifiers, affiliation tags, the unit record, lifecycle events and
//! snapshots. It is a dependency for every execution context that talks to
//! the engine.

pub mod event;
pub mod id;
pub mod kind;
pub mod side;
pub mod snapshot;
pub mod unit;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export identifier types
pub use id::{AgentId, GarrisonId, GroupId, LocationId, ParseIdError, UnitId};

// Re-export tag types
pub use kind::{GroupType, UnitKind};
pub use side::{InvalidSideError, Side};

// Re-export records, events and snapshots
pub use event::LifecycleEvent;
pub use snapshot::{GarrisonSnapshot, GroupSnapshot};
pub use unit::Unit;
