//! Lifecycle Events
//!
//! Notifications delivered by the host's event sources. The engine never
//! generates these; it only reacts to them. Events travel as JSONL, one
//! event per line.

use serde::{Deserialize, Serialize};

use crate::{Unit, UnitId};

/// An external lifecycle notification about a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A unit has been killed
    UnitKilled { unit: Unit },
    /// `entity` has entered `vehicle`
    VehicleEntered { vehicle: Unit, entity: Unit },
}

impl LifecycleEvent {
    /// The unit the event is primarily about.
    pub fn subject(&self) -> UnitId {
        match self {
            LifecycleEvent::UnitKilled { unit } => unit.id,
            LifecycleEvent::VehicleEntered { vehicle, .. } => vehicle.id,
        }
    }

    /// Parses an event from a single JSONL line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Serializes the event as a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses every non-empty line of a JSONL document.
    pub fn parse_stream(content: &str) -> Result<Vec<Self>, serde_json::Error> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::from_jsonl)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GroupId, UnitKind};

    #[test]
    fn test_killed_event_wire_format() {
        let unit = Unit::spawn(UnitKind::Infantry);
        let event = LifecycleEvent::UnitKilled { unit };
        let line = event.to_jsonl().unwrap();
        assert!(line.starts_with(r#"{"type":"unit_killed""#));
        assert!(!line.contains('\n'));
        assert_eq!(LifecycleEvent::from_jsonl(&line).unwrap(), event);
    }

    #[test]
    fn test_subject_is_vehicle_for_entered_event() {
        let vehicle = Unit::spawn(UnitKind::Vehicle);
        let mut entity = Unit::spawn(UnitKind::Infantry);
        entity.group = Some(GroupId::new());

        let event = LifecycleEvent::VehicleEntered { vehicle, entity };
        assert_eq!(event.subject(), vehicle.id);
    }

    #[test]
    fn test_parse_stream_skips_blank_lines() {
        let a = LifecycleEvent::UnitKilled {
            unit: Unit::spawn(UnitKind::Drone),
        };
        let b = LifecycleEvent::UnitKilled {
            unit: Unit::spawn(UnitKind::Cargo),
        };
        let doc = format!("{}\n\n{}\n", a.to_jsonl().unwrap(), b.to_jsonl().unwrap());

        let events = LifecycleEvent::parse_stream(&doc).unwrap();
        assert_eq!(events, vec![a, b]);
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        assert!(LifecycleEvent::from_jsonl(r#"{"type":"unit_cloned"}"#).is_err());
    }
}
