//! Side Affiliation
//!
//! The affiliation tag shared by a garrison and its groups. The engine only
//! compares sides for equality; what a side means is up to the host.
//!
//! # Example
//!
//! ```
//! use garrison_model::Side;
//!
//! let side: Side = "opfor".parse().unwrap();
//! assert_eq!(side, Side::East);
//! assert_eq!(Side::try_from(1u8).unwrap(), Side::West);
//! assert!(Side::try_from(9u8).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a value does not name a recognized side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized side '{value}'")]
pub struct InvalidSideError {
    pub value: String,
}

/// Affiliation of a garrison and its groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    West,
    East,
    Independent,
    Civilian,
}

impl Side {
    /// Numeric code used by hosts that pass sides around as integers.
    pub fn code(self) -> u8 {
        match self {
            Side::West => 1,
            Side::East => 2,
            Side::Independent => 3,
            Side::Civilian => 4,
        }
    }

    /// Returns all side variants.
    pub fn all() -> &'static [Side] {
        &[Side::West, Side::East, Side::Independent, Side::Civilian]
    }
}

impl TryFrom<u8> for Side {
    type Error = InvalidSideError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Side::all()
            .iter()
            .copied()
            .find(|side| side.code() == code)
            .ok_or_else(|| InvalidSideError {
                value: code.to_string(),
            })
    }
}

impl FromStr for Side {
    type Err = InvalidSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "west" | "blufor" => Ok(Side::West),
            "east" | "opfor" => Ok(Side::East),
            "independent" | "guer" | "resistance" => Ok(Side::Independent),
            "civilian" | "civ" => Ok(Side::Civilian),
            _ => Err(InvalidSideError {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::West => write!(f, "west"),
            Side::East => write!(f, "east"),
            Side::Independent => write!(f, "independent"),
            Side::Civilian => write!(f, "civilian"),
        }
    }
}
