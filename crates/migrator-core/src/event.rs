//! Inconsistency events.
//!
//! The validator emits one event per drifted entity; the fixer consumes them.
//! The JSON form is the wire format on the event bus:
//!
//! ```json
//! {"Direction":"SRC","ID":42,"Type":"TargetMissing"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Which store was authoritative when the drift was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The source store is the base; repairs flow source -> target.
    #[serde(rename = "SRC")]
    Src,
    /// The target store is the base; repairs flow target -> source.
    #[serde(rename = "DST")]
    Dst,
}

impl Direction {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Src => "SRC",
            Self::Dst => "DST",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SRC" => Ok(Self::Src),
            "DST" => Ok(Self::Dst),
            _ => Err(CoreError::UnknownDirection(s.to_string())),
        }
    }
}

/// Kind of drift detected for a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InconsistencyKind {
    /// Present in base, absent from target.
    TargetMissing,
    /// Present in target, absent from base.
    BaseMissing,
    /// Present in both, but the migration-relevant columns differ.
    NotEqual,
}

impl InconsistencyKind {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetMissing => "TargetMissing",
            Self::BaseMissing => "BaseMissing",
            Self::NotEqual => "NotEqual",
        }
    }

    /// The kind reported when base and target swap roles.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        match self {
            Self::TargetMissing => Self::BaseMissing,
            Self::BaseMissing => Self::TargetMissing,
            Self::NotEqual => Self::NotEqual,
        }
    }
}

impl fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InconsistencyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TargetMissing" => Ok(Self::TargetMissing),
            "BaseMissing" => Ok(Self::BaseMissing),
            "NotEqual" => Ok(Self::NotEqual),
            _ => Err(CoreError::UnknownKind(s.to_string())),
        }
    }
}

/// A detected drift for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InconsistencyEvent {
    #[serde(rename = "Direction")]
    pub direction: Direction,
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Type")]
    pub kind: InconsistencyKind,
}

impl InconsistencyEvent {
    /// Create a new event.
    #[must_use]
    pub fn new(direction: Direction, id: i64, kind: InconsistencyKind) -> Self {
        Self {
            direction,
            id,
            kind,
        }
    }

    /// Bus partition key. Keyed by entity so that repairs of the same
    /// entity are delivered in order within a partition.
    #[must_use]
    pub fn partition_key(&self) -> String {
        self.id.to_string()
    }

    /// Serialize to the JSON wire format.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse from the JSON wire format.
    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Display for InconsistencyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.direction, self.id, self.kind)
    }
}
