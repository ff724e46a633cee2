//! Write patterns.
//!
//! A migration walks through four patterns in order:
//! `src_only -> src_first -> dst_first -> dst_only`. The pattern decides which
//! store the dual-write proxy treats as authoritative and, consequently,
//! which store plays "base" during validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::event::Direction;

/// Authoritative-store configuration of the migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePattern {
    /// Only the source store receives writes.
    SrcOnly,
    /// Both stores receive writes; the source result is authoritative.
    #[default]
    SrcFirst,
    /// Both stores receive writes; the target result is authoritative.
    DstFirst,
    /// Only the target store receives writes.
    DstOnly,
}

impl WritePattern {
    /// All patterns in migration order.
    pub const ALL: [WritePattern; 4] = [
        WritePattern::SrcOnly,
        WritePattern::SrcFirst,
        WritePattern::DstFirst,
        WritePattern::DstOnly,
    ];

    /// Wire / API name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SrcOnly => "src_only",
            Self::SrcFirst => "src_first",
            Self::DstFirst => "dst_first",
            Self::DstOnly => "dst_only",
        }
    }

    /// Which store is base for validation under this pattern.
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        match self {
            Self::SrcOnly | Self::SrcFirst => Orientation::SourceBase,
            Self::DstFirst | Self::DstOnly => Orientation::TargetBase,
        }
    }
}

impl fmt::Display for WritePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "src_only" => Ok(Self::SrcOnly),
            "src_first" => Ok(Self::SrcFirst),
            "dst_first" => Ok(Self::DstFirst),
            "dst_only" => Ok(Self::DstOnly),
            _ => Err(CoreError::UnknownPattern(s.to_string())),
        }
    }
}

/// Which physical store plays "base" for a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// base = source, target = target.
    SourceBase,
    /// base = target, target = source.
    TargetBase,
}

impl Orientation {
    /// Direction stamped on events emitted under this orientation.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::SourceBase => Direction::Src,
            Self::TargetBase => Direction::Dst,
        }
    }
}

impl From<Direction> for Orientation {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Src => Self::SourceBase,
            Direction::Dst => Self::TargetBase,
        }
    }
}
