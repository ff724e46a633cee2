//! migrator Core Library
//!
//! Shared types for the online migration consistency engine.
//!
//! # Modules
//!
//! - [`entity`] - The contract every migratable record implements
//! - [`event`] - Inconsistency events exchanged between validator and fixer
//! - [`pattern`] - Write patterns and the store orientation they imply
//! - [`error`] - Core error type
//!
//! # Example
//!
//! ```
//! use migrator_core::{Direction, InconsistencyEvent, InconsistencyKind, WritePattern};
//!
//! let pattern: WritePattern = "dst_first".parse().unwrap();
//! assert_eq!(pattern.orientation().direction(), Direction::Dst);
//!
//! let event = InconsistencyEvent::new(Direction::Dst, 7, InconsistencyKind::TargetMissing);
//! assert_eq!(event.partition_key(), "7");
//! ```

pub mod entity;
pub mod error;
pub mod event;
pub mod pattern;

pub use entity::Entity;
pub use error::{CoreError, Result};
pub use event::{Direction, InconsistencyEvent, InconsistencyKind};
pub use pattern::{Orientation, WritePattern};
