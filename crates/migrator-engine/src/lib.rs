//! # Consistency Engine
//!
//! Keeps two live stores converging while data migrates between them.
//!
//! ## Overview
//!
//! - [`Validator`] scans both stores in both directions and publishes one
//!   event per drifted record
//! - [`FixConsumer`] receives those events and hands them to the [`Fixer`]
//!   oriented the way the event says
//! - [`Scheduler`] owns the write pattern and at most one full and one
//!   incremental validation run
//!
//! ## Architecture
//!
//! ```text
//!   operator ──► Scheduler ──spawn──► Validator ──► event bus ──► FixConsumer
//!                   │                  │     │                        │
//!                   ▼                  ▼     ▼                        ▼
//!           PatternListener        base   target  ◄──── Fixer (upsert/delete)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use migrator_engine::{Scheduler, ValidatorConfig};
//!
//! let scheduler = Scheduler::new(source, target, producer, ValidatorConfig::default());
//! scheduler.set_pattern(WritePattern::DstFirst);
//! let run = scheduler.start_full()?;
//! ```

pub mod consumer;
pub mod detached;
pub mod error;
pub mod fixer;
pub mod listener;
pub mod scheduler;
pub mod types;
pub mod validator;

pub use consumer::{FixConsumer, FixStats};
pub use detached::spawn_detached;
pub use error::{FixError, SchedulerError, ValidateError};
pub use fixer::{FixAction, Fixer};
pub use listener::PatternListener;
pub use scheduler::{Scheduler, SchedulerStatus};
pub use types::{RunInfo, RunMode, RunState};
pub use validator::{ValidationReport, ValidationSummary, Validator, ValidatorConfig};
