//! # Migration Control API
//!
//! Thin HTTP surface over a [`Scheduler`](migrator_engine::Scheduler).
//!
//! Every endpoint answers `200 OK` with a `{code, msg}` body; a non-zero
//! `code` reports a handled error:
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 4 | invalid request parameter |
//! | 5 | the scheduler refused the run |
//!
//! ## Endpoints
//!
//! - `POST /src_only`, `/src_first`, `/dst_first`, `/dst_only`, `/pattern/:name`
//! - `POST /full/start`, `/full/stop`
//! - `POST /incr/start` with `{"utime": 0, "sleep_interval_ms": 1000}`, `/incr/stop`
//! - `GET /status`

pub mod error;
pub mod handlers;
pub mod router;

pub use error::{ApiError, ApiResponse};
pub use router::{migrator_routes, MigratorState};
