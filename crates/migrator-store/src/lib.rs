//! # Store Adapters
//!
//! The store abstraction the consistency engine reads from and repairs.
//!
//! A store exposes exactly what validation and repair need:
//!
//! - ordered range scan by primary key, filtered by a modification-time watermark
//! - batched point lookup by ID
//! - single-row lookup, upsert and delete
//!
//! ## Implementations
//!
//! - [`MemoryStore`] - `BTreeMap` backed, with fault injection for tests
//! - [`PgStore`] - `PostgreSQL` via `SQLx` (feature `postgres`, on by default)
//!
//! ## Example
//!
//! ```ignore
//! use migrator_store::{DatabaseConfig, PgStore, Store};
//!
//! let store = PgStore::<Interactive>::connect("source", &DatabaseConfig::new(url)).await?;
//! let first_batch = store.range_scan(0, 0, 100).await?;
//! ```

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::{DatabaseConfig, PgStore, TableEntity};
pub use traits::Store;
