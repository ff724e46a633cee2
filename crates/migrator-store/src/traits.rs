//! Store adapter trait.

use async_trait::async_trait;
use migrator_core::Entity;

use crate::error::StoreResult;

/// One side of a migration: a store holding records of type `T`.
///
/// Row-level atomicity of `upsert` and `delete` is the adapter's job; the
/// engine takes no locks of its own.
#[async_trait]
pub trait Store<T: Entity>: Send + Sync {
    /// Name used in log fields (e.g. "source", "target").
    fn name(&self) -> &str;

    /// Scan records with `utime >= min_utime`, ordered by ID ascending,
    /// skipping `offset` rows and returning at most `limit`.
    ///
    /// An empty vector means there is nothing at or beyond `offset`.
    async fn range_scan(&self, min_utime: i64, offset: usize, limit: usize) -> StoreResult<Vec<T>>;

    /// Fetch the records whose IDs are in `ids`. Missing IDs are simply absent
    /// from the result; order is unspecified.
    async fn batch_get(&self, ids: &[i64]) -> StoreResult<Vec<T>>;

    /// Fetch a single record.
    async fn find(&self, id: i64) -> StoreResult<Option<T>>;

    /// Insert the record, or overwrite every tracked column if the ID exists.
    async fn upsert(&self, entity: &T) -> StoreResult<()>;

    /// Delete the record. Deleting a missing ID succeeds.
    async fn delete(&self, id: i64) -> StoreResult<()>;
}
