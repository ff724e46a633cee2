//! Control API router.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use migrator_core::Entity;
use migrator_engine::Scheduler;

use crate::handlers;

/// Shared state of the control API.
pub struct MigratorState<T: Entity> {
    pub scheduler: Arc<Scheduler<T>>,
}

impl<T: Entity> MigratorState<T> {
    pub fn new(scheduler: Arc<Scheduler<T>>) -> Self {
        Self { scheduler }
    }
}

impl<T: Entity> Clone for MigratorState<T> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

/// Create the control API router.
///
/// # Example
///
/// ```ignore
/// use migrator_api::{migrator_routes, MigratorState};
///
/// let app = Router::new().nest("/migrator", migrator_routes(MigratorState::new(scheduler)));
/// ```
pub fn migrator_routes<T: Entity>(state: MigratorState<T>) -> Router {
    Router::new()
        // Write pattern
        .route("/src_only", post(handlers::src_only::<T>))
        .route("/src_first", post(handlers::src_first::<T>))
        .route("/dst_first", post(handlers::dst_first::<T>))
        .route("/dst_only", post(handlers::dst_only::<T>))
        .route("/pattern/:name", post(handlers::set_pattern::<T>))
        // Validation runs
        .route("/full/start", post(handlers::start_full::<T>))
        .route("/full/stop", post(handlers::stop_full::<T>))
        .route("/incr/start", post(handlers::start_incr::<T>))
        .route("/incr/stop", post(handlers::stop_incr::<T>))
        .route("/status", get(handlers::status::<T>))
        .with_state(state)
}
