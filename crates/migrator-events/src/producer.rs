//! Publishing side of the event bus.

use crate::error::EventError;
use async_trait::async_trait;
use migrator_core::InconsistencyEvent;
use std::sync::Arc;

/// Publishes inconsistency events.
///
/// Implementations key each message by the entity ID so that all events for
/// one row land on the same partition and are repaired in order.
#[async_trait]
pub trait InconsistencyProducer: Send + Sync {
    /// Publish a single event.
    async fn produce(&self, event: &InconsistencyEvent) -> Result<(), EventError>;
}

#[async_trait]
impl<P: InconsistencyProducer + ?Sized> InconsistencyProducer for Arc<P> {
    async fn produce(&self, event: &InconsistencyEvent) -> Result<(), EventError> {
        (**self).produce(event).await
    }
}
