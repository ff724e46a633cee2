//! Consuming side of the event bus.

use async_trait::async_trait;
use std::sync::Arc;

/// Handles one raw message delivered by a consumer.
///
/// The handler owns decoding and error reporting. The consumer acknowledges
/// the message once `handle` returns, so a failing message is not redelivered
/// by this consumer instance.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]);
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    async fn handle(&self, payload: &[u8]) {
        (**self).handle(payload).await;
    }
}
