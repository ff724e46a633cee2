//! In-process event bus.
//!
//! Used when no Kafka brokers are configured and throughout the tests. The
//! bus stores serialized payloads so consumers go through the same decode
//! path as with Kafka.

use crate::error::EventError;
use crate::handler::MessageHandler;
use crate::producer::InconsistencyProducer;

use async_trait::async_trait;
use migrator_core::InconsistencyEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// FIFO queue of serialized inconsistency events.
#[derive(Debug)]
pub struct MemoryBus {
    topic: String,
    queue: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
    closed: AtomicBool,
    fail_publishes: AtomicUsize,
    published: AtomicU64,
    delivered: AtomicU64,
}

impl MemoryBus {
    /// Create an empty bus for the given topic name.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            fail_publishes: AtomicUsize::new(0),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Append a raw payload, bypassing serialization.
    pub fn push_raw(&self, payload: Vec<u8>) {
        self.queue.lock().push_back(payload);
        self.notify.notify_one();
    }

    /// Number of messages waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Decoded copy of every pending event. Undecodable payloads are skipped.
    pub fn peek_events(&self) -> Vec<InconsistencyEvent> {
        self.queue
            .lock()
            .iter()
            .filter_map(|p| InconsistencyEvent::from_json_bytes(p).ok())
            .collect()
    }

    /// Total events accepted by `produce`.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total messages handed to a handler.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Make the next `n` calls to `produce` fail.
    pub fn fail_next_publishes(&self, n: usize) {
        self.fail_publishes.store(n, Ordering::SeqCst);
    }

    /// Reject further publishes and stop `run` loops once the queue is empty.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver every pending message to `handler`, in order.
    ///
    /// Messages published while draining are delivered too. Returns the
    /// number of messages delivered.
    pub async fn drain<H: MessageHandler + ?Sized>(&self, handler: &H) -> usize {
        let mut count = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some(payload) = next else {
                break;
            };
            handler.handle(&payload).await;
            self.delivered.fetch_add(1, Ordering::Relaxed);
            count += 1;
        }
        count
    }

    /// Deliver messages to `handler` as they arrive until cancelled or closed.
    ///
    /// Messages already queued when the token fires are still delivered.
    #[instrument(skip_all, fields(topic = %self.topic))]
    pub async fn run<H: MessageHandler + ?Sized>(&self, handler: &H, token: CancellationToken) {
        info!("Starting in-memory consumer loop");

        loop {
            let delivered = self.drain(handler).await;
            if delivered > 0 {
                debug!(delivered, "Drained in-memory bus");
            }
            if self.is_closed() {
                break;
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    let flushed = self.drain(handler).await;
                    if flushed > 0 {
                        debug!(flushed, "Delivered messages queued before cancellation");
                    }
                    break;
                }
                _ = self.notify.notified() => {}
            }
        }

        info!("In-memory consumer loop ended");
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TOPIC)
    }
}

#[async_trait]
impl InconsistencyProducer for MemoryBus {
    async fn produce(&self, event: &InconsistencyEvent) -> Result<(), EventError> {
        if self.is_closed() {
            return Err(EventError::Closed);
        }
        if self.take_injected_failure() {
            return Err(EventError::PublishFailed {
                topic: self.topic.clone(),
                cause: "injected failure".to_string(),
            });
        }

        let payload = event
            .to_json_bytes()
            .map_err(|e| EventError::SerializationFailed {
                cause: e.to_string(),
            })?;

        debug!(topic = %self.topic, key = %event.partition_key(), "Publishing event");
        self.push_raw(payload);
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
