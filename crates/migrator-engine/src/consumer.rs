//! Routes inconsistency events to the fixer that matches their direction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use migrator_core::{Direction, Entity, InconsistencyEvent};
use migrator_events::MessageHandler;
use migrator_store::Store;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::error::FixError;
use crate::fixer::{FixAction, Fixer};

/// Default deadline of one repair.
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(1);

/// Counters of a [`FixConsumer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixStats {
    pub fixed: u64,
    pub failed: u64,
    pub malformed: u64,
}

/// Message handler applying inconsistency events.
///
/// `SRC` events were detected with the source store authoritative and repair
/// the target store. `DST` events repair the source store from the target.
pub struct FixConsumer<T: Entity> {
    src_fixer: Fixer<T>,
    dst_fixer: Fixer<T>,
    timeout: Duration,
    fixed: AtomicU64,
    failed: AtomicU64,
    malformed: AtomicU64,
}

impl<T: Entity> FixConsumer<T> {
    /// Create a consumer over the migration's source and target stores.
    #[must_use]
    pub fn new(source: Arc<dyn Store<T>>, target: Arc<dyn Store<T>>) -> Self {
        Self {
            src_fixer: Fixer::new(Arc::clone(&source), Arc::clone(&target)),
            dst_fixer: Fixer::new(target, source),
            timeout: DEFAULT_FIX_TIMEOUT,
            fixed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    /// Set the deadline of one repair.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stats(&self) -> FixStats {
        FixStats {
            fixed: self.fixed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }

    fn fixer_for(&self, direction: Direction) -> &Fixer<T> {
        match direction {
            Direction::Src => &self.src_fixer,
            Direction::Dst => &self.dst_fixer,
        }
    }

    /// Apply one decoded event under the repair deadline.
    #[instrument(skip(self), fields(direction = %event.direction, id = event.id, kind = %event.kind))]
    pub async fn process(&self, event: &InconsistencyEvent) -> Result<FixAction, FixError> {
        let fixer = self.fixer_for(event.direction);
        let result = match tokio::time::timeout(self.timeout, fixer.fix(event.id, event.kind)).await {
            Ok(result) => result,
            Err(_) => Err(FixError::Timeout { id: event.id }),
        };

        match &result {
            Ok(_) => {
                self.fixed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }
}

#[async_trait]
impl<T: Entity> MessageHandler for FixConsumer<T> {
    async fn handle(&self, payload: &[u8]) {
        let event = match InconsistencyEvent::from_json_bytes(payload) {
            Ok(event) => event,
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Skipping malformed inconsistency event"
                );
                return;
            }
        };

        match self.process(&event).await {
            Ok(action) => debug!(%event, ?action, "Inconsistency fixed"),
            Err(e) => error!(%event, error = %e, transient = e.is_transient(), "Failed to fix inconsistency"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_core::InconsistencyKind;
    use migrator_store::MemoryStore;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        value: &'static str,
    }

    impl Entity for Row {
        fn id(&self) -> i64 {
            self.id
        }

        fn utime(&self) -> i64 {
            0
        }

        fn equals(&self, other: &Self) -> bool {
            self == other
        }
    }

    #[tokio::test]
    async fn test_routes_by_direction() {
        let source = Arc::new(MemoryStore::with_rows("source", vec![Row { id: 1, value: "src" }]));
        let target = Arc::new(MemoryStore::with_rows("target", vec![Row { id: 2, value: "dst" }]));
        let consumer = FixConsumer::new(source.clone(), target.clone());

        let src_event = InconsistencyEvent::new(Direction::Src, 1, InconsistencyKind::TargetMissing);
        let dst_event = InconsistencyEvent::new(Direction::Dst, 2, InconsistencyKind::TargetMissing);
        consumer.handle(&src_event.to_json_bytes().unwrap()).await;
        consumer.handle(&dst_event.to_json_bytes().unwrap()).await;

        assert_eq!(target.get(1), Some(Row { id: 1, value: "src" }));
        assert_eq!(source.get(2), Some(Row { id: 2, value: "dst" }));
        assert_eq!(consumer.stats().fixed, 2);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_skipped() {
        let source = Arc::new(MemoryStore::<Row>::new("source"));
        let target = Arc::new(MemoryStore::<Row>::new("target"));
        let consumer = FixConsumer::new(source, target.clone());

        consumer.handle(b"not json").await;
        consumer
            .handle(br#"{"Direction":"SIDEWAYS","ID":1,"Type":"NotEqual"}"#)
            .await;

        assert_eq!(
            consumer.stats(),
            FixStats {
                fixed: 0,
                failed: 0,
                malformed: 2
            }
        );
        assert_eq!(target.write_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_repair_times_out() {
        let source = Arc::new(MemoryStore::with_rows("source", vec![Row { id: 1, value: "a" }]));
        source.set_lookup_delay(Some(Duration::from_secs(10)));
        let target = Arc::new(MemoryStore::<Row>::new("target"));
        let consumer = FixConsumer::new(source, target.clone()).with_timeout(Duration::from_millis(100));

        let event = InconsistencyEvent::new(Direction::Src, 1, InconsistencyKind::TargetMissing);
        let err = consumer.process(&event).await.unwrap_err();

        assert!(matches!(err, FixError::Timeout { id: 1 }));
        assert_eq!(consumer.stats().failed, 1);
        assert!(target.is_empty());
    }
}
