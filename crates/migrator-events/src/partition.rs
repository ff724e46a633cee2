//! Per-partition delivery workers.
//!
//! Each partition gets its own task and bounded queue, so a slow repair on
//! one partition never holds back the others. Within a partition messages
//! are handled in offset order and acknowledged only after the handler
//! returns.

use crate::handler::MessageHandler;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Messages buffered per partition before the dispatcher waits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Called with `(partition, offset)` once the handler is done with a message.
pub type Acknowledge = Arc<dyn Fn(i32, i64) + Send + Sync>;

/// One message detached from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Routes deliveries to one worker task per partition.
pub struct PartitionWorkers<H: ?Sized> {
    handler: Arc<H>,
    ack: Acknowledge,
    token: CancellationToken,
    capacity: usize,
    workers: HashMap<i32, Worker>,
}

struct Worker {
    tx: mpsc::Sender<Delivery>,
    task: JoinHandle<()>,
}

impl<H: MessageHandler + ?Sized + 'static> PartitionWorkers<H> {
    /// Workers stop when `token` is cancelled. Queued messages are then left
    /// unacknowledged.
    pub fn new(handler: Arc<H>, ack: Acknowledge, token: CancellationToken) -> Self {
        Self {
            handler,
            ack,
            token,
            capacity: DEFAULT_QUEUE_CAPACITY,
            workers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Number of partitions seen so far.
    pub fn partitions(&self) -> usize {
        self.workers.len()
    }

    /// Queue `delivery` on its partition's worker, spawning the worker on
    /// first sight of the partition.
    ///
    /// Waits while that worker's queue is full. Returns `false` once the
    /// token is cancelled.
    pub async fn dispatch(&mut self, delivery: Delivery) -> bool {
        let partition = delivery.partition;
        let worker = self
            .workers
            .entry(partition)
            .or_insert_with(|| {
                spawn_worker(
                    partition,
                    self.capacity,
                    Arc::clone(&self.handler),
                    Arc::clone(&self.ack),
                    self.token.clone(),
                )
            });

        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = worker.tx.send(delivery) => sent.is_ok(),
        }
    }

    /// Close every queue and wait for the workers to finish.
    pub async fn shutdown(self) {
        let mut tasks = Vec::with_capacity(self.workers.len());
        for (partition, worker) in self.workers {
            drop(worker.tx);
            tasks.push((partition, worker.task));
        }
        for (partition, task) in tasks {
            if let Err(e) = task.await {
                warn!(partition, error = %e, "Partition worker panicked");
            }
        }
    }
}

fn spawn_worker<H: MessageHandler + ?Sized + 'static>(
    partition: i32,
    capacity: usize,
    handler: Arc<H>,
    ack: Acknowledge,
    token: CancellationToken,
) -> Worker {
    let (tx, mut rx) = mpsc::channel::<Delivery>(capacity);

    let task = tokio::spawn(async move {
        info!(partition, "Partition worker started");
        loop {
            let delivery = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = rx.recv() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            match &delivery.payload {
                Some(payload) => handler.handle(payload).await,
                None => warn!(partition, offset = delivery.offset, "Skipping empty message"),
            }
            ack(delivery.partition, delivery.offset);
            debug!(partition, offset = delivery.offset, "Message handled");
        }
        info!(partition, "Partition worker stopped");
    });

    Worker { tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records handler and ack calls in one shared log.
    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, entry: String) {
            self.entries.lock().push(entry);
        }

        fn for_partition(&self, partition: i32) -> Vec<String> {
            let suffix = format!(":{partition}:");
            self.entries
                .lock()
                .iter()
                .filter(|e| e.contains(&suffix))
                .cloned()
                .collect()
        }
    }

    /// Handler that blocks on payloads starting with `hold` until released.
    struct Recorder {
        journal: Arc<Journal>,
        release: Notify,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, payload: &[u8]) {
            let text = String::from_utf8_lossy(payload).to_string();
            if text.starts_with("hold") {
                self.release.notified().await;
            }
            self.journal.push(format!("handle{text}"));
        }
    }

    fn setup() -> (Arc<Journal>, Arc<Recorder>, Acknowledge) {
        let journal = Arc::new(Journal::default());
        let recorder = Arc::new(Recorder {
            journal: Arc::clone(&journal),
            release: Notify::new(),
        });
        let ack_journal = Arc::clone(&journal);
        let ack: Acknowledge =
            Arc::new(move |partition: i32, offset: i64| ack_journal.push(format!("ack:{partition}:{offset}")));
        (journal, recorder, ack)
    }

    fn delivery(partition: i32, offset: i64, tag: &str) -> Delivery {
        Delivery {
            partition,
            offset,
            payload: Some(format!("{tag}:{partition}:{offset}").into_bytes()),
        }
    }

    async fn wait_for(journal: &Journal, entry: &str) {
        for _ in 0..200 {
            if journal.entries.lock().iter().any(|e| e == entry) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("never saw {entry}");
    }

    #[tokio::test]
    async fn test_slow_partition_does_not_block_others() {
        let (journal, recorder, ack) = setup();
        let mut workers = PartitionWorkers::new(Arc::clone(&recorder), ack, CancellationToken::new());

        assert!(workers.dispatch(delivery(0, 10, "hold")).await);
        assert!(workers.dispatch(delivery(0, 11, "")).await);
        assert!(workers.dispatch(delivery(1, 20, "")).await);
        assert!(workers.dispatch(delivery(1, 21, "")).await);
        assert_eq!(workers.partitions(), 2);

        wait_for(&journal, "ack:1:21").await;
        assert!(journal.for_partition(0).is_empty());

        recorder.release.notify_one();
        wait_for(&journal, "ack:0:11").await;
        workers.shutdown().await;
    }

    #[tokio::test]
    async fn test_partition_order_and_ack_after_handle() {
        let (journal, recorder, ack) = setup();
        let mut workers = PartitionWorkers::new(recorder, ack, CancellationToken::new());

        for offset in 0..3 {
            assert!(workers.dispatch(delivery(4, offset, "")).await);
        }
        workers.shutdown().await;

        assert_eq!(
            journal.for_partition(4),
            vec![
                "handle:4:0", "ack:4:0", "handle:4:1", "ack:4:1", "handle:4:2", "ack:4:2",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_payload_is_acknowledged() {
        let (journal, recorder, ack) = setup();
        let mut workers = PartitionWorkers::new(recorder, ack, CancellationToken::new());

        let empty = Delivery {
            partition: 2,
            offset: 5,
            payload: None,
        };
        assert!(workers.dispatch(empty).await);
        workers.shutdown().await;

        assert_eq!(journal.for_partition(2), vec!["ack:2:5"]);
    }

    #[tokio::test]
    async fn test_cancel_stops_workers_without_acknowledging_queued_messages() {
        let (journal, recorder, ack) = setup();
        let token = CancellationToken::new();
        let mut workers =
            PartitionWorkers::new(Arc::clone(&recorder), ack, token.clone()).with_capacity(4);

        assert!(workers.dispatch(delivery(0, 1, "hold")).await);
        assert!(workers.dispatch(delivery(0, 2, "")).await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        token.cancel();
        recorder.release.notify_one();
        assert!(!workers.dispatch(delivery(0, 3, "")).await);

        tokio::time::timeout(Duration::from_secs(1), workers.shutdown())
            .await
            .unwrap();
        // The in-flight message finishes; the queued one stays uncommitted.
        assert_eq!(journal.for_partition(0), vec!["handlehold:0:1", "ack:0:1"]);
    }
}
