//! Kafka event consumer.

use crate::config::KafkaConfig;
use crate::error::EventError;
use crate::handler::MessageHandler;
use crate::kafka::client_config;
use crate::partition::{Acknowledge, Delivery, PartitionWorkers};

use futures_util::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Kafka consumer delivering inconsistency events to a handler.
///
/// Offsets are committed manually after the handler returns, whatever the
/// outcome.
pub struct EventConsumer {
    consumer: Arc<StreamConsumer>,
    topic: String,
    consumer_group: String,
}

impl EventConsumer {
    /// Create a consumer and subscribe it to the configured topic.
    pub fn new(config: KafkaConfig) -> Result<Self, EventError> {
        let consumer: StreamConsumer = client_config(&config)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .create()
            .map_err(|e| EventError::ConnectionFailed {
                broker: config.bootstrap_servers.clone(),
                cause: e.to_string(),
            })?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| EventError::ConsumeFailed {
                topic: config.topic.clone(),
                cause: e.to_string(),
            })?;

        info!(
            consumer_group = %config.consumer_group,
            topic = %config.topic,
            bootstrap_servers = %config.bootstrap_servers,
            "Event consumer subscribed"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            topic: config.topic,
            consumer_group: config.consumer_group,
        })
    }

    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }

    /// Run the consumer loop until the token is cancelled.
    ///
    /// Each assigned partition is handled by its own worker task, so a slow
    /// repair only delays its partition. Offsets are committed per partition
    /// after the handler returns.
    #[instrument(skip_all, fields(topic = %self.topic, consumer_group = %self.consumer_group))]
    pub async fn run<H: MessageHandler + ?Sized + 'static>(
        &self,
        handler: Arc<H>,
        token: CancellationToken,
    ) {
        info!("Starting consumer loop");

        let consumer = Arc::clone(&self.consumer);
        let topic = self.topic.clone();
        let ack: Acknowledge = Arc::new(move |partition: i32, offset: i64| {
            if let Err(e) = commit(&consumer, &topic, partition, offset) {
                error!(partition, offset, error = %e, "Failed to commit offset");
            }
        });
        let mut workers = PartitionWorkers::new(handler, ack, token.clone());

        let mut stream = self.consumer.stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = stream.next() => next,
            };

            let delivery = match next {
                Some(Ok(message)) => Delivery {
                    partition: message.partition(),
                    offset: message.offset(),
                    payload: message.payload().map(<[u8]>::to_vec),
                },
                Some(Err(e)) => {
                    error!(error = %e, "Error receiving message");
                    continue;
                }
                None => break,
            };

            if !workers.dispatch(delivery).await {
                break;
            }
        }

        let partitions = workers.partitions();
        workers.shutdown().await;
        info!(partitions, "Consumer loop ended");
    }
}

fn commit(
    consumer: &StreamConsumer,
    topic: &str,
    partition: i32,
    offset: i64,
) -> Result<(), EventError> {
    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;

    consumer.commit(&tpl, CommitMode::Async)?;

    debug!(partition, offset, "Offset committed");
    Ok(())
}
