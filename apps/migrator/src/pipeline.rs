//! Wiring of the inconsistency event pipeline.
//!
//! With the `kafka` feature and `KAFKA_BOOTSTRAP_SERVERS` set, events travel
//! through the broker. Otherwise an in-process bus connects the validators to
//! the fix consumer.

use std::sync::Arc;

use migrator_events::{
    EventError, InconsistencyProducer, KafkaConfig, MemoryBus, MessageHandler,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;

/// Running event pipeline.
pub struct Pipeline {
    /// Handed to the scheduler's validators.
    pub producer: Arc<dyn InconsistencyProducer>,
    /// Consumer loop, ends when the token passed to [`start`] is cancelled.
    pub consumer: JoinHandle<()>,
}

/// Create the producer and spawn the consumer loop feeding `handler`.
pub fn start<H>(
    config: &Config,
    handler: Arc<H>,
    token: CancellationToken,
) -> Result<Pipeline, EventError>
where
    H: MessageHandler + 'static,
{
    if let Some(kafka) = &config.kafka {
        return start_kafka(kafka, &config.topic, handler, token);
    }

    Ok(start_memory(&config.topic, handler, token))
}

fn start_memory<H>(topic: &str, handler: Arc<H>, token: CancellationToken) -> Pipeline
where
    H: MessageHandler + 'static,
{
    let bus = Arc::new(MemoryBus::new(topic));
    let consumer_bus = Arc::clone(&bus);
    let consumer = tokio::spawn(async move {
        consumer_bus.run(handler.as_ref(), token).await;
    });

    info!(topic, "In-memory event pipeline started");
    Pipeline {
        producer: bus,
        consumer,
    }
}

#[cfg(feature = "kafka")]
fn start_kafka<H>(
    kafka: &KafkaConfig,
    _memory_topic: &str,
    handler: Arc<H>,
    token: CancellationToken,
) -> Result<Pipeline, EventError>
where
    H: MessageHandler + 'static,
{
    use migrator_events::{EventConsumer, EventProducer};

    let producer = EventProducer::new(kafka.clone())?;
    // Startup only; the metadata fetch blocks for at most the send timeout.
    match producer.ping() {
        Ok(brokers) => info!(brokers, "Kafka brokers reachable"),
        Err(e) => tracing::warn!(error = %e, "Kafka brokers unreachable, producer will keep retrying"),
    }
    let event_consumer = EventConsumer::new(kafka.clone())?;
    let consumer = tokio::spawn(async move {
        event_consumer.run(handler, token).await;
    });

    info!(topic = %kafka.topic, consumer_group = %kafka.consumer_group, "Kafka event pipeline started");
    Ok(Pipeline {
        producer: Arc::new(producer),
        consumer,
    })
}

#[cfg(not(feature = "kafka"))]
fn start_kafka<H>(
    kafka: &KafkaConfig,
    memory_topic: &str,
    handler: Arc<H>,
    token: CancellationToken,
) -> Result<Pipeline, EventError>
where
    H: MessageHandler + 'static,
{
    tracing::warn!(
        bootstrap_servers = %kafka.bootstrap_servers,
        "Kafka configured but the kafka feature is disabled, using the in-memory bus"
    );
    Ok(start_memory(memory_topic, handler, token))
}
