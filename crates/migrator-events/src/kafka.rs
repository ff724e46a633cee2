//! Kafka event producer.

use crate::config::KafkaConfig;
use crate::error::EventError;
use crate::producer::InconsistencyProducer;

use async_trait::async_trait;
use migrator_core::InconsistencyEvent;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{debug, info, instrument};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply the connection settings shared by producer and consumer.
pub(crate) fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();

    client_config
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("client.id", &config.client_id)
        .set("security.protocol", config.security_protocol.as_str());

    if let Some(sasl) = &config.sasl {
        client_config
            .set("sasl.mechanism", sasl.mechanism.as_str())
            .set("sasl.username", &sasl.username)
            .set("sasl.password", &sasl.password);
    }

    client_config
}

/// Kafka producer for inconsistency events.
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    /// Create a new event producer with the given configuration.
    ///
    /// The connection is established lazily on first send.
    pub fn new(config: KafkaConfig) -> Result<Self, EventError> {
        let producer: FutureProducer = client_config(&config)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| EventError::ConnectionFailed {
                broker: config.bootstrap_servers.clone(),
                cause: e.to_string(),
            })?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            client_id = %config.client_id,
            topic = %config.topic,
            "Event producer created"
        );

        Ok(Self {
            producer,
            topic: config.topic,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Check that the brokers answer a metadata request.
    pub fn ping(&self) -> Result<usize, EventError> {
        let metadata = self
            .producer
            .client()
            .fetch_metadata(Some(&self.topic), SEND_TIMEOUT)
            .map_err(|e| EventError::ConnectionFailed {
                broker: "unknown".to_string(),
                cause: e.to_string(),
            })?;
        Ok(metadata.brokers().len())
    }
}

#[async_trait]
impl InconsistencyProducer for EventProducer {
    #[instrument(skip(self), fields(topic = %self.topic))]
    async fn produce(&self, event: &InconsistencyEvent) -> Result<(), EventError> {
        let key = event.partition_key();
        let payload = event
            .to_json_bytes()
            .map_err(|e| EventError::SerializationFailed {
                cause: e.to_string(),
            })?;

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        let (partition, offset) = self
            .producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _)| match err {
                KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
                    EventError::PublishTimeout {
                        topic: self.topic.clone(),
                    }
                }
                other => EventError::PublishFailed {
                    topic: self.topic.clone(),
                    cause: other.to_string(),
                },
            })?;

        debug!(partition, offset, "Event published");
        Ok(())
    }
}
