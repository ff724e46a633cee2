//! # migrator-events
//!
//! Event bus for inconsistency events.
//!
//! The validator publishes one [`InconsistencyEvent`] per detected drift; a
//! consumer group delivers them at least once to a [`MessageHandler`], which
//! routes them to the fixer. Delivery is acknowledged after the handler
//! returns, whatever the outcome, so a poison message never blocks a
//! partition. Repairs are idempotent, which makes redelivery harmless.
//!
//! ## Transports
//!
//! - [`MemoryBus`]: in-process queue, always available
//! - [`EventProducer`] / [`EventConsumer`]: Kafka via rdkafka (feature `kafka`)
//!
//! The Kafka consumer hands each partition to its own [`PartitionWorkers`]
//! task, keeping per-partition order while partitions proceed independently.
//!
//! ## Cargo Features
//!
//! - `kafka`: Enable the Kafka producer/consumer (requires librdkafka)
//! - `kafka-static`: Build librdkafka from source (requires cmake)
//!
//! ## Example
//!
//! ```rust,ignore
//! use migrator_events::{EventProducer, InconsistencyProducer, KafkaConfig};
//!
//! let config = KafkaConfig::from_env()?;
//! let producer = EventProducer::new(config)?;
//! producer.produce(&event).await?;
//! ```
//!
//! [`InconsistencyEvent`]: migrator_core::InconsistencyEvent

pub mod config;
pub mod error;
pub mod handler;
pub mod memory;
pub mod partition;
pub mod producer;

#[cfg(feature = "kafka")]
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use config::{
    KafkaConfig, KafkaConfigBuilder, SaslCredentials, SaslMechanism, SecurityProtocol,
    DEFAULT_CONSUMER_GROUP, DEFAULT_TOPIC,
};
pub use error::EventError;
pub use handler::MessageHandler;
pub use memory::MemoryBus;
pub use partition::{Acknowledge, Delivery, PartitionWorkers};
pub use producer::InconsistencyProducer;

#[cfg(feature = "kafka")]
pub use consumer::EventConsumer;
#[cfg(feature = "kafka")]
pub use kafka::EventProducer;
