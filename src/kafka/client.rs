//! Broker seams and their rdkafka implementations.
//!
//! The consumer and producer pipelines only see [`Reader`] and [`Writer`].
//! [`KafkaReader`] and [`KafkaWriter`] translate the validated configuration
//! into librdkafka settings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use tracing::info;

use super::config::{ConsumerConfig, ProducerConfig};
use super::message::Message;
use crate::error::{BoxError, Error};

/// Pulls messages for a consumer.
#[async_trait]
pub trait Reader: Send + Sync + 'static {
    /// Waits for the next message. In autocommit mode, fetching commits it.
    async fn fetch_message(&self) -> Result<Message, BoxError>;

    /// Commits `msg`'s offset, so the group resumes after it.
    async fn commit_message(&self, msg: &Message) -> Result<(), BoxError>;
}

/// Writes messages for a producer. Must tolerate concurrent callers.
#[async_trait]
pub trait Writer: Send + Sync + 'static {
    async fn write_message(&self, msg: &Message) -> Result<(), BoxError>;
}

// ── KafkaReader ───────────────────────────────────────────────────────────────

pub struct KafkaReader {
    consumer: Arc<StreamConsumer>,
}

impl KafkaReader {
    /// Creates the group consumer and subscribes to the configured topic.
    pub fn new(config: &ConsumerConfig) -> Result<Self, Error> {
        config.validate()?;

        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", config.autocommit.to_string())
            .set("enable.auto.offset.store", "true")
            .set("auto.offset.reset", "earliest")
            .set("fetch.min.bytes", config.min_bytes.to_string())
            .set("max.partition.fetch.bytes", config.max_bytes.to_string());
        if config.autocommit {
            client.set("auto.commit.interval.ms", config.commit_interval_ms().to_string());
        }

        let consumer: StreamConsumer = client
            .create()
            .map_err(|e| Error::config(format!("failed to build kafka consumer: {e}")))?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| Error::config(format!("failed to subscribe to `{}`: {e}", config.topic)))?;

        info!(
            brokers = %config.brokers.join(","),
            group = %config.group_id,
            topic = %config.topic,
            autocommit = config.autocommit,
            "kafka reader subscribed"
        );
        Ok(Self { consumer: Arc::new(consumer) })
    }
}

#[async_trait]
impl Reader for KafkaReader {
    async fn fetch_message(&self) -> Result<Message, BoxError> {
        let borrowed = self.consumer.recv().await?;
        Ok(Message::from_kafka(&borrowed))
    }

    async fn commit_message(&self, msg: &Message) -> Result<(), BoxError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&msg.topic, msg.partition, Offset::Offset(msg.offset + 1))?;

        // Synchronous commit blocks the calling thread until the broker acks.
        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync)).await??;
        Ok(())
    }
}

// ── KafkaWriter ───────────────────────────────────────────────────────────────

pub struct KafkaWriter {
    producer: FutureProducer,
    write_timeout: Duration,
}

impl KafkaWriter {
    pub fn new(config: &ProducerConfig) -> Result<Self, Error> {
        config.validate()?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("partitioner", config.balancer.as_str())
            .set("message.send.max.retries", (config.max_attempts - 1).to_string())
            .set("queue.buffering.max.messages", config.queue_capacity.to_string())
            .set("batch.num.messages", config.batch_size.to_string())
            .set("batch.size", config.batch_bytes.to_string())
            .set("linger.ms", config.batch_timeout_ms.to_string())
            .set("message.timeout.ms", config.write_timeout_ms.to_string())
            .create()
            .map_err(|e| Error::config(format!("failed to build kafka producer: {e}")))?;

        info!(
            brokers = %config.brokers.join(","),
            topic = %config.topic,
            balancer = config.balancer.as_str(),
            "kafka writer ready"
        );
        Ok(Self { producer, write_timeout: Duration::from_millis(config.write_timeout_ms) })
    }
}

#[async_trait]
impl Writer for KafkaWriter {
    async fn write_message(&self, msg: &Message) -> Result<(), BoxError> {
        let mut headers = OwnedHeaders::new_with_capacity(msg.headers.len());
        for (key, value) in &msg.headers {
            headers = headers.insert(Header { key: key.as_str(), value: Some(&value[..]) });
        }

        let mut record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&msg.topic).headers(headers);
        if let Some(key) = &msg.key {
            record = record.key(&key[..]);
        }
        if let Some(value) = &msg.value {
            record = record.payload(&value[..]);
        }
        if msg.partition >= 0 {
            record = record.partition(msg.partition);
        }

        self.producer
            .send(record, self.write_timeout)
            .await
            .map_err(|(err, _)| err)?;
        Ok(())
    }
}
