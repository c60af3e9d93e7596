//! Kafka adapters.
//!
//! - [`Consumer`] — fetches messages, decodes them and feeds an endpoint,
//!   committing offsets per message in manual mode.
//! - [`Producer`] — an endpoint that encodes a domain value and writes it.
//!
//! Both talk to the broker through the [`Reader`] / [`Writer`] seams;
//! [`KafkaReader`] and [`KafkaWriter`] are the rdkafka-backed defaults.

mod client;
mod config;
mod consumer;
mod message;
mod producer;

pub use client::{KafkaReader, KafkaWriter, Reader, Writer};
pub use config::{
    Balancer, ConsumerConfig, DEFAULT_BROKER, DEFAULT_GROUP_ID, DEFAULT_TOPIC, ProducerConfig,
};
pub use consumer::{Consumer, ConsumerBuilder, Decoder};
pub use message::Message;
pub use producer::{Encoder, Producer, ProducerBuilder};
