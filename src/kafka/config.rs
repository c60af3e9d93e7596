//! Consumer and producer configuration.
//!
//! Defaults are named constants materialized through `Default`, never
//! process-wide mutable state. Both structures reject unknown keys when
//! deserialized and are checked with `validate` before any client is built.

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_BROKER: &str = "localhost:9092";
pub const DEFAULT_TOPIC: &str = "switchyard";
pub const DEFAULT_GROUP_ID: &str = "switchyard";
pub const DEFAULT_MIN_BYTES: usize = 1;
pub const DEFAULT_MAX_BYTES: usize = 1_048_576;
pub const DEFAULT_COMMIT_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_BYTES: usize = 1_048_576;
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 5;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

fn default_brokers() -> Vec<String> {
    vec![DEFAULT_BROKER.to_owned()]
}

fn check_brokers(brokers: &[String]) -> Result<(), Error> {
    if brokers.is_empty() || brokers.iter().any(|b| b.trim().is_empty()) {
        return Err(Error::config("broker list must contain non-empty addresses"));
    }
    Ok(())
}

// ── ConsumerConfig ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    pub brokers: Vec<String>,
    pub group_id: String,
    pub topic: String,
    pub min_bytes: usize,
    pub max_bytes: usize,
    /// `true`: fetching a message commits it. `false`: the consumer commits
    /// each message after it was processed successfully.
    pub autocommit: bool,
    /// Autocommit flush interval. Only meaningful with `autocommit`.
    pub commit_interval_ms: Option<u64>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            group_id: DEFAULT_GROUP_ID.to_owned(),
            topic: DEFAULT_TOPIC.to_owned(),
            min_bytes: DEFAULT_MIN_BYTES,
            max_bytes: DEFAULT_MAX_BYTES,
            autocommit: false,
            commit_interval_ms: None,
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        check_brokers(&self.brokers)?;
        if self.group_id.is_empty() {
            return Err(Error::config("consumer group id must not be empty"));
        }
        if self.topic.is_empty() {
            return Err(Error::config("consumer topic must not be empty"));
        }
        if self.min_bytes > self.max_bytes {
            return Err(Error::config(format!(
                "min_bytes ({}) exceeds max_bytes ({})",
                self.min_bytes, self.max_bytes
            )));
        }
        if !self.autocommit && self.commit_interval_ms.is_some() {
            return Err(Error::config(
                "commit_interval_ms conflicts with manual commit; enable autocommit or drop it",
            ));
        }
        Ok(())
    }

    pub fn commit_interval_ms(&self) -> u64 {
        self.commit_interval_ms.unwrap_or(DEFAULT_COMMIT_INTERVAL_MS)
    }
}

// ── Balancer ──────────────────────────────────────────────────────────────────

/// Partition-selection policy for produced messages.
///
/// Keyed messages always land on a partition derived from the key hash;
/// keyless messages are spread randomly.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Balancer {
    /// Ignore the key; pick a random partition.
    Random,
    /// CRC32 of the key.
    Crc32,
    /// Murmur2 of the key, compatible with the Java client.
    #[default]
    Murmur2,
    /// FNV-1a of the key.
    Fnv1a,
}

impl Balancer {
    /// The librdkafka `partitioner` value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Crc32 => "consistent_random",
            Self::Murmur2 => "murmur2_random",
            Self::Fnv1a => "fnv1a_random",
        }
    }
}

// ── ProducerConfig ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub balancer: Balancer,
    /// Delivery attempts per message, the first one included.
    pub max_attempts: u32,
    /// Messages the client may buffer before writes start failing.
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub batch_bytes: usize,
    pub batch_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: DEFAULT_TOPIC.to_owned(),
            balancer: Balancer::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_bytes: DEFAULT_BATCH_BYTES,
            batch_timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl ProducerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        check_brokers(&self.brokers)?;
        if self.topic.is_empty() {
            return Err(Error::config("producer topic must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.batch_size == 0 || self.batch_bytes == 0 {
            return Err(Error::config("batch_size and batch_bytes must be positive"));
        }
        if self.queue_capacity < self.batch_size {
            return Err(Error::config(format!(
                "queue_capacity ({}) is smaller than batch_size ({})",
                self.queue_capacity, self.batch_size
            )));
        }
        Ok(())
    }
}
