//! File-level settings.
//!
//! One TOML document configures every adapter a service runs. Each section
//! is optional; present sections are validated as a whole when loaded, and
//! unknown keys anywhere are rejected rather than ignored.
//!
//! ```toml
//! [proxy]
//! url = "http://orders.internal:8080/api"
//!
//! [proxy.transport]
//! dial_timeout_ms = 5000
//!
//! [consumer]
//! brokers = ["kafka-1:9092", "kafka-2:9092"]
//! group_id = "billing"
//! topic = "orders"
//!
//! [nats]
//! url = "nats://nats.internal:4222"
//! subject_prefix = "gb"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::kafka::{ConsumerConfig, ProducerConfig};
use crate::nats::NatsConfig;
use crate::proxy::ProxyConfig;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub proxy: Option<ProxyConfig>,
    pub consumer: Option<ConsumerConfig>,
    pub producer: Option<ProducerConfig>,
    pub nats: Option<NatsConfig>,
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let settings: Self =
            toml::from_str(s).map_err(|e| Error::config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            Error::Configuration(msg) => Error::config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        if let Some(consumer) = &self.consumer {
            consumer.validate()?;
        }
        if let Some(producer) = &self.producer {
            producer.validate()?;
        }
        if let Some(nats) = &self.nats {
            nats.validate()?;
        }
        Ok(())
    }
}
