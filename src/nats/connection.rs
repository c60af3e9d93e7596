//! Connection seam and the async-nats implementation.

use std::time::Duration;

use async_nats::{Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::message::Message;
use crate::error::{BoxError, Error};

pub const DEFAULT_URL: &str = "nats://127.0.0.1:4222";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_RECONNECTS: usize = 60;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 120_000;

/// Publishes one message. Must tolerate concurrent callers.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn publish(&self, msg: &Message) -> Result<(), BoxError>;
}

#[async_trait]
impl Connection for Client {
    async fn publish(&self, msg: &Message) -> Result<(), BoxError> {
        if msg.headers.is_empty() {
            Client::publish(self, msg.subject.clone(), msg.data.clone()).await?;
            return Ok(());
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &msg.headers {
            headers.append(name.as_str(), value.as_str());
        }
        self.publish_with_headers(msg.subject.clone(), headers, msg.data.clone())
            .await?;
        Ok(())
    }
}

// ── NatsConfig ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NatsConfig {
    pub url: String,
    /// Prepended to every publisher subject as `prefix.subject`.
    pub subject_prefix: String,
    pub connect_timeout_ms: u64,
    pub max_reconnects: usize,
    pub ping_interval_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            subject_prefix: String::new(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
        }
    }
}

impl NatsConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.url.trim().is_empty() {
            return Err(Error::config("nats url must not be empty"));
        }
        if self.subject_prefix.starts_with('.') || self.subject_prefix.ends_with('.') {
            return Err(Error::config(format!(
                "subject prefix `{}` must not start or end with a dot",
                self.subject_prefix
            )));
        }
        if self.connect_timeout_ms == 0 || self.ping_interval_ms == 0 {
            return Err(Error::config("connect timeout and ping interval must be positive"));
        }
        Ok(())
    }
}

/// Connects to the server at `config.url`.
pub async fn connect(config: &NatsConfig) -> Result<Client, Error> {
    config.validate()?;

    let client = ConnectOptions::new()
        .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_reconnects(config.max_reconnects)
        .ping_interval(Duration::from_millis(config.ping_interval_ms))
        .connect(config.url.as_str())
        .await
        .map_err(|e| Error::Transport(e.into()))?;

    info!(url = %config.url, "nats connected");
    Ok(client)
}
