//! Outbound round trip.
//!
//! The proxy never talks to a socket directly. It hands the rewritten request
//! to a [`RoundTripper`], which owns connection pooling and keep-alive. The
//! default is [`HttpTransport`], a pooled hyper client; tests substitute an
//! in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use http::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;

use super::body::Body;
use crate::error::BoxError;

/// Executes one request/response exchange.
///
/// Implementations must be safe for concurrent use: the proxy shares one
/// instance across every in-flight request.
#[async_trait]
pub trait RoundTripper: Send + Sync + 'static {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, BoxError>;
}

// ── TransportConfig ───────────────────────────────────────────────────────────

/// Connection settings for [`HttpTransport::with_config`].
///
/// Durations are in milliseconds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub dial_timeout_ms: u64,
    pub keep_alive_ms: u64,
    pub idle_conn_timeout_ms: u64,
    pub max_idle_conns: usize,
}

pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 30_000;
pub const DEFAULT_IDLE_CONN_TIMEOUT_MS: u64 = 90_000;
pub const DEFAULT_MAX_IDLE_CONNS: usize = 100;

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
            keep_alive_ms: DEFAULT_KEEP_ALIVE_MS,
            idle_conn_timeout_ms: DEFAULT_IDLE_CONN_TIMEOUT_MS,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
        }
    }
}

// ── HttpTransport ─────────────────────────────────────────────────────────────

/// Pooled HTTP/1.1 client transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    /// hyper's defaults: no dial timeout, pooled idle connections.
    pub fn new() -> Self {
        Self { client: Client::builder(TokioExecutor::new()).build_http() }
    }

    pub fn with_config(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.dial_timeout_ms)));
        connector.set_keepalive(Some(Duration::from_millis(config.keep_alive_ms)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_millis(config.idle_conn_timeout_ms))
            .pool_max_idle_per_host(config.max_idle_conns)
            .build(connector);
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundTripper for HttpTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, BoxError> {
        let response = self.client.request(req).await?;
        Ok(response.map(Body::new))
    }
}
