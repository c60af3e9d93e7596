//! # switchyard
//!
//! Write request/response logic once as an [`Endpoint`]. Run it behind an
//! HTTP reverse proxy, feed it from Kafka, or publish its results to Kafka
//! and NATS.
//!
//! ## The contract
//!
//! An endpoint takes a [`Context`] and a request and returns a response or
//! an [`Error`]. It knows nothing about the transport. Everything else in
//! this crate is an adapter around that contract:
//!
//! - [`proxy::ReverseProxy`] — rewrites an inbound HTTP request for a
//!   downstream origin, runs the round trip, sanitizes the response.
//! - [`kafka::Consumer`] — fetch, decode, call the endpoint, commit.
//!   Per-message failures are reported and the loop carries on.
//! - [`kafka::Producer`] / [`nats::Publisher`] — endpoints themselves:
//!   encode a value and write or publish it.
//!
//! Cross-cutting concerns go in [`middleware`] (around the endpoint) or in
//! [`hooks`] (around the message pipelines).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::proxy::{ProxyConfig, ReverseProxy};
//! use switchyard::{Server, middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), switchyard::Error> {
//!     let proxy = ReverseProxy::builder(ProxyConfig::new("http://orders.internal:8080/api"))
//!         .request_option(|req| {
//!             req.headers_mut().insert("x-edge", "switchyard".parse()?);
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     let app = middleware::trace("orders-proxy")(switchyard::BoxedEndpoint::new(proxy));
//!     Server::bind("0.0.0.0:3000").await?.serve(app).await
//! }
//! ```

mod context;
mod endpoint;
mod error;
mod server;

pub mod config;
pub mod hooks;
pub mod kafka;
pub mod middleware;
pub mod nats;
pub mod proxy;

pub use context::Context;
pub use endpoint::{BoxFuture, BoxedEndpoint, Endpoint};
pub use error::{BoxError, Error};
pub use server::{Server, shutdown_signal};
