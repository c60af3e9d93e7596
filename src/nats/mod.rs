//! NATS publisher adapter.
//!
//! [`Publisher`] is an endpoint publishing one message per call on a fixed
//! subject. [`connect`] builds the default [`Connection`], an
//! `async_nats::Client`.

mod connection;
mod message;
mod publisher;

pub use connection::{Connection, NatsConfig, connect};
pub use message::{Message, full_subject};
pub use publisher::{Encoder, ErrorTransform, Publisher, PublisherBuilder};
