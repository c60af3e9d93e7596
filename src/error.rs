//! Unified error type.

use thiserror::Error;

/// Boxed error produced by collaborators: decoders, encoders, hooks,
/// transports and broker clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by switchyard's fallible operations.
///
/// Each variant names the pipeline stage that failed, so a proxy caller can
/// tell "build path", "request options", "dial" and "response options"
/// failures apart, and a consumer error hook can tell a decode failure from
/// a commit failure.
#[derive(Debug, Error)]
pub enum Error {
    /// A required collaborator is missing or the configuration is
    /// inconsistent. Raised at construction, before any I/O.
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("build path failed: {0}")]
    BuildPath(#[source] BoxError),

    #[error("request options failed: {0}")]
    RequestOptions(#[source] BoxError),

    #[error("dial request {url} failed: {source}")]
    Dial {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("response options failed: {0}")]
    ResponseOptions(#[source] BoxError),

    /// Broker or connection I/O failure (fetch, write, publish).
    #[error("transport: {0}")]
    Transport(#[source] BoxError),

    /// A before hook rejected the message.
    #[error("before hook failed: {0}")]
    Hook(#[source] BoxError),

    #[error("decode: {0}")]
    Decode(#[source] BoxError),

    #[error("encode: {0}")]
    Encode(#[source] BoxError),

    /// Domain-logic failure raised by an endpoint.
    #[error("endpoint: {0}")]
    Endpoint(#[source] BoxError),

    #[error("commit offset {offset} on {topic}/{partition}: {source}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: BoxError,
    },

    /// Request rejected by the validation middleware.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps a domain failure raised inside an endpoint.
    pub fn endpoint(err: impl Into<BoxError>) -> Self {
        Self::Endpoint(err.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
