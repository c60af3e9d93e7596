//! Producer adapter: a domain value in, a broker write out.
//!
//! [`Producer`] is itself an [`Endpoint`], so the same middleware that wraps
//! a consumer's endpoint can wrap a producer:
//!
//! ```text
//! encode ─► before hooks ─► write ─► after hooks ─► Ok(message)
//! ```
//!
//! Unlike the consumer loop, every failure propagates to the caller, after
//! the error hooks and the error handler have seen it.

use std::sync::Arc;

use tracing::debug;

use super::client::{KafkaWriter, Writer};
use super::config::ProducerConfig;
use super::message::Message;
use crate::context::Context;
use crate::endpoint::{BoxFuture, Endpoint};
use crate::error::{BoxError, Error};
use crate::hooks::{ErrorHandler, Hooks, LogErrorHandler};

/// Fills an outgoing message (pre-set to the producer's topic) from a
/// domain value.
pub type Encoder<Req> =
    Arc<dyn Fn(&Context, &mut Message, Req) -> Result<(), BoxError> + Send + Sync>;

/// Cheap to clone; clones share the writer.
pub struct Producer<Req> {
    inner: Arc<Inner<Req>>,
}

struct Inner<Req> {
    writer: Arc<dyn Writer>,
    encoder: Encoder<Req>,
    hooks: Hooks<Message>,
    error_handler: Arc<dyn ErrorHandler>,
    topic: String,
}

impl<Req> Clone for Producer<Req> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<Req: Send + 'static> Producer<Req> {
    pub fn builder(config: ProducerConfig) -> ProducerBuilder<Req> {
        ProducerBuilder {
            config,
            writer: None,
            encoder: None,
            hooks: None,
            error_handler: None,
            conflicts: Vec::new(),
        }
    }

    /// Encodes, writes and returns the written message.
    pub async fn produce(&self, ctx: Context, req: Req) -> Result<Message, Error> {
        let inner = &self.inner;
        let mut msg = Message::new(inner.topic.as_str());
        if let Err(e) = (inner.encoder)(&ctx, &mut msg, req) {
            return Err(inner.fail(&ctx, None, Error::Encode(e)));
        }

        match inner.write(ctx.clone(), &msg).await {
            Ok(()) => Ok(msg),
            Err(err) => Err(inner.fail(&ctx, Some(&msg), err)),
        }
    }
}

impl<Req> Inner<Req> {
    async fn write(&self, ctx: Context, msg: &Message) -> Result<(), Error> {
        let ctx = self.hooks.run_before(ctx, msg)?;

        tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(Error::Cancelled),
            res = self.writer.write_message(msg) => res.map_err(Error::Transport)?,
        }
        debug!(topic = %msg.topic, "message written");

        self.hooks.run_after(ctx, msg, &());
        Ok(())
    }

    fn fail(&self, ctx: &Context, msg: Option<&Message>, err: Error) -> Error {
        self.hooks.run_error(ctx, msg, &err);
        self.error_handler.handle(ctx, &err);
        err
    }
}

impl<Req: Send + 'static> Endpoint<Req, Message> for Producer<Req> {
    fn call(&self, ctx: Context, req: Req) -> BoxFuture<Result<Message, Error>> {
        let producer = self.clone();
        Box::pin(async move { producer.produce(ctx, req).await })
    }
}

// ── ProducerBuilder ───────────────────────────────────────────────────────────

/// Builder for [`Producer`]. Fails on a missing encoder or an option set
/// twice, before any broker client is created.
pub struct ProducerBuilder<Req> {
    config: ProducerConfig,
    writer: Option<Arc<dyn Writer>>,
    encoder: Option<Encoder<Req>>,
    hooks: Option<Hooks<Message>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    conflicts: Vec<&'static str>,
}

impl<Req: Send + 'static> ProducerBuilder<Req> {
    /// Substitutes the broker client. Without one, `build` creates a
    /// [`KafkaWriter`] from the configuration.
    pub fn writer(mut self, writer: impl Writer) -> Self {
        if self.writer.replace(Arc::new(writer)).is_some() {
            self.conflicts.push("writer");
        }
        self
    }

    pub fn encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&Context, &mut Message, Req) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        if self.encoder.replace(Arc::new(encoder)).is_some() {
            self.conflicts.push("encoder");
        }
        self
    }

    pub fn hooks(mut self, hooks: Hooks<Message>) -> Self {
        if self.hooks.replace(hooks).is_some() {
            self.conflicts.push("hooks");
        }
        self
    }

    /// Defaults to [`LogErrorHandler`].
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        if self.error_handler.replace(Arc::new(handler)).is_some() {
            self.conflicts.push("error_handler");
        }
        self
    }

    pub fn build(self) -> Result<Producer<Req>, Error> {
        if !self.conflicts.is_empty() {
            return Err(Error::config(format!(
                "producer options set more than once: {}",
                self.conflicts.join(", ")
            )));
        }
        let encoder = self.encoder.ok_or_else(|| Error::config("producer requires an encoder"))?;
        self.config.validate()?;

        let writer = match self.writer {
            Some(writer) => writer,
            None => Arc::new(KafkaWriter::new(&self.config)?),
        };

        Ok(Producer {
            inner: Arc::new(Inner {
                writer,
                encoder,
                hooks: self.hooks.unwrap_or_default(),
                error_handler: self.error_handler.unwrap_or_else(|| Arc::new(LogErrorHandler)),
                topic: self.config.topic,
            }),
        })
    }
}
