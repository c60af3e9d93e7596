//! Consumer adapter: broker messages in, endpoint calls out.
//!
//! One [`Consumer`] runs one sequential loop. Scale out by running more
//! instances in the same group; the broker spreads partitions across them.
//!
//! # Per-message pipeline
//!
//! ```text
//! fetch ─► before hooks ─► decode ─► endpoint ─► after hooks ─► commit (manual mode)
//! ```
//!
//! A failure at any stage runs the error hooks and the error handler, skips
//! the remaining stages for that message and moves on to the next fetch.
//!
//! In manual mode only the failed message's own commit is skipped. Kafka
//! tracks one committed offset per partition, so the next message that
//! succeeds on the same partition commits past the failure. Handlers that
//! must not lose a message record it from an error hook (a dead-letter
//! topic, a retry table).
//!
//! # Cancellation
//!
//! Every message gets a [`Context`] whose token is a child of the consumer's
//! token (see [`ConsumerBuilder::cancellation_token`]). Cancelling that token
//! stops the loop and cancels the message in flight, so a producer write or
//! a publish inside the endpoint returns [`Error::Cancelled`].

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::{KafkaReader, Reader};
use super::config::ConsumerConfig;
use super::message::Message;
use crate::context::Context;
use crate::endpoint::{BoxedEndpoint, Endpoint};
use crate::error::{BoxError, Error};
use crate::hooks::{ErrorHandler, Hooks, LogErrorHandler};

/// Turns a fetched message into a domain request.
pub type Decoder<Req> = Arc<dyn Fn(&Context, &Message) -> Result<Req, BoxError> + Send + Sync>;

pub struct Consumer<Req, Resp> {
    reader: Arc<dyn Reader>,
    decoder: Decoder<Req>,
    endpoint: BoxedEndpoint<Req, Resp>,
    hooks: Hooks<Message, Resp>,
    error_handler: Arc<dyn ErrorHandler>,
    token: CancellationToken,
    autocommit: bool,
    topic: String,
    group_id: String,
}

impl<Req, Resp> Consumer<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    pub fn builder(config: ConsumerConfig) -> ConsumerBuilder<Req, Resp> {
        ConsumerBuilder {
            config,
            reader: None,
            decoder: None,
            endpoint: None,
            hooks: None,
            error_handler: None,
            token: None,
            conflicts: Vec::new(),
        }
    }

    /// Consumes until the process exits or the consumer's token is
    /// cancelled.
    pub async fn run(&self) {
        self.run_until(std::future::pending()).await;
    }

    /// Consumes until `shutdown` resolves or the consumer's token is
    /// cancelled. A pending fetch is abandoned. After `shutdown`, a message
    /// already fetched is processed to completion first.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        info!(
            topic = %self.topic,
            group = %self.group_id,
            autocommit = self.autocommit,
            "consumer started"
        );
        tokio::pin!(shutdown);

        loop {
            let fetched = tokio::select! {
                biased;
                () = &mut shutdown => break,
                () = self.token.cancelled() => break,
                fetched = self.reader.fetch_message() => fetched,
            };
            let ctx = Context::with_token(self.token.child_token());

            match fetched {
                Ok(msg) => {
                    debug!(partition = msg.partition, offset = msg.offset, "message fetched");
                    if let Err(err) = self.process(ctx.clone(), &msg).await {
                        self.report(&ctx, Some(&msg), err);
                    }
                }
                Err(e) => self.report(&ctx, None, Error::Transport(e)),
            }
        }

        info!(topic = %self.topic, group = %self.group_id, "consumer stopped");
    }

    async fn process(&self, ctx: Context, msg: &Message) -> Result<(), Error> {
        let ctx = self.hooks.run_before(ctx, msg)?;
        let req = (self.decoder)(&ctx, msg).map_err(Error::Decode)?;
        let resp = self.endpoint.call(ctx.clone(), req).await?;
        self.hooks.run_after(ctx, msg, &resp);

        if !self.autocommit {
            self.reader.commit_message(msg).await.map_err(|source| Error::Commit {
                topic: msg.topic.clone(),
                partition: msg.partition,
                offset: msg.offset,
                source,
            })?;
        }
        Ok(())
    }

    fn report(&self, ctx: &Context, msg: Option<&Message>, err: Error) {
        self.hooks.run_error(ctx, msg, &err);
        self.error_handler.handle(ctx, &err);
    }
}

// ── ConsumerBuilder ───────────────────────────────────────────────────────────

/// Builder for [`Consumer`].
///
/// [`build`](ConsumerBuilder::build) checks every collaborator before it
/// creates a broker client, so a missing decoder or endpoint fails without
/// any network activity. Setting an option twice is a configuration error,
/// not a silent overwrite.
pub struct ConsumerBuilder<Req, Resp> {
    config: ConsumerConfig,
    reader: Option<Arc<dyn Reader>>,
    decoder: Option<Decoder<Req>>,
    endpoint: Option<BoxedEndpoint<Req, Resp>>,
    hooks: Option<Hooks<Message, Resp>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    token: Option<CancellationToken>,
    conflicts: Vec<&'static str>,
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    name: &'static str,
    conflicts: &mut Vec<&'static str>,
) {
    if slot.is_some() {
        conflicts.push(name);
    }
    *slot = Some(value);
}

impl<Req, Resp> ConsumerBuilder<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    /// Substitutes the broker client. Without one, `build` creates a
    /// [`KafkaReader`] from the configuration.
    pub fn reader(mut self, reader: impl Reader) -> Self {
        let reader: Arc<dyn Reader> = Arc::new(reader);
        set_once(&mut self.reader, reader, "reader", &mut self.conflicts);
        self
    }

    pub fn decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&Context, &Message) -> Result<Req, BoxError> + Send + Sync + 'static,
    {
        let decoder: Decoder<Req> = Arc::new(decoder);
        set_once(&mut self.decoder, decoder, "decoder", &mut self.conflicts);
        self
    }

    pub fn endpoint(mut self, endpoint: impl Endpoint<Req, Resp>) -> Self {
        let endpoint = BoxedEndpoint::new(endpoint);
        set_once(&mut self.endpoint, endpoint, "endpoint", &mut self.conflicts);
        self
    }

    pub fn hooks(mut self, hooks: Hooks<Message, Resp>) -> Self {
        set_once(&mut self.hooks, hooks, "hooks", &mut self.conflicts);
        self
    }

    /// Defaults to [`LogErrorHandler`].
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        let handler: Arc<dyn ErrorHandler> = Arc::new(handler);
        set_once(&mut self.error_handler, handler, "error_handler", &mut self.conflicts);
        self
    }

    /// Parent token of every per-message context. Cancelling it stops the
    /// loop. Defaults to a token nobody else holds.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        set_once(&mut self.token, token, "cancellation_token", &mut self.conflicts);
        self
    }

    pub fn build(self) -> Result<Consumer<Req, Resp>, Error> {
        if !self.conflicts.is_empty() {
            return Err(Error::config(format!(
                "consumer options set more than once: {}",
                self.conflicts.join(", ")
            )));
        }
        let decoder = self.decoder.ok_or_else(|| Error::config("consumer requires a decoder"))?;
        let endpoint = self.endpoint.ok_or_else(|| Error::config("consumer requires an endpoint"))?;
        self.config.validate()?;

        let reader = match self.reader {
            Some(reader) => reader,
            None => Arc::new(KafkaReader::new(&self.config)?),
        };

        Ok(Consumer {
            reader,
            decoder,
            endpoint,
            hooks: self.hooks.unwrap_or_default(),
            error_handler: self.error_handler.unwrap_or_else(|| Arc::new(LogErrorHandler)),
            token: self.token.unwrap_or_default(),
            autocommit: self.config.autocommit,
            topic: self.config.topic,
            group_id: self.config.group_id,
        })
    }
}
