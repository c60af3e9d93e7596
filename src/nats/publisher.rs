//! Publisher adapter.
//!
//! ```text
//! encode ─► before hooks ─► publish ─► after hooks ─► Ok(Some(message))
//! ```
//!
//! Before hooks may abort the publish; after hooks only observe. Every
//! failure runs the error hooks and the error handler, then the optional
//! error transform, which may rewrite the error or swallow it. A swallowed
//! failure resolves to `Ok(None)`.

use std::sync::Arc;

use tracing::debug;

use super::connection::{Connection, NatsConfig};
use super::message::{Message, full_subject};
use crate::context::Context;
use crate::endpoint::{BoxFuture, Endpoint};
use crate::error::{BoxError, Error};
use crate::hooks::{ErrorHandler, Hooks, LogErrorHandler};

/// Fills the message payload and headers from a domain value. The subject is
/// already set.
pub type Encoder<Req> =
    Arc<dyn Fn(&Context, &mut Message, Req) -> Result<(), BoxError> + Send + Sync>;

/// Maps a failure to the error returned to the caller, or `None` to
/// suppress it.
pub type ErrorTransform = Arc<dyn Fn(&Context, Error) -> Option<Error> + Send + Sync>;

pub struct Publisher<Req> {
    inner: Arc<Inner<Req>>,
}

struct Inner<Req> {
    connection: Arc<dyn Connection>,
    subject: String,
    encoder: Encoder<Req>,
    hooks: Hooks<Message>,
    error_handler: Arc<dyn ErrorHandler>,
    transform: Option<ErrorTransform>,
}

impl<Req> Clone for Publisher<Req> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<Req: Send + 'static> Publisher<Req> {
    /// A publisher for `subject`, prefixed with `prefix` when non-empty.
    pub fn builder(
        connection: impl Connection,
        prefix: &str,
        subject: &str,
    ) -> PublisherBuilder<Req> {
        PublisherBuilder {
            connection: Arc::new(connection),
            subject: full_subject(prefix, subject),
            encoder: None,
            hooks: None,
            error_handler: None,
            transform: None,
            conflicts: Vec::new(),
        }
    }

    /// A publisher for `subject` under the configured subject prefix.
    pub fn from_config(
        connection: impl Connection,
        config: &NatsConfig,
        subject: &str,
    ) -> PublisherBuilder<Req> {
        Self::builder(connection, &config.subject_prefix, subject)
    }

    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    pub async fn publish(&self, ctx: Context, req: Req) -> Result<Option<Message>, Error> {
        let inner = &self.inner;
        let mut msg = Message::new(inner.subject.as_str());
        if let Err(e) = (inner.encoder)(&ctx, &mut msg, req) {
            return inner.fail(&ctx, None, Error::Encode(e));
        }

        match inner.send(ctx.clone(), &msg).await {
            Ok(()) => Ok(Some(msg)),
            Err(err) => inner.fail(&ctx, Some(&msg), err),
        }
    }
}

impl<Req> Inner<Req> {
    async fn send(&self, ctx: Context, msg: &Message) -> Result<(), Error> {
        let ctx = self.hooks.run_before(ctx, msg)?;

        tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(Error::Cancelled),
            res = self.connection.publish(msg) => res.map_err(Error::Transport)?,
        }
        debug!(subject = %msg.subject, bytes = msg.data.len(), "message published");

        self.hooks.run_after(ctx, msg, &());
        Ok(())
    }

    fn fail(
        &self,
        ctx: &Context,
        msg: Option<&Message>,
        err: Error,
    ) -> Result<Option<Message>, Error> {
        self.hooks.run_error(ctx, msg, &err);
        self.error_handler.handle(ctx, &err);
        let err = match &self.transform {
            Some(transform) => transform(ctx, err),
            None => Some(err),
        };
        match err {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

impl<Req: Send + 'static> Endpoint<Req, Option<Message>> for Publisher<Req> {
    fn call(&self, ctx: Context, req: Req) -> BoxFuture<Result<Option<Message>, Error>> {
        let publisher = self.clone();
        Box::pin(async move { publisher.publish(ctx, req).await })
    }
}

// ── PublisherBuilder ──────────────────────────────────────────────────────────

pub struct PublisherBuilder<Req> {
    connection: Arc<dyn Connection>,
    subject: String,
    encoder: Option<Encoder<Req>>,
    hooks: Option<Hooks<Message>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    transform: Option<ErrorTransform>,
    conflicts: Vec<&'static str>,
}

impl<Req: Send + 'static> PublisherBuilder<Req> {
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

    /// Runs before the error transform, so suppressed failures are still
    /// seen. Defaults to [`LogErrorHandler`].
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        if self.error_handler.replace(Arc::new(handler)).is_some() {
            self.conflicts.push("error_handler");
        }
        self
    }

    pub fn error_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Context, Error) -> Option<Error> + Send + Sync + 'static,
    {
        if self.transform.replace(Arc::new(transform)).is_some() {
            self.conflicts.push("error_transform");
        }
        self
    }

    pub fn build(self) -> Result<Publisher<Req>, Error> {
        if !self.conflicts.is_empty() {
            return Err(Error::config(format!(
                "publisher options set more than once: {}",
                self.conflicts.join(", ")
            )));
        }
        if self.subject.is_empty() {
            return Err(Error::config("publisher requires a subject"));
        }
        let encoder = self.encoder.ok_or_else(|| Error::config("publisher requires an encoder"))?;

        Ok(Publisher {
            inner: Arc::new(Inner {
                connection: self.connection,
                subject: self.subject,
                encoder,
                hooks: self.hooks.unwrap_or_default(),
                error_handler: self.error_handler.unwrap_or_else(|| Arc::new(LogErrorHandler)),
                transform: self.transform,
            }),
        })
    }
}
