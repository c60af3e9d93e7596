//! Before / after / error hooks.
//!
//! Every message adapter runs the same protocol around its core transform:
//!
//! ```text
//! before hooks ──► transform ──► after hooks
//!      │               │
//!      └──── error ────┴──► error hooks ──► error handler
//! ```
//!
//! Only the message type changes per transport: [`kafka::Message`] for the
//! consumer and producer, [`nats::Message`] for the publisher. Hook lists
//! are fixed when the adapter is built and always run in registration order.
//!
//! [`kafka::Message`]: crate::kafka::Message
//! [`nats::Message`]: crate::nats::Message

use std::sync::Arc;

use tracing::error;

use crate::context::Context;
use crate::error::{BoxError, Error};

/// Runs before the core transform. May enrich the context or abort the
/// pipeline.
pub type BeforeHook<M> = Arc<dyn Fn(Context, &M) -> Result<Context, BoxError> + Send + Sync>;

/// Runs after the core transform succeeded. Cannot abort.
pub type AfterHook<M, R> = Arc<dyn Fn(Context, &M, &R) -> Context + Send + Sync>;

/// Observes a failure. `None` when no message existed yet (a failed fetch
/// or a failed encode).
pub type ErrorHook<M> = Arc<dyn Fn(&Context, Option<&M>, &Error) + Send + Sync>;

// ── Hooks ─────────────────────────────────────────────────────────────────────

/// The ordered hook lists of one adapter.
pub struct Hooks<M, R = ()> {
    before: Vec<BeforeHook<M>>,
    after: Vec<AfterHook<M, R>>,
    errors: Vec<ErrorHook<M>>,
}

impl<M, R> Hooks<M, R> {
    pub fn builder() -> HooksBuilder<M, R> {
        HooksBuilder { hooks: Self::default() }
    }

    /// Threads `ctx` through every before hook. The first failure stops the
    /// chain and is returned as [`Error::Hook`].
    pub fn run_before(&self, ctx: Context, msg: &M) -> Result<Context, Error> {
        self.before
            .iter()
            .try_fold(ctx, |ctx, hook| hook(ctx, msg))
            .map_err(Error::Hook)
    }

    pub fn run_after(&self, ctx: Context, msg: &M, resp: &R) -> Context {
        self.after.iter().fold(ctx, |ctx, hook| hook(ctx, msg, resp))
    }

    pub fn run_error(&self, ctx: &Context, msg: Option<&M>, err: &Error) {
        for hook in &self.errors {
            hook(ctx, msg, err);
        }
    }
}

impl<M, R> Default for Hooks<M, R> {
    fn default() -> Self {
        Self { before: Vec::new(), after: Vec::new(), errors: Vec::new() }
    }
}

impl<M, R> Clone for Hooks<M, R> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            after: self.after.clone(),
            errors: self.errors.clone(),
        }
    }
}

// ── HooksBuilder ──────────────────────────────────────────────────────────────

/// Collects hooks in registration order. Each call returns `self` so
/// registrations chain naturally.
pub struct HooksBuilder<M, R = ()> {
    hooks: Hooks<M, R>,
}

impl<M, R> HooksBuilder<M, R> {
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(Context, &M) -> Result<Context, BoxError> + Send + Sync + 'static,
    {
        self.hooks.before.push(Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(Context, &M, &R) -> Context + Send + Sync + 'static,
    {
        self.hooks.after.push(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context, Option<&M>, &Error) + Send + Sync + 'static,
    {
        self.hooks.errors.push(Arc::new(hook));
        self
    }

    pub fn build(self) -> Hooks<M, R> {
        self.hooks
    }
}

// ── ErrorHandler ──────────────────────────────────────────────────────────────

/// Secondary error observer, run after the error hooks.
///
/// Where the error hooks see the message, a handler only sees the failure;
/// it is the place to forward errors to a logger or an alerting sink.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, ctx: &Context, err: &Error);
}

impl<F> ErrorHandler for F
where
    F: Fn(&Context, &Error) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &Context, err: &Error) {
        self(ctx, err)
    }
}

/// Default handler: one `error`-level event per failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, _ctx: &Context, err: &Error) {
        error!(error = %err, "message pipeline failed");
    }
}
