//! Per-operation context.
//!
//! A [`Context`] travels with every request through hooks, middleware and
//! the endpoint. It carries two things:
//!
//! - a cancellation token, so a caller can abort an in-flight round trip,
//!   write or publish;
//! - typed extensions, the request-scoped values a before hook records for
//!   later stages (a trace id, a tenant, a start instant).

use http::Extensions;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    extensions: Extensions,
}

impl Context {
    /// A fresh context that is never cancelled unless [`cancel`](Self::cancel)
    /// is called on it or one of its clones.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token, extensions: Extensions::new() }
    }

    /// A child context: cancelled when `self` is, cancellable on its own
    /// without affecting `self`. Extensions are copied.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            extensions: self.extensions.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns the context with `value` stored, replacing any previous value
    /// of the same type.
    pub fn with_value<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TraceId(&'static str);

    #[test]
    fn values_are_typed_and_replaced() {
        let ctx = Context::new().with_value(TraceId("a")).with_value(TraceId("b"));
        assert_eq!(ctx.value::<TraceId>(), Some(&TraceId("b")));
        assert_eq!(ctx.value::<u32>(), None);
    }

    #[test]
    fn child_follows_parent_cancellation_only() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
