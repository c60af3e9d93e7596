//! The endpoint contract and its type erasure.
//!
//! # How endpoints are stored
//!
//! Adapters hold endpoints of *different* concrete types (an `async fn`, a
//! closure, a [`ReverseProxy`](crate::proxy::ReverseProxy), a
//! [`Producer`](crate::kafka::Producer)) behind one shape, so middleware can
//! wrap any of them. The chain from user code to vtable call is:
//!
//! ```text
//! async fn place(ctx: Context, req: Order) -> Result<Receipt, Error> { … }
//!        ↓ BoxedEndpoint::new(place)
//! Arc::new(place)                       ← stored as Arc<dyn Endpoint<Order, Receipt>>
//!        ↓
//! endpoint.call(ctx, req)               ← one vtable dispatch per call
//!        ↓
//! Box::pin(place(ctx, req))             ← BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` lets tokio move the future across threads; endpoints
/// clone what they need out of `&self` before building it.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

// ── Endpoint trait ────────────────────────────────────────────────────────────

/// A unit of request/response logic, independent of any transport.
///
/// Implemented automatically for every function or closure with the shape
///
/// ```text
/// Fn(Context, Req) -> impl Future<Output = Result<Resp, Error>>
/// ```
///
/// and by the transport adapters that are themselves endpoints (the reverse
/// proxy, the Kafka producer, the NATS publisher).
pub trait Endpoint<Req, Resp>: Send + Sync + 'static {
    fn call(&self, ctx: Context, req: Req) -> BoxFuture<Result<Resp, Error>>;
}

impl<F, Fut, Req, Resp> Endpoint<Req, Resp> for F
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Error>> + Send + 'static,
{
    fn call(&self, ctx: Context, req: Req) -> BoxFuture<Result<Resp, Error>> {
        Box::pin((self)(ctx, req))
    }
}

// ── BoxedEndpoint ─────────────────────────────────────────────────────────────

/// A shared, type-erased endpoint.
///
/// Cloning costs one atomic increment. This is the currency middleware
/// trades in: it takes a `BoxedEndpoint` and returns another one.
pub struct BoxedEndpoint<Req, Resp>(Arc<dyn Endpoint<Req, Resp>>);

impl<Req, Resp> BoxedEndpoint<Req, Resp> {
    pub fn new(endpoint: impl Endpoint<Req, Resp>) -> Self {
        Self(Arc::new(endpoint))
    }
}

impl<Req, Resp> Clone for BoxedEndpoint<Req, Resp> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<Req: 'static, Resp: 'static> Endpoint<Req, Resp> for BoxedEndpoint<Req, Resp> {
    fn call(&self, ctx: Context, req: Req) -> BoxFuture<Result<Resp, Error>> {
        self.0.call(ctx, req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn double(_ctx: Context, n: u32) -> Result<u32, Error> {
        Ok(n * 2)
    }

    #[tokio::test]
    async fn async_fn_is_an_endpoint() {
        let ep = BoxedEndpoint::new(double);
        assert_eq!(ep.call(Context::new(), 21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn closure_errors_propagate() {
        let ep = BoxedEndpoint::new(|_ctx: Context, _req: ()| async {
            Err::<(), _>(Error::endpoint("out of stock"))
        });
        let err = ep.call(Context::new(), ()).await.unwrap_err();
        assert!(matches!(err, Error::Endpoint(_)));
        assert_eq!(err.to_string(), "endpoint: out of stock");
    }
}
