//! Middleware layer.
//!
//! Middleware wraps one endpoint in another and is the right place for
//! cross-cutting concerns: structured tracing, metrics, request validation.
//!
//! Composition order belongs to the caller. [`chain`] applies its list
//! outermost-first, so the last middleware in the list runs closest to the
//! endpoint:
//!
//! ```text
//! chain(vec![trace, validate])(endpoint)  ==  trace(validate(endpoint))
//! ```
//!
//! Built-in middleware:
//! - [`trace`] — per-call span with endpoint name, latency and outcome
//! - [`validate`] — rejects requests whose [`Validate`] check fails

mod trace;
mod validate;

pub use trace::trace;
pub use validate::{Validate, validate};

use std::sync::Arc;

use crate::endpoint::BoxedEndpoint;

/// A transform from one endpoint to another.
pub type Middleware<Req, Resp> =
    Arc<dyn Fn(BoxedEndpoint<Req, Resp>) -> BoxedEndpoint<Req, Resp> + Send + Sync>;

/// Composes `middlewares` into one, outermost first.
pub fn chain<Req, Resp>(middlewares: Vec<Middleware<Req, Resp>>) -> Middleware<Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    Arc::new(move |endpoint| {
        middlewares
            .iter()
            .rev()
            .fold(endpoint, |inner, middleware| middleware(inner))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::context::Context;
    use crate::endpoint::Endpoint;
    use crate::error::Error;

    fn tag(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Middleware<(), ()> {
        Arc::new(move |next: BoxedEndpoint<(), ()>| {
            let log = Arc::clone(&log);
            BoxedEndpoint::new(move |ctx: Context, req: ()| {
                let next = next.clone();
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(name);
                    next.call(ctx, req).await
                }
            })
        })
    }

    #[tokio::test]
    async fn last_registered_runs_closest_to_endpoint() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let core_log = Arc::clone(&log);
        let core = BoxedEndpoint::new(move |_ctx: Context, _req: ()| {
            let log = Arc::clone(&core_log);
            async move {
                log.lock().unwrap().push("endpoint");
                Ok::<_, Error>(())
            }
        });

        let stack = chain(vec![
            tag("outer", Arc::clone(&log)),
            tag("inner", Arc::clone(&log)),
        ]);
        stack(core).call(Context::new(), ()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner", "endpoint"]);
    }

    #[tokio::test]
    async fn empty_chain_is_identity() {
        let core = BoxedEndpoint::new(|_ctx: Context, n: u8| async move { Ok::<_, Error>(n) });
        let wrapped = chain(Vec::new())(core);
        assert_eq!(wrapped.call(Context::new(), 7).await.unwrap(), 7);
    }
}
