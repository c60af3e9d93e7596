//! Per-call tracing span.

use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, Span, debug, field, info_span, warn};

use super::Middleware;
use crate::context::Context;
use crate::endpoint::{BoxedEndpoint, Endpoint};

/// Wraps an endpoint in an `endpoint` span carrying `name`, the call latency
/// and whether it succeeded. Failures are logged at `warn`.
pub fn trace<Req, Resp>(name: &'static str) -> Middleware<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    Arc::new(move |next: BoxedEndpoint<Req, Resp>| {
        BoxedEndpoint::new(move |ctx: Context, req: Req| {
            let next = next.clone();
            let span = info_span!(
                "endpoint",
                endpoint = name,
                latency_ms = field::Empty,
                ok = field::Empty,
            );
            async move {
                let started = Instant::now();
                let result = next.call(ctx, req).await;

                let span = Span::current();
                span.record("latency_ms", started.elapsed().as_millis() as u64);
                span.record("ok", result.is_ok());
                match &result {
                    Ok(_) => debug!("endpoint call succeeded"),
                    Err(e) => warn!(error = %e, "endpoint call failed"),
                }
                result
            }
            .instrument(span)
        })
    })
}
