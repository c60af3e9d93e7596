//! Request validation.
//!
//! Field-level rules live on the request type itself through [`Validate`].
//! The middleware only decides *when* they run: before the endpoint, so a
//! malformed request never reaches domain logic.

use std::sync::Arc;

use super::Middleware;
use crate::context::Context;
use crate::endpoint::{BoxedEndpoint, Endpoint};
use crate::error::Error;

/// Implemented by request types that can check their own fields.
pub trait Validate {
    /// Returns a description of the first violated rule.
    fn validate(&self) -> Result<(), String>;
}

/// Rejects requests failing [`Validate::validate`] with
/// [`Error::Validation`]; the inner endpoint is not called.
pub fn validate<Req, Resp>() -> Middleware<Req, Resp>
where
    Req: Validate + Send + 'static,
    Resp: Send + 'static,
{
    Arc::new(|next: BoxedEndpoint<Req, Resp>| {
        BoxedEndpoint::new(move |ctx: Context, req: Req| {
            let next = next.clone();
            async move {
                req.validate().map_err(Error::Validation)?;
                next.call(ctx, req).await
            }
        })
    })
}
