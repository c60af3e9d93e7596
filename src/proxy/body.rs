//! Request/response body that can be *absent*.
//!
//! An outbound request built from a zero-length inbound body carries no body
//! at all rather than an empty stream, so the transport sends neither a
//! `content-length: 0` nor a chunked terminator it was never asked for.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};

use crate::error::BoxError;

/// A streaming body, or none.
#[derive(Default)]
pub struct Body {
    inner: Option<UnsyncBoxBody<Bytes, BoxError>>,
}

impl Body {
    /// No body object at all.
    pub fn absent() -> Self {
        Self { inner: None }
    }

    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: Some(body.map_err(Into::into).boxed_unsync()) }
    }

    pub fn is_absent(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the body is known to carry zero bytes.
    pub fn is_zero_length(&self) -> bool {
        self.size_hint().exact() == Some(0)
    }

    /// Buffers the whole body.
    pub async fn bytes(self) -> Result<Bytes, BoxError> {
        match self.inner {
            Some(body) => Ok(body.collect().await?.to_bytes()),
            None => Ok(Bytes::new()),
        }
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        match self.get_mut().inner.as_mut() {
            Some(body) => Pin::new(body).poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.as_ref().is_none_or(|body| body.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        self.inner
            .as_ref()
            .map_or_else(|| SizeHint::with_exact(0), |body| body.size_hint())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::new(Full::new(bytes))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from(Bytes::from(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from(Bytes::from_static(s.as_bytes()))
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(_) => f.write_str("Body(..)"),
            None => f.write_str("Body(absent)"),
        }
    }
}
