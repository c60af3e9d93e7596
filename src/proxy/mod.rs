//! HTTP reverse-proxy adapter.
//!
//! # Pipeline
//!
//! ```text
//! inbound request
//!   ↓ director           scheme/host/path/query → downstream, Host header,
//!   ↓                    hop headers out, X-Forwarded-For, User-Agent
//!   ↓ request options    ordered mutators          (Error::RequestOptions)
//!   ↓ round trip         RoundTripper              (Error::Dial)
//!   ↓ hop headers out
//!   ↓ response options   ordered mutators          (Error::ResponseOptions)
//! response
//! ```
//!
//! The proxy takes the inbound request by value, so the outbound header map
//! is built from owned parts and never aliases another request's headers.
//! Concurrent calls share nothing but the static configuration and the
//! transport's connection pool.

mod body;
mod rewrite;
mod transport;

pub use body::Body;
pub use rewrite::{HOP_HEADERS, X_FORWARDED_FOR, join_path, merge_query, remove_hop_headers};
pub use transport::{HttpTransport, RoundTripper, TransportConfig};

use std::net::SocketAddr;
use std::sync::Arc;

use http::header::{self, HeaderValue};
use http::uri::{Authority, Scheme};
use http::{Request, Response, Uri, Version};
use serde::Deserialize;
use tracing::debug;

use crate::context::Context;
use crate::endpoint::{BoxFuture, Endpoint};
use crate::error::{BoxError, Error};

/// Peer address of the inbound connection, stored in request extensions by
/// the [`Server`](crate::Server). Requests without it are forwarded without
/// touching `X-Forwarded-For`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RemoteAddr(pub SocketAddr);

/// Mutates the outbound request before the round trip.
pub type RequestOption = Arc<dyn Fn(&mut Request<Body>) -> Result<(), BoxError> + Send + Sync>;

/// Mutates the sanitized response before it is returned.
pub type ResponseOption = Arc<dyn Fn(&mut Response<Body>) -> Result<(), BoxError> + Send + Sync>;

pub const DEFAULT_USER_AGENT: &str = concat!("switchyard/", env!("CARGO_PKG_VERSION"));

// ── ProxyConfig ───────────────────────────────────────────────────────────────

/// File-level proxy settings. Option chains are code, so they are added on
/// the [`ProxyBuilder`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Downstream origin, e.g. `http://orders.internal:8080/api?v=2`.
    pub url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Custom transport; `None` keeps hyper's defaults.
    #[serde(default)]
    pub transport: Option<TransportConfig>,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), user_agent: default_user_agent(), transport: None }
    }

    pub fn validate(&self) -> Result<(), Error> {
        Target::parse(&self.url).map(|_| ())
    }
}

// ── Target ────────────────────────────────────────────────────────────────────

/// The parsed downstream origin.
#[derive(Clone, Debug)]
struct Target {
    scheme: Scheme,
    authority: Authority,
    path: String,
    query: String,
}

impl Target {
    fn parse(url: &str) -> Result<Self, Error> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::config(format!("invalid downstream url `{url}`: {e}")))?;
        let parts = uri.into_parts();
        let (Some(scheme), Some(authority)) = (parts.scheme, parts.authority) else {
            return Err(Error::config(format!(
                "downstream url `{url}` needs a scheme and a host"
            )));
        };
        let (path, query) = match parts.path_and_query {
            Some(pq) => (pq.path().to_owned(), pq.query().unwrap_or("").to_owned()),
            None => (String::new(), String::new()),
        };
        Ok(Self { scheme, authority, path, query })
    }
}

// ── ReverseProxy ──────────────────────────────────────────────────────────────

/// Forwards requests to one downstream origin.
///
/// Cheap to clone; every clone shares the same transport.
#[derive(Clone)]
pub struct ReverseProxy {
    inner: Arc<Inner>,
}

struct Inner {
    target: Target,
    user_agent: HeaderValue,
    request_options: Vec<RequestOption>,
    response_options: Vec<ResponseOption>,
    transport: Arc<dyn RoundTripper>,
}

impl ReverseProxy {
    pub fn builder(config: ProxyConfig) -> ProxyBuilder {
        ProxyBuilder {
            config,
            request_options: Vec::new(),
            response_options: Vec::new(),
            transport: None,
            conflicts: Vec::new(),
        }
    }

    /// Forwards `req` and returns the sanitized downstream response.
    ///
    /// Cancelling `ctx` aborts the in-flight round trip with
    /// [`Error::Cancelled`].
    pub async fn handle(&self, ctx: &Context, req: Request<Body>) -> Result<Response<Body>, Error> {
        let inner = &self.inner;
        let mut outbound = inner.direct(req)?;

        for option in &inner.request_options {
            option(&mut outbound).map_err(Error::RequestOptions)?;
        }

        let url = outbound.uri().to_string();
        debug!(method = %outbound.method(), url = %url, "proxying request");

        let mut response = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(Error::Cancelled),
            res = inner.transport.round_trip(outbound) => {
                res.map_err(|source| Error::Dial { url: url.clone(), source })?
            }
        };

        remove_hop_headers(response.headers_mut());
        for option in &inner.response_options {
            option(&mut response).map_err(Error::ResponseOptions)?;
        }

        debug!(url = %url, status = response.status().as_u16(), "downstream responded");
        Ok(response)
    }
}

impl Inner {
    /// Rewrites the inbound request to target the downstream origin.
    fn direct(&self, req: Request<Body>) -> Result<Request<Body>, Error> {
        let (parts, body) = req.into_parts();

        let path = join_path(&self.target.path, parts.uri.path());
        let query = merge_query(&self.target.query, parts.uri.query().unwrap_or(""));
        let path_and_query = if query.is_empty() { path } else { format!("{path}?{query}") };

        let uri = Uri::builder()
            .scheme(self.target.scheme.clone())
            .authority(self.target.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| Error::BuildPath(e.into()))?;

        let mut headers = parts.headers;
        remove_hop_headers(&mut headers);

        let host = HeaderValue::from_str(self.target.authority.as_str())
            .map_err(|e| Error::BuildPath(e.into()))?;
        headers.insert(header::HOST, host);

        if !headers.contains_key(header::USER_AGENT) {
            headers.insert(header::USER_AGENT, self.user_agent.clone());
        }

        if let Some(RemoteAddr(addr)) = parts.extensions.get::<RemoteAddr>() {
            rewrite::append_forwarded_for(&mut headers, addr.ip())
                .map_err(|e| Error::BuildPath(e.into()))?;
        }

        let zero_length = body.is_zero_length()
            || headers
                .get(header::CONTENT_LENGTH)
                .is_some_and(|len| len.as_bytes() == b"0");
        let body = if zero_length { Body::absent() } else { body };

        let mut outbound = Request::new(body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = uri;
        *outbound.version_mut() = Version::HTTP_11;
        *outbound.headers_mut() = headers;
        *outbound.extensions_mut() = parts.extensions;
        Ok(outbound)
    }
}

impl Endpoint<Request<Body>, Response<Body>> for ReverseProxy {
    fn call(&self, ctx: Context, req: Request<Body>) -> BoxFuture<Result<Response<Body>, Error>> {
        let proxy = self.clone();
        Box::pin(async move { proxy.handle(&ctx, req).await })
    }
}

// ── ProxyBuilder ──────────────────────────────────────────────────────────────

/// Builder for [`ReverseProxy`]. Options run in registration order.
pub struct ProxyBuilder {
    config: ProxyConfig,
    request_options: Vec<RequestOption>,
    response_options: Vec<ResponseOption>,
    transport: Option<Arc<dyn RoundTripper>>,
    conflicts: Vec<&'static str>,
}

impl ProxyBuilder {
    pub fn request_option<F>(mut self, option: F) -> Self
    where
        F: Fn(&mut Request<Body>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.request_options.push(Arc::new(option));
        self
    }

    pub fn response_option<F>(mut self, option: F) -> Self
    where
        F: Fn(&mut Response<Body>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.response_options.push(Arc::new(option));
        self
    }

    /// Substitutes the round tripper. Conflicts with a `transport` section in
    /// the configuration.
    pub fn transport(mut self, transport: impl RoundTripper) -> Self {
        if self.transport.is_some() || self.config.transport.is_some() {
            self.conflicts.push("transport");
        }
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> Result<ReverseProxy, Error> {
        if !self.conflicts.is_empty() {
            return Err(Error::config(format!(
                "proxy options set more than once: {}",
                self.conflicts.join(", ")
            )));
        }
        let target = Target::parse(&self.config.url)?;
        let user_agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| Error::config(format!("invalid user agent: {e}")))?;

        let transport = match (self.transport, &self.config.transport) {
            (Some(transport), _) => transport,
            (None, Some(config)) => Arc::new(HttpTransport::with_config(config)),
            (None, None) => Arc::new(HttpTransport::new()),
        };

        Ok(ReverseProxy {
            inner: Arc::new(Inner {
                target,
                user_agent,
                request_options: self.request_options,
                response_options: self.response_options,
                transport,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::StatusCode;

    use super::*;

    /// Records the outbound request and answers with a canned response.
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Option<Request<Body>>>>,
        response_headers: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl RoundTripper for Recorder {
        async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, BoxError> {
            *self.seen.lock().unwrap() = Some(req);
            let mut response = Response::new(Body::from("downstream"));
            for (name, value) in &self.response_headers {
                response
                    .headers_mut()
                    .append(*name, HeaderValue::from_static(*value));
            }
            Ok(response)
        }
    }

    struct Refusing;

    #[async_trait]
    impl RoundTripper for Refusing {
        async fn round_trip(&self, _req: Request<Body>) -> Result<Response<Body>, BoxError> {
            Err("connection refused".into())
        }
    }

    struct Stalled;

    #[async_trait]
    impl RoundTripper for Stalled {
        async fn round_trip(&self, _req: Request<Body>) -> Result<Response<Body>, BoxError> {
            std::future::pending().await
        }
    }

    fn proxy(url: &str, recorder: &Recorder) -> ReverseProxy {
        ReverseProxy::builder(ProxyConfig::new(url))
            .transport(recorder.clone())
            .build()
            .unwrap()
    }

    fn inbound(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "edge.example.com")
            .body(Body::from("payload"))
            .unwrap()
    }

    #[tokio::test]
    async fn director_rewrites_target() {
        let recorder = Recorder::default();
        let proxy = proxy("http://orders.internal:8080/api/?v=2", &recorder);

        proxy.handle(&Context::new(), inbound("/v1/x?id=7")).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.uri(), "http://orders.internal:8080/api/v1/x?v=2&id=7");
        assert_eq!(seen.headers()[header::HOST], "orders.internal:8080");
        assert_eq!(seen.version(), Version::HTTP_11);
    }

    #[tokio::test]
    async fn query_quirk_survives_the_director() {
        let recorder = Recorder::default();
        let proxy = proxy("http://orders.internal/api", &recorder);

        proxy.handle(&Context::new(), inbound("/x?b=2")).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.uri().query(), Some("&b=2"));
    }

    #[tokio::test]
    async fn hop_headers_stripped_both_ways() {
        let recorder = Recorder {
            response_headers: HOP_HEADERS.iter().map(|name| (*name, "x")).collect(),
            ..Recorder::default()
        };
        let proxy = proxy("http://orders.internal", &recorder);

        let mut req = inbound("/");
        for name in HOP_HEADERS {
            req.headers_mut().insert(name, HeaderValue::from_static("x"));
        }
        let response = proxy.handle(&Context::new(), req).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        for name in HOP_HEADERS {
            assert!(!seen.headers().contains_key(name), "{name} forwarded");
            assert!(!response.headers().contains_key(name), "{name} returned");
        }
    }

    #[tokio::test]
    async fn forwarding_chain_is_appended() {
        let recorder = Recorder::default();
        let proxy = proxy("http://orders.internal", &recorder);

        let mut req = inbound("/");
        req.headers_mut().insert(X_FORWARDED_FOR, HeaderValue::from_static("9.9.9.9"));
        req.extensions_mut().insert(RemoteAddr("1.2.3.4:5555".parse().unwrap()));
        proxy.handle(&Context::new(), req).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.headers()[X_FORWARDED_FOR], "9.9.9.9,1.2.3.4");
    }

    #[tokio::test]
    async fn zero_length_body_is_absent() {
        let recorder = Recorder::default();
        let proxy = proxy("http://orders.internal", &recorder);

        let req = Request::builder()
            .uri("/")
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::from(Vec::new()))
            .unwrap();
        proxy.handle(&Context::new(), req).await.unwrap();

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert!(seen.body().is_absent());
    }

    #[tokio::test]
    async fn user_agent_defaults_only_when_missing() {
        let recorder = Recorder::default();
        let proxy = proxy("http://orders.internal", &recorder);

        proxy.handle(&Context::new(), inbound("/")).await.unwrap();
        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.headers()[header::USER_AGENT], DEFAULT_USER_AGENT);

        let mut req = inbound("/");
        req.headers_mut().insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));
        proxy.handle(&Context::new(), req).await.unwrap();
        let seen = recorder.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.headers()[header::USER_AGENT], "curl/8");
    }

    #[tokio::test]
    async fn option_failures_name_their_stage() {
        let recorder = Recorder::default();
        let failing_request = ReverseProxy::builder(ProxyConfig::new("http://orders.internal"))
            .request_option(|_req| Ok(()))
            .request_option(|_req| Err("no tenant".into()))
            .transport(recorder.clone())
            .build()
            .unwrap();
        let err = failing_request.handle(&Context::new(), inbound("/")).await.unwrap_err();
        assert!(matches!(err, Error::RequestOptions(_)));
        assert!(recorder.seen.lock().unwrap().is_none(), "round trip must not run");

        let failing_response = ReverseProxy::builder(ProxyConfig::new("http://orders.internal"))
            .response_option(|_resp| Err("bad upstream".into()))
            .transport(recorder.clone())
            .build()
            .unwrap();
        let err = failing_response.handle(&Context::new(), inbound("/")).await.unwrap_err();
        assert!(err.to_string().starts_with("response options failed"));
    }

    #[tokio::test]
    async fn options_mutate_in_order() {
        let recorder = Recorder::default();
        let proxy = ReverseProxy::builder(ProxyConfig::new("http://orders.internal"))
            .request_option(|req| {
                req.headers_mut().insert("x-stage", HeaderValue::from_static("first"));
                Ok(())
            })
            .request_option(|req| {
                req.headers_mut().append("x-stage", HeaderValue::from_static("second"));
                Ok(())
            })
            .response_option(|resp| {
                *resp.status_mut() = StatusCode::ACCEPTED;
                Ok(())
            })
            .transport(recorder.clone())
            .build()
            .unwrap();

        let response = proxy.handle(&Context::new(), inbound("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let seen = recorder.seen.lock().unwrap().take().unwrap();
        let stages: Vec<_> = seen.headers().get_all("x-stage").iter().collect();
        assert_eq!(stages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn dial_failure_carries_the_url() {
        let proxy = ReverseProxy::builder(ProxyConfig::new("http://orders.internal"))
            .transport(Refusing)
            .build()
            .unwrap();
        let err = proxy.handle(&Context::new(), inbound("/health")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "dial request http://orders.internal/health failed: connection refused"
        );
    }

    #[tokio::test]
    async fn cancelling_the_context_aborts_the_round_trip() {
        let proxy = ReverseProxy::builder(ProxyConfig::new("http://orders.internal"))
            .transport(Stalled)
            .build()
            .unwrap();
        let ctx = Context::new();
        ctx.cancel();
        let err = proxy.handle(&ctx, inbound("/")).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn proxy_is_an_endpoint() {
        let recorder = Recorder::default();
        let proxy = proxy("http://orders.internal", &recorder);
        let endpoint = crate::endpoint::BoxedEndpoint::new(proxy);
        let response = endpoint.call(Context::new(), inbound("/")).await.unwrap();
        assert_eq!(response.into_body().bytes().await.unwrap(), "downstream");
    }

    #[test]
    fn builder_rejects_bad_config() {
        assert!(matches!(
            ReverseProxy::builder(ProxyConfig::new("/relative/only")).build(),
            Err(Error::Configuration(_))
        ));

        let mut config = ProxyConfig::new("http://orders.internal");
        config.transport = Some(TransportConfig::default());
        let err = ReverseProxy::builder(config).transport(Refusing).build();
        assert!(matches!(err, Err(Error::Configuration(m)) if m.contains("transport")));
    }
}
