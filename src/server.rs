//! HTTP front for an endpoint, with graceful shutdown.
//!
//! [`Server`] accepts connections and feeds every request to one
//! `Endpoint<Request<Body>, Response<Body>>`, usually a
//! [`ReverseProxy`](crate::proxy::ReverseProxy) or a middleware stack around
//! one. Each request gets:
//!
//! - a [`RemoteAddr`] extension, so the proxy can extend `X-Forwarded-For`;
//! - a fresh [`Context`], whose round trip is dropped (and so cancelled) when
//!   the client connection goes away.
//!
//! Endpoint errors become `502 Bad Gateway` and an `error`-level event.
//!
//! # Graceful shutdown
//!
//! On SIGTERM / Ctrl-C (or when the future passed to
//! [`Server::serve_with_shutdown`] resolves) the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::endpoint::{BoxedEndpoint, Endpoint};
use crate::error::Error;
use crate::proxy::{Body, RemoteAddr};

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Server {
    /// Binds to `addr` (`host:port`). Port `0` picks a free port; read it
    /// back with [`local_addr`](Server::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::config(format!("invalid socket address `{addr}`: {e}")))?;
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until SIGTERM or Ctrl-C, then drains in-flight connections.
    pub async fn serve<E>(self, endpoint: E) -> Result<(), Error>
    where
        E: Endpoint<Request<Body>, Response<Body>>,
    {
        self.serve_with_shutdown(endpoint, shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight connections.
    pub async fn serve_with_shutdown<E, S>(self, endpoint: E, shutdown: S) -> Result<(), Error>
    where
        E: Endpoint<Request<Body>, Response<Body>>,
        S: Future<Output = ()>,
    {
        let endpoint = Arc::new(BoxedEndpoint::new(endpoint));

        info!(addr = %self.addr, "switchyard listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a signal stops accepting immediately even
                // if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(
                        in_flight = tasks.len(),
                        "shutdown signal received, draining connections"
                    );
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let endpoint = Arc::clone(&endpoint);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let endpoint = Arc::clone(&endpoint);
                            async move { dispatch(endpoint, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            warn!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("switchyard stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one request through the endpoint. Never fails towards hyper: endpoint
/// errors are logged and answered with `502`.
async fn dispatch(
    endpoint: Arc<BoxedEndpoint<Request<Body>, Response<Body>>>,
    req: Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let mut req = req.map(Body::new);
    req.extensions_mut().insert(RemoteAddr(remote_addr));

    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match endpoint.call(Context::new(), req).await {
        Ok(response) => Ok(response),
        Err(e) => {
            error!(peer = %remote_addr, %method, %path, error = %e, "endpoint failed");
            let mut response = Response::new(Body::absent());
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            Ok(response)
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere. If a handler cannot be installed, that
/// arm never resolves and a warning is logged.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
