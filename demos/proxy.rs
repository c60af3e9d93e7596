//! Reverse proxy in front of a local service.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example proxy
//!
//! Try (with something listening on 127.0.0.1:8080):
//!   curl -v http://localhost:3000/users/42?fields=name

use http::HeaderValue;
use switchyard::proxy::{ProxyConfig, ReverseProxy, TransportConfig};
use switchyard::{BoxedEndpoint, Server, middleware};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), switchyard::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = ProxyConfig::new("http://127.0.0.1:8080/api?source=edge");
    config.transport = Some(TransportConfig { dial_timeout_ms: 2_000, ..Default::default() });

    let proxy = ReverseProxy::builder(config)
        .request_option(|req| {
            req.headers_mut().insert("x-edge", HeaderValue::from_static("switchyard"));
            Ok(())
        })
        .response_option(|resp| {
            resp.headers_mut().remove("server");
            Ok(())
        })
        .build()?;

    let app = middleware::trace("api-proxy")(BoxedEndpoint::new(proxy));

    Server::bind("0.0.0.0:3000").await?.serve(app).await
}
