//! Proxy round trips against a live upstream served by `Server`.

use std::time::Duration;

use http::{HeaderValue, Request, Response, StatusCode, header};
use switchyard::proxy::{
    Body, HttpTransport, ProxyConfig, RemoteAddr, ReverseProxy, TransportConfig, X_FORWARDED_FOR,
};
use switchyard::{Context, Error, Server};
use tokio::sync::oneshot;

/// Upstream echoing what it received as response headers.
async fn echo(_ctx: Context, req: Request<Body>) -> Result<Response<Body>, Error> {
    let seen_uri = req.uri().to_string();
    let seen_xff = req
        .headers()
        .get(X_FORWARDED_FOR)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("-"));
    let body = req.into_body().bytes().await.map_err(Error::endpoint)?;

    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert("x-seen-uri", HeaderValue::try_from(seen_uri).map_err(Error::endpoint)?);
    headers.insert("x-seen-xff", seen_xff);
    headers.insert(header::CONNECTION, HeaderValue::from_static("x-upstream-private"));
    headers.insert("x-upstream-private", HeaderValue::from_static("secret"));
    Ok(response)
}

async fn spawn_upstream() -> (String, oneshot::Sender<()>) {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve_with_shutdown(echo, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
    });
    (format!("http://{addr}"), stop)
}

#[tokio::test]
async fn forwards_to_a_live_upstream() {
    let (upstream, stop) = spawn_upstream().await;
    let proxy = ReverseProxy::builder(ProxyConfig::new(format!("{upstream}/api")))
        .build()
        .unwrap();

    let mut req = Request::builder()
        .method("POST")
        .uri("/orders?id=7")
        .header(X_FORWARDED_FOR, "9.9.9.9")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from("order-7"))
        .unwrap();
    req.extensions_mut().insert(RemoteAddr("1.2.3.4:5555".parse().unwrap()));

    let response = proxy.handle(&Context::new(), req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers["x-seen-uri"], "/api/orders?&id=7");
    assert_eq!(headers["x-seen-xff"], "9.9.9.9,1.2.3.4");
    assert!(!headers.contains_key(header::CONNECTION));
    assert!(!headers.contains_key("x-upstream-private"));
    assert_eq!(response.into_body().bytes().await.unwrap(), "order-7");

    let _ = stop.send(());
}

#[tokio::test]
async fn unreachable_upstream_is_a_dial_error() {
    // Bind then drop to find a port nobody listens on.
    let addr = {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        server.local_addr()
    };
    let transport = HttpTransport::with_config(&TransportConfig {
        dial_timeout_ms: 500,
        ..Default::default()
    });
    let proxy = ReverseProxy::builder(ProxyConfig::new(format!("http://{addr}")))
        .transport(transport)
        .build()
        .unwrap();

    let req = Request::builder().uri("/").body(Body::absent()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), proxy.handle(&Context::new(), req))
        .await
        .expect("dial must fail fast");

    assert!(matches!(result, Err(Error::Dial { .. })));
}

#[tokio::test]
async fn server_answers_502_when_the_endpoint_fails() {
    let (upstream, stop) = spawn_upstream().await;
    let proxy = ReverseProxy::builder(ProxyConfig::new(upstream))
        .request_option(|_req| Err("tenant header missing".into()))
        .build()
        .unwrap();

    let front = Server::bind("127.0.0.1:0").await.unwrap();
    let front_addr = front.local_addr();
    let (stop_front, front_stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        front
            .serve_with_shutdown(proxy, async {
                let _ = front_stopped.await;
            })
            .await
            .unwrap();
    });

    let client = HttpTransport::new();
    let req = Request::builder()
        .uri(format!("http://{front_addr}/anything"))
        .body(Body::absent())
        .unwrap();
    let response = switchyard::proxy::RoundTripper::round_trip(&client, req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let _ = stop_front.send(());
    let _ = stop.send(());
}
