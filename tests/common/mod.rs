//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use event_relay::config::RelayConfig;
use event_relay::http::HttpServer;
use event_relay::lifecycle::Shutdown;
use event_relay::EventRelay;

/// What the programmable upstream saw.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

type Handler = Arc<dyn Fn(UpstreamRequest) -> BoxFuture<'static, (u16, String)> + Send + Sync>;

async fn dispatch(
    State(handler): State<Handler>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = UpstreamRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    };
    let (status, body) = handler(request).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [("content-type", "application/json")], body).into_response()
}

/// Start a programmable upstream on an ephemeral port and return its address.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(UpstreamRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let handler: Handler = Arc::new(move |req| f(req).boxed());
    let app = Router::new().fallback(dispatch).with_state(handler);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Relay settings tuned for fast tests against `upstream`.
pub fn test_config(upstream: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.base_url = format!("http://{}", upstream);
    config.upstream.timeout_ms = 1_000;
    config.retries.base_delay_ms = 10;
    config.retries.max_jitter_ms = 0;
    config.circuit_breaker.cooldown_jitter_ms = 0;
    config
}

/// A running relay. Shuts down when dropped.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub relay: Arc<EventRelay>,
    shutdown: Shutdown,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the relay on an ephemeral port.
pub async fn start_relay(config: RelayConfig) -> TestRelay {
    let relay = Arc::new(EventRelay::from_config(&config).unwrap());
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::with_relay(config, relay.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestRelay { addr, relay, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
