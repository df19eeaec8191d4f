//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve on a bound listener until shutdown is signalled

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    map_response_body::MapResponseBodyLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::events::EventRelay;
use crate::http::handlers;
use crate::upstream::UpstreamError;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<EventRelay>,
}

/// HTTP server for the event relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
    relay: Arc<EventRelay>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, UpstreamError> {
        let relay = Arc::new(EventRelay::from_config(&config)?);
        Ok(Self::with_relay(config, relay))
    }

    /// Create a server around an existing relay (custom jitter, shared breaker).
    pub fn with_relay(config: RelayConfig, relay: Arc<EventRelay>) -> Self {
        let state = AppState { relay: relay.clone() };
        let router = Self::build_router(&config, state);
        Self { router, config, relay }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/addEvent", post(handlers::add_event))
            .route("/getEventsByUserId/{id}", get(handlers::events_by_user))
            .route("/circuit", get(handlers::circuit_status))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes)),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let breaker = &self.config.circuit_breaker;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            failure_threshold = breaker.failure_threshold,
            window_ms = breaker.window_ms,
            cooldown_ms = breaker.cooldown_ms,
            fanout_concurrency = self.config.fanout.concurrency,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(circuit = self.relay.breaker().state().as_str(), "HTTP server stopped");
        Ok(())
    }
}
