//! Event relay
//!
//! Accepts events from clients, forwards them to an upstream event store and
//! assembles a user's events back out of it.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                  EVENT RELAY                   │
//!                         │                                                │
//!   POST /addEvent        │  ┌────────┐    ┌──────────────────────────┐   │
//!   ──────────────────────┼─▶│  http  │───▶│ events::EventRelay       │   │
//!                         │  │ server │    │  circuit breaker → retry │───┼──▶ Upstream
//!   GET /getEventsBy...   │  └────────┘    │  parent load → fan-out   │   │    store
//!   ──────────────────────┼─▶              └──────────────────────────┘   │
//!                         │                                                │
//!                         │  config · observability · lifecycle            │
//!                         └───────────────────────────────────────────────┘
//! ```

use tokio::net::TcpListener;

use event_relay::config::load_from_env;
use event_relay::lifecycle::{spawn_signal_handler, Shutdown};
use event_relay::observability::{logging, metrics};
use event_relay::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "event-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
