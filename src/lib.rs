//! Resilient event relay library.

pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::schema::RelayConfig;
pub use events::EventRelay;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
