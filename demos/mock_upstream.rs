//! A flaky in-memory event store for trying the relay by hand.
//!
//! `MOCK_FAILURE_RATE` (0.0..=1.0) controls how often a request answers 500.
//! `MOCK_LATENCY_MS` adds a fixed delay to every response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Store {
    events: HashMap<String, Value>,
    users: HashMap<String, Vec<Value>>,
}

#[derive(Clone)]
struct Mock {
    store: Arc<Mutex<Store>>,
    failure_rate: f64,
    latency: Duration,
}

impl Mock {
    async fn flake(&self) -> bool {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        rand::thread_rng().gen_bool(self.failure_rate)
    }
}

/// Render an id the way it appears in a request path: `42`, not `"42"`.
fn path_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

async fn add_event(State(mock): State<Mock>, Json(event): Json<Value>) -> impl IntoResponse {
    if mock.flake().await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "flaky" })));
    }
    let id = event.get("id").cloned().unwrap_or(Value::Null);
    let user = path_key(event.get("userId"));

    let mut store = mock.store.lock().unwrap();
    store.events.insert(path_key(Some(&id)), event.clone());
    store.users.entry(user).or_default().push(id.clone());
    (StatusCode::OK, Json(json!({ "id": id })))
}

async fn get_user(State(mock): State<Mock>, Path(id): Path<String>) -> impl IntoResponse {
    if mock.flake().await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "flaky" })));
    }
    let store = mock.store.lock().unwrap();
    let events = store.users.get(&id).cloned().unwrap_or_default();
    (StatusCode::OK, Json(json!({ "id": id, "events": events })))
}

async fn get_event(State(mock): State<Mock>, Path(id): Path<String>) -> impl IntoResponse {
    if mock.flake().await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "flaky" })));
    }
    let store = mock.store.lock().unwrap();
    match store.events.get(&id) {
        Some(event) => (StatusCode::OK, Json(event.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))),
    }
}

#[tokio::main]
async fn main() {
    let failure_rate = std::env::var("MOCK_FAILURE_RATE")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.2)
        .clamp(0.0, 1.0);
    let latency = std::env::var("MOCK_LATENCY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or_default();

    let mock = Mock {
        store: Arc::default(),
        failure_rate,
        latency,
    };

    let app = Router::new()
        .route("/addEvent", post(add_event))
        .route("/getUserById/{id}", get(get_user))
        .route("/getEventById/{id}", get(get_event))
        .with_state(mock);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Mock upstream listening on http://{} (failure rate {})", addr, failure_rate);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
