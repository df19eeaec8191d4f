use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::time::Instant;

use crate::http::request::RequestIdExt;
use crate::http::response::{invalid_payload, write_success};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::BreakerSnapshot;
use crate::upstream::EventPayload;

/// `POST /addEvent`
pub async fn add_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = headers.request_id();

    let response = match payload {
        Err(rejection) => {
            tracing::debug!(request_id = ?request_id, error = %rejection, "Rejected event payload");
            invalid_payload(rejection.status())
        }
        Ok(Json(payload)) => match state.relay.add_event(payload, request_id).await {
            Ok(upstream) => write_success(upstream),
            Err(e) => {
                tracing::warn!(request_id = ?request_id, reason = e.reason(), "Event not written");
                e.into_response()
            }
        },
    };

    metrics::record_request("add_event", response.status().as_u16(), start);
    response
}

/// `GET /getEventsByUserId/{id}`
pub async fn events_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let request_id = headers.request_id();

    let response = match state.relay.events_by_user(&user_id, request_id).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => e.into_response(),
    };

    metrics::record_request("events_by_user", response.status().as_u16(), start);
    response
}

/// `GET /circuit`
pub async fn circuit_status(State(state): State<AppState>) -> Json<BreakerSnapshot> {
    Json(state.relay.breaker().snapshot())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "circuit": state.relay.breaker().state().as_str(),
    }))
}
