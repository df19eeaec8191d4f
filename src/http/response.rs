//! Response mapping.
//!
//! # Responsibilities
//! - Shape write responses as `{"success": ..., ...}`
//! - Map write and read failures to status codes
//!
//! # Design Decisions
//! - Write failures expose only a classified `reason`, never upstream error text
//! - Circuit-open responses carry `Retry-After` in both header and body
//! - Read failures are 502: the relay is healthy, its dependency is not

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::events::{ReadError, WriteError};

/// `{"success": true, ...upstreamFields}`.
pub fn write_success(upstream: Value) -> Response {
    let mut body = match upstream {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    body.insert("success".to_string(), Value::Bool(true));
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

/// Body for a request the relay could not parse.
pub fn invalid_payload(status: StatusCode) -> Response {
    let body = json!({
        "success": false,
        "error": "Invalid event payload",
        "reason": "invalid_payload",
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for WriteError {
    fn into_response(self) -> Response {
        match self {
            WriteError::CircuitOpen { retry_after_secs } => {
                let body = json!({
                    "success": false,
                    "error": "Service temporarily unavailable",
                    "reason": "circuit_open",
                    "retryAfter": retry_after_secs,
                });
                let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            other => {
                let body = json!({
                    "success": false,
                    "error": "Upstream unavailable",
                    "reason": other.reason(),
                });
                (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
            }
        }
    }
}

impl IntoResponse for ReadError {
    fn into_response(self) -> Response {
        let message = match self {
            ReadError::ParentLoadFailed(_) => "Failed to load user",
            ReadError::DependencyFetchFailed { .. } => "Failed to load user events",
        };
        (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamError;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_merges_upstream_fields() {
        let response = write_success(json!({ "stored": 3, "success": "yes" }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true, "stored": 3 }));

        let response = write_success(Value::Null);
        assert_eq!(body_json(response).await, json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_circuit_open_sets_retry_after() {
        let response = WriteError::CircuitOpen { retry_after_secs: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
        assert_eq!(
            body_json(response).await,
            json!({
                "success": false,
                "error": "Service temporarily unavailable",
                "reason": "circuit_open",
                "retryAfter": 12,
            })
        );
    }

    #[tokio::test]
    async fn test_failures_hide_upstream_text() {
        let err = WriteError::RetryExhausted {
            attempts: 3,
            last: UpstreamError::Decode("secret internal detail".into()),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let body = body_json(response).await;
        assert_eq!(body["reason"], "retry_exhausted");
        assert!(!body.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_read_failures_are_bad_gateway() {
        let response = ReadError::ParentLoadFailed(UpstreamError::Decode("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await, json!({ "error": "Failed to load user" }));
    }
}
