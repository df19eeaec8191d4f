//! Request ID handling.
//!
//! # Responsibilities
//! - Name the request ID header shared by the inbound and upstream sides
//! - Read the ID set by `SetRequestIdLayer` back out of a request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - Client-supplied IDs are kept; missing ones get a UUID v4

use axum::http::HeaderMap;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Access to the request ID on a header map.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        self.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(headers.request_id(), None);

        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-123"));
        assert_eq!(headers.request_id(), Some("req-123"));
    }
}
