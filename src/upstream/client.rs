//! HTTP client for the upstream event service.
//!
//! # Responsibilities
//! - Build endpoint URLs from the configured base URL and paths
//! - Enforce the per-call deadline
//! - Map responses to typed values or classified [`UpstreamError`]s
//! - Propagate the inbound request ID

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::X_REQUEST_ID;
use crate::resilience::with_deadline;
use crate::upstream::error::UpstreamError;
use crate::upstream::types::{EventId, StampedEvent, UserRecord};

/// Upstream client. Cheap to clone; connections are pooled.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(config.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(UpstreamError::Transport)?;

        Ok(Self {
            http,
            base_url,
            timeout: config.timeout(),
            config: config.clone(),
        })
    }

    /// Forward a stamped event. Returns the upstream's JSON body.
    pub async fn add_event(
        &self,
        event: &StampedEvent,
        request_id: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&self.config.add_event_path, None)?;
        let request = self.http.post(url).json(event);
        self.send(request, request_id).await
    }

    /// Load the parent user record.
    pub async fn fetch_user(&self, user_id: &str, request_id: Option<&str>) -> Result<UserRecord, UpstreamError> {
        let url = self.endpoint(&self.config.user_path, Some(user_id))?;
        self.send(self.http.get(url), request_id).await
    }

    /// Load one event by id.
    pub async fn fetch_event(&self, event_id: &EventId, request_id: Option<&str>) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&self.config.event_path, Some(&event_id.to_string()))?;
        self.send(self.http.get(url), request_id).await
    }

    fn endpoint(&self, path: &str, id: Option<&str>) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| UpstreamError::InvalidUrl(self.config.base_url.clone()))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        mut request: RequestBuilder,
        request_id: Option<&str>,
    ) -> Result<T, UpstreamError> {
        if let Some(id) = request_id {
            request = request.header(X_REQUEST_ID, id);
        }

        with_deadline(self.timeout, async move {
            let response = request.send().await.map_err(UpstreamError::Transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(UpstreamError::Status(status));
            }

            let bytes = response.bytes().await.map_err(UpstreamError::Transport)?;
            let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
            serde_json::from_slice(body).map_err(|e| UpstreamError::Decode(e.to_string()))
        })
        .await?
    }
}
