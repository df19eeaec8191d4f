//! Request orchestration for the write and read paths.

use serde_json::Value;

use crate::config::RelayConfig;
use crate::events::error::{ReadError, WriteError};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::retry_after_secs;
use crate::resilience::{
    fan_out, Admission, CircuitBreaker, CircuitState, FanOutError, RetryError, RetryPolicy,
};
use crate::upstream::{EventPayload, StampedEvent, UpstreamClient, UpstreamError};

/// Glue between the breaker, the retry executor, the fan-out executor and
/// the upstream client. One instance per process.
#[derive(Debug)]
pub struct EventRelay {
    upstream: UpstreamClient,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    fanout_concurrency: usize,
}

impl EventRelay {
    pub fn new(
        upstream: UpstreamClient,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
        fanout_concurrency: usize,
    ) -> Self {
        Self {
            upstream,
            breaker,
            retry,
            fanout_concurrency,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, UpstreamError> {
        Ok(Self::new(
            UpstreamClient::new(&config.upstream)?,
            CircuitBreaker::new(&config.circuit_breaker),
            RetryPolicy::from_config(&config.retries),
            config.fanout.concurrency,
        ))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Stamp and forward an event.
    ///
    /// Closed breaker: retried with backoff for as long as the breaker stays
    /// closed. Half-open: one probe attempt.
    /// Open: fails fast without touching the upstream.
    pub async fn add_event(
        &self,
        payload: EventPayload,
        request_id: Option<&str>,
    ) -> Result<Value, WriteError> {
        let permit = match self.breaker.allow_request() {
            Admission::Allowed(permit) => permit,
            Admission::Rejected { retry_after } => {
                let retry_after_secs = retry_after_secs(retry_after);
                tracing::warn!(request_id = ?request_id, retry_after_secs, "Circuit open, failing fast");
                return Err(WriteError::CircuitOpen { retry_after_secs });
            }
        };

        let event = StampedEvent::now(payload);

        if permit.is_probe() {
            tracing::info!(request_id = ?request_id, event_id = event.id, "Forwarding event as probe");
            let result = self.attempt_add(&event, request_id).await;
            self.breaker.record(permit, result.is_ok());
            return result.map_err(WriteError::ProbeFailed);
        }

        // Another request may trip the breaker while this one backs off.
        let result = self
            .retry
            .run_while(
                |attempt| {
                    if attempt > 0 {
                        metrics::record_retry("add_event");
                    }
                    self.attempt_add(&event, request_id)
                },
                || {
                    let state = self.breaker.state();
                    if state != CircuitState::Closed {
                        tracing::info!(request_id = ?request_id, state = state.as_str(), "Circuit left closed, abandoning retries");
                    }
                    state == CircuitState::Closed
                },
            )
            .await;
        self.breaker.record(permit, result.is_ok());

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => WriteError::RetryExhausted { attempts, last },
            RetryError::Aborted(e) => WriteError::Rejected(e),
        })
    }

    /// Load a user, then fetch each of their events with bounded concurrency.
    pub async fn events_by_user(
        &self,
        user_id: &str,
        request_id: Option<&str>,
    ) -> Result<Vec<Value>, ReadError> {
        let user = self.upstream.fetch_user(user_id, request_id).await.map_err(|e| {
            tracing::warn!(request_id = ?request_id, user_id, error = %e, "Failed to load user");
            ReadError::ParentLoadFailed(e)
        })?;

        metrics::record_fanout(user.events.len());
        tracing::debug!(
            request_id = ?request_id,
            user_id,
            events = user.events.len(),
            concurrency = self.fanout_concurrency,
            "Fetching user events"
        );

        fan_out(&user.events, self.fanout_concurrency, |event_id| {
            let event_id = event_id.clone();
            async move { self.upstream.fetch_event(&event_id, request_id).await }
        })
        .await
        .map_err(|FanOutError { index, error }| {
            let event_id = user.events[index].clone();
            tracing::warn!(request_id = ?request_id, user_id, %event_id, error = %error, "Failed to load event");
            ReadError::DependencyFetchFailed {
                index,
                event_id,
                source: error,
            }
        })
    }

    async fn attempt_add(&self, event: &StampedEvent, request_id: Option<&str>) -> Result<Value, UpstreamError> {
        let result = self.upstream.add_event(event, request_id).await;
        match &result {
            Ok(_) => metrics::record_upstream_attempt("add_event", "success"),
            Err(e) => {
                metrics::record_upstream_attempt("add_event", e.outcome_label());
                tracing::warn!(request_id = ?request_id, event_id = event.id, error = %e, "Upstream write failed");
            }
        }
        result
    }
}
