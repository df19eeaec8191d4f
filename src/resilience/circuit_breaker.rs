//! Circuit breaker guarding the upstream write path.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: a single probe tests whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures within the trailing window >= threshold
//! Open → Half-Open: first admission check at or after the cooldown deadline
//! Half-Open → Closed: probe succeeds (history cleared, cooldown reset)
//! Half-Open → Open: probe fails (cooldown doubled up to the cap, plus jitter)
//! ```
//!
//! # Design Decisions
//! - One process-wide breaker; state lives behind a single mutex
//! - The mutex is never held across an await point
//! - Admission hands out a [`Permit`] that must be settled through
//!   [`CircuitBreaker::record`]; a probe permit dropped unsettled frees the probe slot
//! - Time is read from `tokio::time::Instant` so tests can drive it with a paused clock

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::backoff::{JitterSource, ThreadRngJitter};

/// Retry-After reported while a probe is already outstanding.
const PROBE_BUSY_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Result of an admission check.
#[derive(Debug)]
pub enum Admission<'a> {
    /// The request may call the upstream.
    Allowed(Permit<'a>),
    /// The breaker is open (or a probe is outstanding).
    Rejected { retry_after: Duration },
}

/// Whole seconds a client should wait, rounded up and never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// Proof of admission. Settle it with [`CircuitBreaker::record`].
#[must_use = "an admitted request must record its outcome"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    /// True when this request is the single Half-Open trial call.
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}

/// Point-in-time view of the breaker for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failures_in_window: usize,
    pub cooldown_ms: u64,
    pub retry_after_secs: Option<u64>,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: VecDeque<Instant>,
    next_attempt_at: Option<Instant>,
    cooldown: Duration,
    probe_in_flight: bool,
}

impl Inner {
    fn evict(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding-window circuit breaker with a single-probe half-open state.
#[derive(Debug)]
pub struct CircuitBreaker {
    window: Duration,
    failure_threshold: usize,
    base_cooldown: Duration,
    max_cooldown: Duration,
    cooldown_jitter: Duration,
    jitter: Arc<dyn JitterSource>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_jitter(config, Arc::new(ThreadRngJitter))
    }

    pub fn with_jitter(config: &CircuitBreakerConfig, jitter: Arc<dyn JitterSource>) -> Self {
        let base_cooldown = config.cooldown();
        Self {
            window: config.window(),
            failure_threshold: config.failure_threshold.max(1) as usize,
            base_cooldown,
            max_cooldown: config.max_cooldown().max(base_cooldown),
            cooldown_jitter: config.cooldown_jitter(),
            jitter,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                next_attempt_at: None,
                cooldown: base_cooldown,
                probe_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a request may call the upstream. Never blocks on I/O.
    pub fn allow_request(&self) -> Admission<'_> {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Admission::Allowed(self.permit(false)),
            CircuitState::Open => {
                let next_attempt_at = inner.next_attempt_at.unwrap_or(now);
                if now < next_attempt_at {
                    Admission::Rejected {
                        retry_after: next_attempt_at - now,
                    }
                } else {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.next_attempt_at = None;
                    inner.probe_in_flight = true;
                    tracing::info!("Circuit half-open, admitting probe");
                    Admission::Allowed(self.permit(true))
                }
            }
            CircuitState::HalfOpen if inner.probe_in_flight => Admission::Rejected {
                retry_after: PROBE_BUSY_RETRY_AFTER,
            },
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                tracing::info!("Previous probe abandoned, admitting new probe");
                Admission::Allowed(self.permit(true))
            }
        }
    }

    /// Record the outcome of an admitted request.
    pub fn record(&self, mut permit: Permit<'_>, success: bool) {
        debug_assert!(std::ptr::eq(permit.breaker, self), "permit from another breaker");
        permit.settled = true;

        let now = Instant::now();
        let mut inner = self.lock();
        inner.evict(now, self.window);

        if permit.probe {
            inner.probe_in_flight = false;
            if inner.state != CircuitState::HalfOpen {
                return;
            }
            if success {
                inner.failures.clear();
                inner.cooldown = self.base_cooldown;
                inner.next_attempt_at = None;
                self.transition(&mut inner, CircuitState::Closed);
                tracing::info!("Probe succeeded, circuit closed");
            } else {
                let cooldown = inner.cooldown.saturating_mul(2).min(self.max_cooldown);
                let delay = cooldown + self.jitter.jitter(self.cooldown_jitter);
                inner.cooldown = cooldown;
                inner.next_attempt_at = Some(now + delay);
                self.transition(&mut inner, CircuitState::Open);
                tracing::warn!(cooldown = ?cooldown, reopen_in = ?delay, "Probe failed, circuit re-opened");
            }
            return;
        }

        if success {
            return;
        }

        inner.failures.push_back(now);
        if inner.state == CircuitState::Closed && inner.failures.len() >= self.failure_threshold {
            let cooldown = inner.cooldown;
            inner.next_attempt_at = Some(now + cooldown);
            self.transition(&mut inner, CircuitState::Open);
            tracing::warn!(
                failures = inner.failures.len(),
                window = ?self.window,
                cooldown = ?cooldown,
                "Failure threshold reached, circuit opened"
            );
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Read-only view; does not evict or transition.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let inner = self.lock();
        let failures_in_window = inner
            .failures
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count();
        let retry_after_secs = match (inner.state, inner.next_attempt_at) {
            (CircuitState::Open, Some(next)) if next > now => Some(retry_after_secs(next - now)),
            _ => None,
        };

        BreakerSnapshot {
            state: inner.state,
            failures_in_window,
            cooldown_ms: inner.cooldown.as_millis() as u64,
            retry_after_secs,
            probe_in_flight: inner.probe_in_flight,
        }
    }

    fn permit(&self, probe: bool) -> Permit<'_> {
        Permit {
            breaker: self,
            probe,
            settled: false,
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            tracing::warn!("Probe dropped without an outcome, releasing probe slot");
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        metrics::record_circuit_transition(from.as_str(), to.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::backoff::FixedJitter;
    use std::sync::Barrier;

    fn config(threshold: u32, cooldown_ms: u64, max_cooldown_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window_ms: 30_000,
            failure_threshold: threshold,
            cooldown_ms,
            max_cooldown_ms,
            cooldown_jitter_ms: 1_000,
        }
    }

    fn breaker(jitter_ms: u64) -> CircuitBreaker {
        CircuitBreaker::with_jitter(
            &config(3, 15_000, 120_000),
            Arc::new(FixedJitter(Duration::from_millis(jitter_ms))),
        )
    }

    fn settle(breaker: &CircuitBreaker, success: bool) {
        match breaker.allow_request() {
            Admission::Allowed(permit) => breaker.record(permit, success),
            Admission::Rejected { .. } => panic!("request unexpectedly rejected"),
        }
    }

    fn expect_rejected(breaker: &CircuitBreaker) -> Duration {
        match breaker.allow_request() {
            Admission::Rejected { retry_after } => retry_after,
            Admission::Allowed(permit) => panic!("expected rejection, got permit (probe={})", permit.is_probe()),
        }
    }

    /// Trip the breaker and advance to the probe deadline.
    async fn open_and_wait(breaker: &CircuitBreaker) {
        for _ in 0..3 {
            settle(breaker, false);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        let wait = expect_rejected(breaker);
        tokio::time::advance(wait).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let breaker = breaker(0);

        settle(&breaker, false);
        settle(&breaker, false);
        assert_eq!(breaker.state(), CircuitState::Closed);

        settle(&breaker, false);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(expect_rejected(&breaker), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successes_do_not_reset_window() {
        let breaker = breaker(0);

        settle(&breaker, false);
        settle(&breaker, true);
        settle(&breaker, false);
        settle(&breaker, true);
        assert_eq!(breaker.state(), CircuitState::Closed);

        settle(&breaker, false);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aged_failures_evicted() {
        let breaker = breaker(0);

        settle(&breaker, false);
        settle(&breaker, false);
        tokio::time::advance(Duration::from_secs(31)).await;

        settle(&breaker, false);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failures_in_window, 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        settle(&breaker, false);
        settle(&breaker, false);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_decreases_until_probe() {
        let breaker = breaker(0);
        for _ in 0..3 {
            settle(&breaker, false);
        }

        let mut previous = expect_rejected(&breaker);
        assert_eq!(retry_after_secs(previous), 15);
        for _ in 0..14 {
            tokio::time::advance(Duration::from_secs(1)).await;
            let current = expect_rejected(&breaker);
            assert!(current < previous);
            assert_eq!(retry_after_secs(current), retry_after_secs(previous) - 1);
            previous = current;
        }

        tokio::time::advance(previous).await;
        match breaker.allow_request() {
            Admission::Allowed(permit) => {
                assert!(permit.is_probe());
                assert_eq!(breaker.state(), CircuitState::HalfOpen);
                breaker.record(permit, true);
            }
            Admission::Rejected { .. } => panic!("probe should be admitted at the deadline"),
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_while_half_open() {
        let breaker = breaker(0);
        open_and_wait(&breaker).await;

        let probe = match breaker.allow_request() {
            Admission::Allowed(permit) => permit,
            Admission::Rejected { .. } => panic!("probe should be admitted"),
        };
        assert!(probe.is_probe());
        assert_eq!(expect_rejected(&breaker), PROBE_BUSY_RETRY_AFTER);
        assert_eq!(expect_rejected(&breaker), PROBE_BUSY_RETRY_AFTER);

        breaker.record(probe, true);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_racing_admissions_yield_one_probe() {
        let breaker = CircuitBreaker::with_jitter(
            &config(3, 20, 1_000),
            Arc::new(FixedJitter(Duration::ZERO)),
        );
        for _ in 0..3 {
            settle(&breaker, false);
        }
        std::thread::sleep(Duration::from_millis(40));

        let threads = 16;
        let barrier = Barrier::new(threads);
        let admissions: Vec<Admission<'_>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        breaker.allow_request()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let probes = admissions
            .iter()
            .filter(|a| matches!(a, Admission::Allowed(p) if p.is_probe()))
            .count();
        let rejected = admissions
            .iter()
            .filter(|a| matches!(a, Admission::Rejected { .. }))
            .count();
        assert_eq!(probes, 1);
        assert_eq!(rejected, threads - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_probe_resets_cooldown() {
        let breaker = breaker(0);
        open_and_wait(&breaker).await;

        // Fail one probe so the cooldown escalates.
        settle(&breaker, false);
        assert_eq!(breaker.snapshot().cooldown_ms, 30_000);
        let wait = expect_rejected(&breaker);
        assert_eq!(wait, Duration::from_secs(30));
        tokio::time::advance(wait).await;

        settle(&breaker, true);
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures_in_window, 0);
        assert_eq!(snapshot.cooldown_ms, 15_000);

        // A second open cycle uses the base cooldown again.
        for _ in 0..3 {
            settle(&breaker, false);
        }
        assert_eq!(expect_rejected(&breaker), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_escalates_up_to_cap() {
        let breaker = CircuitBreaker::with_jitter(
            &config(3, 15_000, 40_000),
            Arc::new(FixedJitter(Duration::from_millis(500))),
        );
        open_and_wait(&breaker).await;

        let mut previous = 15_000;
        for expected in [30_000, 40_000, 40_000] {
            settle(&breaker, false);
            let snapshot = breaker.snapshot();
            assert_eq!(snapshot.state, CircuitState::Open);
            assert_eq!(snapshot.cooldown_ms, expected);
            assert!(snapshot.cooldown_ms >= (previous * 2).min(40_000));
            assert!(snapshot.cooldown_ms <= 40_000);

            let wait = expect_rejected(&breaker);
            assert_eq!(wait, Duration::from_millis(expected + 500));
            tokio::time::advance(wait).await;
            previous = expected;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_releases_slot() {
        let breaker = breaker(0);
        open_and_wait(&breaker).await;

        match breaker.allow_request() {
            Admission::Allowed(permit) => assert!(permit.is_probe()),
            Admission::Rejected { .. } => panic!("probe should be admitted"),
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.snapshot().probe_in_flight);

        match breaker.allow_request() {
            Admission::Allowed(permit) => {
                assert!(permit.is_probe());
                breaker.record(permit, false);
            }
            Admission::Rejected { .. } => panic!("released slot should admit a new probe"),
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_outcomes_do_not_drive_transitions() {
        let breaker = breaker(0);
        let straggler = match breaker.allow_request() {
            Admission::Allowed(permit) => permit,
            Admission::Rejected { .. } => panic!("closed breaker should admit"),
        };

        for _ in 0..3 {
            settle(&breaker, false);
        }
        breaker.record(straggler, true);
        assert_eq!(breaker.state(), CircuitState::Open);

        let wait = expect_rejected(&breaker);
        tokio::time::advance(wait).await;
        let probe = match breaker.allow_request() {
            Admission::Allowed(permit) => permit,
            Admission::Rejected { .. } => panic!("probe should be admitted"),
        };

        // A straggler failing while half-open is not the probe outcome.
        breaker.record(breaker.permit(false), false);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record(probe, true);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(14_001)), 15);
        assert_eq!(retry_after_secs(Duration::from_secs(15)), 15);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
