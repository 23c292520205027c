//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a limited number of trial calls test whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: next call after recovery_timeout has elapsed
//! Half-Open → Closed: half_open_successes >= half_open_max_successes
//! Half-Open → Open: any single trial failure
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, shared through `Arc` (never global)
//! - Fail fast in Open state; the wrapped operation is not invoked
//! - At most `half_open_max_successes` trials run at once in Half-Open; extra
//!   callers fail fast as if the circuit were open
//! - State changes only through call outcomes and the recovery timeout
//! - Closing needs several successes, reopening needs one failure
//! - The mutex guards admission and outcome recording, never the operation
//! - Outcomes are applied only within the state epoch they were admitted in

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing fast until the recovery timeout elapses.
    Open,
    /// Trial calls allowed through.
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

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a breaker-protected call.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker rejected the call without invoking the operation, either
    /// because it is open or because every half-open trial slot is taken.
    #[error("circuit '{name}' is open, next trial in {retry_after:?}")]
    CircuitOpen { name: String, retry_after: Duration },

    /// The operation itself failed.
    #[error("{0}")]
    Operation(E),
}

impl<E> CallError<E> {
    /// True when the breaker failed fast.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    /// The operation's own error, if there is one.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            CallError::CircuitOpen { .. } => None,
        }
    }
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    /// Remaining time before a trial call is admitted (Open only).
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    /// Half-open trials admitted and not yet settled.
    trials_in_flight: u32,
    /// Bumped on every transition.
    epoch: u64,
}

/// An admitted call. Dropping it unsettled (cancellation, panic) frees its
/// trial slot without recording an outcome.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    epoch: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.epoch, self.trial, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(self.epoch);
        }
    }
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    ///
    /// Thresholds below 1 are treated as 1.
    pub fn new(mut config: CircuitBreakerConfig) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        config.half_open_max_successes = config.half_open_max_successes.max(1);
        let recovery_timeout = config.recovery_timeout();

        metrics::record_breaker_state(&config.name, CircuitState::Closed);

        Self {
            config,
            recovery_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
                trials_in_flight: 0,
                epoch: 0,
            }),
        }
    }

    /// Name of the protected dependency.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Does not trigger the Open → Half-Open transition.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let retry_after_ms = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => Some(
                self.recovery_timeout
                    .saturating_sub(opened_at.elapsed())
                    .as_millis() as u64,
            ),
            _ => None,
        };

        BreakerSnapshot {
            name: self.config.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_successes: inner.half_open_successes,
            retry_after_ms,
        }
    }

    /// Run an async operation through the breaker.
    ///
    /// If the returned future is dropped before the operation completes, no
    /// outcome is recorded.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.admit().map_err(|retry_after| self.open_error::<E>(retry_after))?;
        let result = operation().await;
        permit.settle(result.is_ok());
        result.map_err(CallError::Operation)
    }

    /// Run a synchronous operation through the breaker.
    pub fn call_blocking<F, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.admit().map_err(|retry_after| self.open_error::<E>(retry_after))?;
        let result = operation();
        permit.settle(result.is_ok());
        result.map_err(CallError::Operation)
    }

    fn open_error<E>(&self, retry_after: Duration) -> CallError<E> {
        metrics::record_breaker_rejection(&self.config.name);
        tracing::debug!(
            breaker = %self.config.name,
            retry_after = ?retry_after,
            "Circuit open, failing fast"
        );
        CallError::CircuitOpen {
            name: self.config.name.clone(),
            retry_after,
        }
    }

    /// Decide whether a call may proceed. Rejections carry the remaining open
    /// time, zero when only the trial slots are exhausted.
    fn admit(&self) -> Result<Permit<'_>, Duration> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map(|at| at.elapsed())
                .unwrap_or(self.recovery_timeout);
            if elapsed < self.recovery_timeout {
                return Err(self.recovery_timeout - elapsed);
            }
            self.transition(&mut inner, CircuitState::HalfOpen);
        }

        let trial = inner.state == CircuitState::HalfOpen;
        if trial {
            if inner.trials_in_flight >= self.config.half_open_max_successes {
                return Err(Duration::ZERO);
            }
            inner.trials_in_flight += 1;
        }

        Ok(Permit {
            breaker: self,
            epoch: inner.epoch,
            trial,
            settled: false,
        })
    }

    fn release_trial(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch == epoch {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    fn record(&self, epoch: u64, trial: bool, success: bool) {
        let mut inner = self.inner.lock();

        if inner.epoch != epoch {
            tracing::debug!(
                breaker = %self.config.name,
                success,
                state = %inner.state,
                "Discarding outcome admitted before last transition"
            );
            return;
        }

        if trial {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }

        match (inner.state, success) {
            (CircuitState::Closed, true) => {
                inner.consecutive_failures = 0;
            }
            (CircuitState::Closed, false) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            (CircuitState::HalfOpen, true) => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max_successes {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, false) => {
                self.transition(&mut inner, CircuitState::Open);
            }
            // Admission never hands out an Open epoch.
            (CircuitState::Open, _) => {}
        }
    }

    /// Apply a transition. Caller holds the lock.
    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.trials_in_flight = 0;

        match to {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
                tracing::warn!(
                    breaker = %self.config.name,
                    from = %from,
                    failures = inner.consecutive_failures,
                    recovery_timeout = ?self.recovery_timeout,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes = 0;
                tracing::info!(breaker = %self.config.name, "Circuit breaker half-open, admitting trial calls");
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.half_open_successes = 0;
                inner.opened_at = None;
                tracing::info!(breaker = %self.config.name, from = %from, "Circuit breaker closed");
            }
        }

        metrics::record_breaker_transition(&self.config.name, to);
    }
}
