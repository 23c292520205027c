//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failing operation up to `max_attempts` times
//! - Wait between attempts with capped exponential backoff
//! - Hand the last error back unchanged once attempts run out
//!
//! # Design Decisions
//! - No knowledge of circuit breakers; wrap a breaker call as the operation
//! - The wait is injected, so async callers pass `tokio::time::sleep` and
//!   tests pass a recorder
//! - `run_with_retry_if` stops early on errors that retrying cannot fix,
//!   e.g. an open circuit

use std::future::Future;
use std::time::Duration;

use crate::config::RetryStrategy;
use crate::observability::metrics;
use crate::resilience::backoff::{calculate_backoff, calculate_backoff_with_jitter};
use crate::resilience::circuit_breaker::CallError;
use crate::resilience::fallback::FallbackError;

impl RetryStrategy {
    /// Delay requested before attempt `attempt` (1-based).
    ///
    /// Attempt 1 has no delay; attempt k ≥ 2 waits
    /// `min(base_delay * 2^(k-2), max_delay)`.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        let completed = attempt.saturating_sub(1);
        if self.jitter {
            calculate_backoff_with_jitter(completed, self.base_delay_ms, self.max_delay_ms)
        } else {
            calculate_backoff(completed, self.base_delay_ms, self.max_delay_ms)
        }
    }

    /// `max_attempts`, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Whether an error is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl<E> Retryable for CallError<E> {
    /// An open circuit will keep failing fast; give up and fall back.
    fn is_retryable(&self) -> bool {
        !self.is_circuit_open()
    }
}

impl<E> Retryable for FallbackError<E> {
    /// A missing fallback is a configuration error.
    fn is_retryable(&self) -> bool {
        !self.is_not_registered()
    }
}

/// Run `operation` with retries, sleeping through `sleep` between attempts.
///
/// Returns the first success, or the last attempt's error unchanged.
pub async fn run_with_retry<F, Fut, T, E, S, SFut>(
    operation: F,
    strategy: &RetryStrategy,
    sleep: S,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    run_with_retry_if(operation, strategy, sleep, |_: &E| true).await
}

/// Like [`run_with_retry`], but an error for which `should_retry` returns
/// false is returned immediately.
pub async fn run_with_retry_if<F, Fut, T, E, S, SFut, P>(
    mut operation: F,
    strategy: &RetryStrategy,
    mut sleep: S,
    mut should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
    P: FnMut(&E) -> bool,
{
    let max_attempts = strategy.attempts();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !continue_after_failure(attempt, max_attempts, should_retry(&err)) {
            return Err(err);
        }

        attempt += 1;
        let delay = strategy.delay_before_attempt(attempt);
        tracing::info!(attempt, max_attempts, delay = ?delay, "Retrying operation");
        metrics::record_retry_attempt();
        sleep(delay).await;
    }
}

/// Blocking counterpart of [`run_with_retry`] for synchronous callers.
pub fn run_with_retry_blocking<F, T, E, S>(
    mut operation: F,
    strategy: &RetryStrategy,
    mut sleep: S,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    S: FnMut(Duration),
{
    let max_attempts = strategy.attempts();
    let mut attempt = 1;

    loop {
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !continue_after_failure(attempt, max_attempts, true) {
            return Err(err);
        }

        attempt += 1;
        let delay = strategy.delay_before_attempt(attempt);
        tracing::info!(attempt, max_attempts, delay = ?delay, "Retrying operation");
        metrics::record_retry_attempt();
        sleep(delay);
    }
}

fn continue_after_failure(attempt: u32, max_attempts: u32, retryable: bool) -> bool {
    if attempt >= max_attempts {
        tracing::warn!(attempts = attempt, "Retries exhausted");
        return false;
    }
    if !retryable {
        tracing::debug!(attempt, "Error is not retryable, giving up early");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::future::ready;

    #[derive(Debug, PartialEq)]
    struct FeedError(u32);

    fn strategy(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetryStrategy {
        RetryStrategy::new(
            max_attempts,
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
        )
    }

    #[test]
    fn test_delay_schedule() {
        let s = strategy(6, 200, 1000);
        assert_eq!(s.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(s.delay_before_attempt(2), Duration::from_millis(200));
        assert_eq!(s.delay_before_attempt(3), Duration::from_millis(400));
        assert_eq!(s.delay_before_attempt(4), Duration::from_millis(800));
        assert_eq!(s.delay_before_attempt(5), Duration::from_millis(1000));
        assert_eq!(s.delay_before_attempt(6), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_always_failing_operation_exhausts_attempts() {
        let calls = RefCell::new(0u32);
        let delays = RefCell::new(Vec::new());

        let result: Result<(), FeedError> = run_with_retry(
            || {
                *calls.borrow_mut() += 1;
                let n = *calls.borrow();
                ready(Err(FeedError(n)))
            },
            &strategy(3, 200, 1000),
            |d| {
                delays.borrow_mut().push(d);
                ready(())
            },
        )
        .await;

        // Last error, not a wrapper.
        assert_eq!(result, Err(FeedError(3)));
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(
            *delays.borrow(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = RefCell::new(0u32);
        let delays = RefCell::new(Vec::new());

        let result = run_with_retry(
            || {
                *calls.borrow_mut() += 1;
                let n = *calls.borrow();
                ready(if n < 2 { Err(FeedError(n)) } else { Ok(n) })
            },
            &strategy(5, 10, 100),
            |d| {
                delays.borrow_mut().push(d);
                ready(())
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(delays.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let calls = RefCell::new(0u32);
        let result: Result<(), FeedError> = run_with_retry(
            || {
                *calls.borrow_mut() += 1;
                ready(Err(FeedError(0)))
            },
            &strategy(0, 10, 100),
            |_| ready(()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_early() {
        let calls = RefCell::new(0u32);
        let result: Result<(), CallError<FeedError>> = run_with_retry_if(
            || {
                *calls.borrow_mut() += 1;
                ready(Err(CallError::CircuitOpen {
                    name: "feed".into(),
                    retry_after: Duration::from_secs(1),
                }))
            },
            &strategy(5, 10, 100),
            |_| ready(()),
            |e: &CallError<FeedError>| e.is_retryable(),
        )
        .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleep_waits_backoff() {
        let start = tokio::time::Instant::now();
        let result: Result<(), FeedError> = run_with_retry(
            || ready(Err(FeedError(0))),
            &strategy(3, 200, 1000),
            tokio::time::sleep,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_sleep_propagates() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let outcome = tokio::time::timeout(
            Duration::from_millis(300),
            run_with_retry(
                || {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    ready(Err::<(), _>(FeedError(0)))
                },
                &strategy(5, 200, 1000),
                tokio::time::sleep,
            ),
        )
        .await;

        assert!(outcome.is_err(), "timeout should cancel the retry loop");
        // Attempts at t=0 and t=200ms; the third would be at t=600ms.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_blocking_variant() {
        let mut calls = 0;
        let mut delays = Vec::new();
        let result: Result<u32, FeedError> = run_with_retry_blocking(
            || {
                calls += 1;
                if calls < 3 { Err(FeedError(calls)) } else { Ok(calls) }
            },
            &strategy(3, 50, 1000),
            |d| delays.push(d),
        );

        assert_eq!(result, Ok(3));
        assert_eq!(delays, vec![Duration::from_millis(50), Duration::from_millis(100)]);
    }
}
