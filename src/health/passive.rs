//! Passive health signal from circuit breakers.
//!
//! A breaker already tracks the outcomes of real calls, so its state is a
//! free health signal for the dependency it protects:
//!
//! ```text
//! Closed    → Healthy
//! Half-Open → Degraded
//! Open      → Unavailable
//! ```

use std::future::{ready, Ready};
use std::sync::Arc;

use crate::health::state::ServiceStatus;
use crate::resilience::{CircuitBreaker, CircuitState};
use crate::BoxError;

/// Health status implied by a breaker state.
pub fn status_for(state: CircuitState) -> ServiceStatus {
    match state {
        CircuitState::Closed => ServiceStatus::Healthy,
        CircuitState::HalfOpen => ServiceStatus::Degraded,
        CircuitState::Open => ServiceStatus::Unavailable,
    }
}

/// A health check that reports the state of `breaker`.
pub fn breaker_check(
    breaker: Arc<CircuitBreaker>,
) -> impl Fn() -> Ready<Result<ServiceStatus, BoxError>> + Send + Sync + 'static {
    move || ready(Ok(status_for(breaker.state())))
}
