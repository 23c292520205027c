//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `guard_breaker_transitions_total` (counter): by breaker and target state
//! - `guard_breaker_rejections_total` (counter): fail-fast rejections
//! - `guard_retry_attempts_total` (counter): re-attempts after a failure
//! - `guard_fallback_invocations_total` (counter): by key and outcome
//! - `guard_health_status` (gauge): 1=healthy, 0.5=degraded, 0=unavailable
//! - `guard_health_check_duration_seconds` (histogram): check latency
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::state::ServiceStatus;
use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    gauge!("guard_breaker_state", "breaker" => breaker.to_string()).set(state_value(state));
}

pub fn record_breaker_transition(breaker: &str, to: CircuitState) {
    counter!(
        "guard_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(breaker, to);
}

pub fn record_breaker_rejection(breaker: &str) {
    counter!("guard_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_retry_attempt() {
    counter!("guard_retry_attempts_total").increment(1);
}

pub fn record_fallback(key: &str, outcome: &'static str) {
    counter!(
        "guard_fallback_invocations_total",
        "key" => key.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_health(check: &str, status: ServiceStatus, elapsed: Duration) {
    gauge!("guard_health_status", "check" => check.to_string()).set(status.as_gauge());
    histogram!("guard_health_check_duration_seconds", "check" => check.to_string())
        .record(elapsed.as_secs_f64());
}
