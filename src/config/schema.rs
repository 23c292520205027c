//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the toolkit.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Retry strategy shared by callers that do not bring their own.
    pub retry: RetryStrategy,

    /// One breaker per protected dependency.
    pub breakers: Vec<CircuitBreakerConfig>,

    /// Health monitoring settings.
    pub health: HealthConfig,
}

/// Circuit breaker settings for a single dependency.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    /// Identifier of the protected dependency.
    pub name: String,

    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial call is admitted.
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: f64,

    /// Consecutive half-open successes required to close. Also the number of
    /// trial calls allowed in flight while half-open.
    #[serde(default = "default_half_open_max_successes")]
    pub half_open_max_successes: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> f64 {
    30.0
}

fn default_half_open_max_successes() -> u32 {
    2
}

impl CircuitBreakerConfig {
    /// Default settings for the named dependency.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            half_open_max_successes: default_half_open_max_successes(),
        }
    }

    /// Recovery timeout as a `Duration`. Negative or non-finite values map to zero.
    pub fn recovery_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.recovery_timeout_secs).unwrap_or_default()
    }
}

/// Retry strategy. Stateless; share freely.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryStrategy {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for any single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: false,
        }
    }
}

impl RetryStrategy {
    /// Delays have millisecond resolution; a partial millisecond rounds up so
    /// a non-zero delay never becomes zero.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: ceil_millis(base_delay),
            max_delay_ms: ceil_millis(max_delay),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

fn ceil_millis(d: Duration) -> u64 {
    let mut millis = d.as_millis();
    if d.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Health monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Polling interval in seconds.
    pub interval_secs: u64,

    /// Per-check timeout in seconds.
    pub timeout_secs: u64,

    /// HTTP endpoints to probe.
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 5,
            endpoints: Vec::new(),
        }
    }
}

/// An HTTP endpoint probed by the health monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Check name reported in health records.
    pub name: String,

    /// URL to GET.
    pub url: String,

    /// Breaker whose state is reported as an additional check.
    #[serde(default)]
    pub breaker: Option<String>,

    /// Responses slower than this are reported as degraded.
    #[serde(default = "default_degraded_latency_ms")]
    pub degraded_latency_ms: u64,
}

fn default_degraded_latency_ms() -> u64 {
    1000
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Colored log output.
    pub ansi: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ansi: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
