//! Dependency guard: circuit breakers, retries, fallbacks and health
//! monitoring for calls to unreliable external dependencies.
//!
//! ```text
//! caller
//!   → run_with_retry(|| breaker.call(op), &strategy, tokio::time::sleep)
//!   → on CircuitOpen / exhaustion: fallbacks.execute(key)
//!
//! HealthMonitor (independent)
//!   → probes + breaker states → HealthReport
//! ```

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

/// Boxed error used at the health-check seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::schema::GuardConfig;
pub use health::{HealthMonitor, HealthReport, ServiceHealth, ServiceStatus};
pub use lifecycle::{Guard, Shutdown};
pub use resilience::{
    run_with_retry, CallError, CircuitBreaker, CircuitState, FallbackError, FallbackRegistry,
};
