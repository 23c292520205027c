//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → retries.rs (re-run with backoff.rs delays)
//!         → circuit_breaker.rs (fail fast or execute, track outcome)
//!             → timeouts.rs (optional per-attempt deadline)
//!     → On terminal failure: caller consults fallback.rs
//! ```
//!
//! # Design Decisions
//! - Breakers are explicit objects, one per dependency (breaker_set.rs)
//! - Retry knows nothing about breakers; composition joins them
//! - Neither layer swallows a terminal failure; the caller picks the fallback

pub mod backoff;
pub mod breaker_set;
pub mod circuit_breaker;
pub mod fallback;
pub mod retries;
pub mod timeouts;

pub use breaker_set::CircuitBreakers;
pub use circuit_breaker::{BreakerSnapshot, CallError, CircuitBreaker, CircuitState};
pub use fallback::{FallbackError, FallbackRegistry};
pub use retries::{run_with_retry, run_with_retry_blocking, run_with_retry_if, Retryable};
pub use timeouts::{with_deadline, DeadlineError, TimedOut};
