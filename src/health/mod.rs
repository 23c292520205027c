//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Run every registered check concurrently
//!     → Build state.rs records, publish a HealthReport
//!
//! Check sources:
//!     probe.rs   → HTTP GET against a dependency endpoint
//!     passive.rs → state of the dependency's circuit breaker
//! ```
//!
//! # Design Decisions
//! - A check is a function from nothing to a `ServiceStatus`
//! - A broken check is reported, never raised
//! - Records are rebuilt on every evaluation, never accumulated

pub mod active;
pub mod passive;
pub mod probe;
pub mod state;

pub use active::{timed, CheckFuture, HealthMonitor, Timed, TimedCheck};
pub use passive::breaker_check;
pub use state::{HealthReport, ServiceHealth, ServiceStatus};
