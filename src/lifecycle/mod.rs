//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build breakers, retry strategy, health monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast to background tasks → Tasks exit their loops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Every shared object is built once at startup and passed explicitly
//! - Background loops own a shutdown receiver and exit on their own

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::Guard;
