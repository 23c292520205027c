//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a single attempt with a deadline
//! - Cancel the attempt cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from the operation's own errors
//! - A breaker call cancelled by the deadline records no outcome, so wrap
//!   the deadline inside the breaker call when a timeout should count as a
//!   failure

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Error of an operation run under [`with_deadline`].
#[derive(Debug, Error)]
pub enum DeadlineError<E> {
    #[error(transparent)]
    TimedOut(#[from] TimedOut),

    #[error("{0}")]
    Operation(E),
}

/// Run `future` with a deadline, flattening its own `Result`.
pub async fn with_deadline<F, T, E>(deadline: Duration, future: F) -> Result<T, DeadlineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DeadlineError::Operation(e)),
        Err(_) => {
            tracing::debug!(deadline = ?deadline, "Operation deadline exceeded");
            Err(DeadlineError::TimedOut(TimedOut(deadline)))
        }
    }
}
