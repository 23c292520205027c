//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate the delay to wait after `attempt` completed attempts.
///
/// The delay doubles per attempt starting from `base_ms` and is capped at
/// `max_ms`. `attempt == 0` yields no delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(max_ms))
}

/// Same as [`calculate_backoff`] plus 0 to 10% random jitter.
///
/// Jitter is added on top of the cap, so the result may exceed `max_ms` by
/// at most a tenth.
pub fn calculate_backoff_with_jitter(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let capped = calculate_backoff(attempt, base_ms, max_ms);
    let capped_ms = capped.as_millis() as u64;

    let jitter_range = capped_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter)
}
