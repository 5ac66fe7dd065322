//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate the delay before retry number `retry` (0-based).
///
/// The delay doubles on every retry starting at `base`, and `multiplier`
/// scales the base (rate-limited failures start higher). Jitter of up to 10%
/// is added before the cap, so consecutive delays never decrease and never
/// exceed `max`.
pub fn calculate_backoff(retry: u32, base: Duration, max: Duration, multiplier: u32, jitter: bool) -> Duration {
    let base_ms = base.as_millis().min(u64::MAX as u128) as u64;
    let max_ms = max.as_millis().min(u64::MAX as u128) as u64;

    let exponential = 2u64.saturating_pow(retry);
    let delay_ms = base_ms
        .saturating_mul(multiplier.max(1) as u64)
        .saturating_mul(exponential);

    let jitter_ms = if jitter {
        let range = delay_ms.min(max_ms) / 10;
        if range > 0 {
            rand::thread_rng().gen_range(0..range)
        } else {
            0
        }
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(jitter_ms).min(max_ms))
}
