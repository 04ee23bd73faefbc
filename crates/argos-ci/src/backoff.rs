//! Retry backoff: exponential with jitter, capped.

use std::time::Duration;

use rand::Rng;

/// Maximum attempts per request (first try included).
pub const MAX_ATTEMPTS: u32 = 6;

const INITIAL_MS: u64 = 1_000;
const FACTOR: u64 = 2;
const CAP_MS: u64 = 60_000;
const JITTER_MS: u64 = 500;

/// Delay before retry number `attempt` (1-based). Exponential from 1s,
/// factor 2, capped at 60s, plus up to 500ms of jitter.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let base = INITIAL_MS.saturating_mul(FACTOR.saturating_pow(attempt.saturating_sub(1)));
    let capped = base.min(CAP_MS);
    let jitter = rand::thread_rng().gen_range(0..=JITTER_MS);
    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let d1 = delay_for_attempt(1).as_millis() as u64;
        assert!((1_000..=1_500).contains(&d1));
        let d3 = delay_for_attempt(3).as_millis() as u64;
        assert!((4_000..=4_500).contains(&d3));
        let d10 = delay_for_attempt(10).as_millis() as u64;
        assert!((60_000..=60_500).contains(&d10));
    }
}
