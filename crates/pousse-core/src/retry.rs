//! Retry backoff policy
//!
//! Failed deliveries are retried on a fixed powers-of-4 schedule with a
//! uniform ±30% jitter. The twelfth failed attempt is terminal: the task
//! moves to the dead bucket instead of being rescheduled.

use std::time::Duration;

use rand::Rng;

/// Delay, in seconds, applied after failed attempt `t` (1-based) before
/// attempt `t + 1` becomes eligible.
pub const BACKOFF_SCHEDULE_SECS: [u64; 12] = [
    1, 4, 16, 64, 256, 1024, 4096, 16384, 65536, 262144, 1048576, 4194304,
];

/// Total delivery attempts before a task is declared dead.
pub const MAX_ATTEMPTS: u32 = 12;

/// Jitter factor bounds applied to every backoff delay.
pub const JITTER_MIN: f64 = 0.70;
pub const JITTER_MAX: f64 = 1.30;

/// Whether another attempt should be scheduled after a failure on attempt
/// number `tries` (1-based).
pub fn should_retry(tries: u32) -> bool {
    tries < MAX_ATTEMPTS
}

/// Jittered delay before the attempt following failed attempt `tries`.
/// Callers must only ask while [`should_retry`] holds.
pub fn backoff_delay(tries: u32) -> Duration {
    backoff_delay_with(&mut rand::thread_rng(), tries)
}

/// Same as [`backoff_delay`], with the randomness injected so tests can
/// pin it down with a seeded generator.
pub fn backoff_delay_with<R: Rng>(rng: &mut R, tries: u32) -> Duration {
    let index = (tries.saturating_sub(1) as usize).min(BACKOFF_SCHEDULE_SECS.len() - 1);
    let base = BACKOFF_SCHEDULE_SECS[index] as f64;
    let factor = rng.gen_range(JITTER_MIN..=JITTER_MAX);
    Duration::from_secs_f64(base * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn schedule_is_powers_of_four() {
        for window in BACKOFF_SCHEDULE_SECS.windows(2) {
            assert_eq!(window[1], window[0] * 4);
        }
    }

    #[test]
    fn twelfth_failure_is_terminal() {
        assert!(should_retry(1));
        assert!(should_retry(11));
        assert!(!should_retry(12));
    }

    #[test]
    fn jitter_stays_within_thirty_percent() {
        let mut rng = StdRng::seed_from_u64(7);
        for tries in 1..MAX_ATTEMPTS {
            let base = BACKOFF_SCHEDULE_SECS[(tries - 1) as usize] as f64;
            // Tiny epsilon absorbs the nanosecond rounding in Duration.
            for _ in 0..200 {
                let delay = backoff_delay_with(&mut rng, tries).as_secs_f64();
                assert!(
                    delay >= base * JITTER_MIN - 1e-6,
                    "delay {delay} below bound for try {tries}"
                );
                assert!(
                    delay <= base * JITTER_MAX + 1e-6,
                    "delay {delay} above bound for try {tries}"
                );
            }
        }
    }

    #[test]
    fn jitter_is_spread_not_constant() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<f64> = (0..100)
            .map(|_| backoff_delay_with(&mut rng, 1).as_secs_f64())
            .collect();
        let below = samples.iter().filter(|d| **d < 1.0).count();
        let above = samples.iter().filter(|d| **d > 1.0).count();
        // A uniform ±30% factor lands on both sides of the base delay.
        assert!(below > 10);
        assert!(above > 10);
    }
}
