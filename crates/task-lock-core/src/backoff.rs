//! Retry sleep schedule for blocking acquisition.

use std::time::Duration;

use rand::Rng;

/// Jittered, linearly growing backoff between acquisition attempts.
///
/// Attempt index `i` (zero-based) sleeps `base * (i + 1)` plus a uniformly
/// random component in `[0, jitter]`. The random component spreads out
/// waiters contending for the same token so they do not retry in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetrySchedule {
    base: Duration,
    jitter: Duration,
}

impl RetrySchedule {
    /// Creates a schedule from a base step and a jitter ceiling.
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Returns the sleep duration for the given zero-based attempt index.
    pub fn delay(&self, attempt: u32) -> Duration {
        let linear = self.base.saturating_mul(attempt.saturating_add(1));
        let jitter_millis = self.jitter.as_millis() as u64;
        if jitter_millis == 0 {
            return linear;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_millis);
        linear.saturating_add(Duration::from_millis(jitter))
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            jitter: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_linearly_with_attempt_index() {
        let schedule = RetrySchedule::new(Duration::from_millis(50), Duration::ZERO);
        assert_eq!(schedule.delay(0), Duration::from_millis(50));
        assert_eq!(schedule.delay(1), Duration::from_millis(100));
        assert_eq!(schedule.delay(4), Duration::from_millis(250));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_millis(10);
        let jitter = Duration::from_millis(20);
        let schedule = RetrySchedule::new(base, jitter);
        for attempt in 0..5 {
            let linear = base * (attempt + 1);
            for _ in 0..100 {
                let delay = schedule.delay(attempt);
                assert!(delay >= linear);
                assert!(delay <= linear + jitter);
            }
        }
    }
}
