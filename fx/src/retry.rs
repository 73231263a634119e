//! Retry schedule and transient failure classification.

use std::time::Duration;

/// Exponential retry schedule: retry `n` waits `unit * 2^n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Multiplied by `2^n` for retry `n`.
    pub unit_delay: Duration,
    /// Upper bound on a single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 6,
            unit_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Initial attempt plus retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.unit_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Status codes worth retrying: server errors, 408, and 404.
///
/// The rate API answers 404 for dates it has not published yet, which
/// usually resolves on its own.
pub fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 404
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 7);

        let delays: Vec<u64> = (1..=policy.max_retries)
            .map(|n| policy.delay_for(n).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 64]);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn test_none_makes_single_attempt() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }

    #[test]
    fn test_transient_statuses() {
        for status in [500, 502, 503, 504, 408, 404] {
            assert!(is_transient_status(status), "{status}");
        }
        for status in [400, 401, 403, 422, 429] {
            assert!(!is_transient_status(status), "{status}");
        }
    }

    proptest! {
        #[test]
        fn prop_delays_grow_until_capped(unit_ms in 1u64..5_000, max_ms in 1u64..600_000, retry in 1u32..64) {
            let policy = RetryPolicy {
                max_retries: 64,
                unit_delay: Duration::from_millis(unit_ms),
                max_delay: Duration::from_millis(max_ms),
            };
            let delay = policy.delay_for(retry);
            prop_assert!(delay <= policy.max_delay);
            prop_assert!(delay >= policy.delay_for(retry - 1));
        }
    }
}
