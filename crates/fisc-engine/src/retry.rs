//! Retry budget and backoff for retryable rejections.

use std::time::Duration;

use fisc_core::Timestamp;

/// Default number of submission attempts before the sweep gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY_SECS: u64 = 60;

/// Default upper bound on the delay between retries.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 3_600;

/// Exponential backoff: `base * 2^(attempts - 1)`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed before the sweep stops retrying.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Maximum delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(DEFAULT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempts` failed attempts.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether another attempt fits in the budget.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// When the next retry becomes due, or `None` once the budget is spent.
    pub fn next_retry_at(&self, now: Timestamp, attempts: u32) -> Option<Timestamp> {
        if !self.allows(attempts) {
            return None;
        }
        let secs = i64::try_from(self.delay_after(attempts).as_secs()).unwrap_or(i64::MAX);
        Some(now.plus_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let p = RetryPolicy::default();
        let secs: Vec<u64> = (1..=8).map(|a| p.delay_after(a).as_secs()).collect();
        assert_eq!(secs, vec![60, 120, 240, 480, 960, 1920, 3600, 3600]);
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        assert_eq!(RetryPolicy::default().delay_after(u32::MAX).as_secs(), 3600);
    }

    #[test]
    fn budget_is_exhausted_after_max_attempts() {
        let p = RetryPolicy::default();
        let now = Timestamp::now();
        assert!(p.next_retry_at(now, 4).is_some());
        assert!(p.next_retry_at(now, 5).is_none());
        assert_eq!(p.next_retry_at(now, 1), Some(now.plus_secs(60)));
    }
}
