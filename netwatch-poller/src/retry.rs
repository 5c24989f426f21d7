//! Per-host retry policy, kept as data so the engine loop stays a plain bounded loop

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per host, first one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub delay: Duration,
    /// 1.0 keeps the delay fixed
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(5),
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay, ..Self::default() }.normalized()
    }

    /// A host is always tried at least once; nonsensical factors fall back to fixed delay
    pub fn normalized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            self.backoff_factor = 1.0;
        }
        if self.max_delay < self.delay {
            self.max_delay = self.delay;
        }
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Sleep before attempt `attempt + 1`, given that `attempt` (1-based) just failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(5));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        }
        .normalized();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_means_one_try() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn test_bad_factor_falls_back_to_fixed() {
        let policy = RetryPolicy { backoff_factor: f64::NAN, ..RetryPolicy::default() }.normalized();
        assert_eq!(policy.delay_for(3), policy.delay);
    }
}
