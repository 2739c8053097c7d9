//! Retry policy for the optimistic upsert loop.

use std::time::Duration;

/// How many times an upsert may retry after a watch conflict, and how long
/// to wait between attempts.
///
/// Retries happen only when another writer committed to the same
/// collection between this writer's read and its commit. Transport errors are
/// never retried.
///
/// The default is [`unbounded`](RetryPolicy::unbounded) with no delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, `None` for no limit.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Retries for as long as conflicts keep happening, without delay.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Gives up after `max_attempts` attempts (at least one is always made).
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            ..Self::unbounded()
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        if self.max_delay < delay {
            self.max_delay = delay;
        }
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns true if attempt number `attempt` (1-based) may run.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Calculates the delay before attempt number `attempt` (1-based).
    ///
    /// The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let retries = attempt.saturating_sub(2).min(i32::MAX as u32) as i32;
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(retries);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_allows_everything() {
        let policy = RetryPolicy::unbounded();
        assert!(policy.allows_attempt(1));
        assert!(policy.allows_attempt(u32::MAX));
        assert_eq!(policy.delay_before(1_000), Duration::ZERO);
    }

    #[test]
    fn bounded_stops_after_limit() {
        let policy = RetryPolicy::bounded(3);
        assert!(policy.allows_attempt(3));
        assert!(!policy.allows_attempt(4));
    }

    #[test]
    fn bounded_zero_still_makes_one_attempt() {
        let policy = RetryPolicy::bounded(0);
        assert!(policy.allows_attempt(1));
        assert!(!policy.allows_attempt(2));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::bounded(10)
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50))
            .with_backoff_multiplier(2.0);

        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(10));
        assert_eq!(policy.delay_before(3), Duration::from_millis(20));
        assert_eq!(policy.delay_before(4), Duration::from_millis(40));
        assert_eq!(policy.delay_before(5), Duration::from_millis(50));
    }
}
