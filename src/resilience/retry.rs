//! Retry policy and backoff law.
//!
//! Shared by [`ResiliencePolicy`](super::ResiliencePolicy) and the pipeline
//! [`StepRetryHandler`](crate::pipeline::StepRetryHandler), so a remote call
//! and a pipeline step back off identically.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Growth law for the delay between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Every wait is `initial_delay`.
    Fixed,

    /// `min(initial_delay * multiplier^(attempt-1), max_delay)`.
    #[default]
    Exponential,
}

/// How many times to attempt an operation and how long to wait in between.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use pulserag::resilience::RetryPolicy;
///
/// let policy = RetryPolicy::exponential(
///     5,
///     Duration::from_millis(1000),
///     2.0,
///     Duration::from_millis(30_000),
/// );
/// assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
/// assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
/// assert_eq!(policy.delay_for(10), Duration::from_millis(30_000));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (>= 1).
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub initial_delay: Duration,

    /// Upper bound on any single delay (>= `initial_delay`).
    pub max_delay: Duration,

    /// Exponential growth factor (>= 1.0).
    pub backoff_multiplier: f64,

    /// Fixed or exponential growth.
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Constant delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Exponentially growing delay, capped at `max_delay`.
    pub fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Validates the policy invariants.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - `max_attempts` is 0
    /// - `max_delay` < `initial_delay`
    /// - `backoff_multiplier` is below 1.0 or not finite
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid_field(
                "max_attempts",
                "must be at least 1",
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ValidationError::invalid_field(
                "max_delay",
                format!(
                    "must be >= initial_delay ({:?} < {:?})",
                    self.max_delay, self.initial_delay
                ),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::invalid_field(
                "backoff_multiplier",
                format!("must be >= 1.0, got {}", self.backoff_multiplier),
            ));
        }
        Ok(())
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let factor = self.backoff_multiplier.powi(exponent);
                let nanos = self.initial_delay.as_nanos() as f64 * factor;
                if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
                    self.max_delay
                } else {
                    Duration::from_nanos(nanos as u64)
                }
            }
        }
    }

    /// Returns true if another attempt is allowed after `attempt` failures.
    #[inline]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
