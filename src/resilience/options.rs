//! Serializable resilience configuration.
//!
//! Durations are expressed in milliseconds so the options round-trip through
//! JSON config files unchanged. Each facet is optional; an absent facet is
//! disabled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::{BackoffStrategy, RetryPolicy};
use crate::error::ValidationError;

/// Which resilience facets wrap a remote call.
///
/// # Example
///
/// ```rust
/// use pulserag::resilience::{BulkheadOptions, ResilienceOptions, TimeoutOptions};
///
/// let options = ResilienceOptions {
///     timeout: Some(TimeoutOptions { timeout_ms: 5_000 }),
///     bulkhead: Some(BulkheadOptions { max_parallelization: 8, max_queuing_actions: 32 }),
///     ..Default::default()
/// };
/// assert!(options.validate().is_ok());
/// assert!(options.retry.is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceOptions {
    /// Retry facet. Disabled by default.
    pub retry: Option<RetryOptions>,

    /// Per-attempt timeout facet. Disabled by default.
    pub timeout: Option<TimeoutOptions>,

    /// Concurrency gate. Disabled by default.
    pub bulkhead: Option<BulkheadOptions>,
}

impl ResilienceOptions {
    /// All facets disabled: execution is a pass-through. Same as `default()`.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Only the retry facet, with its default exponential schedule.
    pub fn retry_only() -> Self {
        Self {
            retry: Some(RetryOptions::default()),
            ..Self::default()
        }
    }

    /// Validates every enabled facet.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(retry) = &self.retry {
            retry.to_policy().validate()?;
        }
        if let Some(timeout) = &self.timeout {
            timeout.validate()?;
        }
        if let Some(bulkhead) = &self.bulkhead {
            bulkhead.validate()?;
        }
        Ok(())
    }
}

/// Retry facet options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,

    /// Initial delay between attempts, in milliseconds.
    pub delay_ms: u64,

    /// Fixed or exponential backoff.
    pub backoff_strategy: BackoffStrategy,

    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Exponential growth factor.
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1_000,
            backoff_strategy: BackoffStrategy::Exponential,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    /// Converts to the runtime retry policy.
    pub fn to_policy(&self) -> RetryPolicy {
        let multiplier = match self.backoff_strategy {
            BackoffStrategy::Fixed => 1.0,
            BackoffStrategy::Exponential => self.backoff_multiplier,
        };
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            initial_delay: Duration::from_millis(self.delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: multiplier,
            strategy: self.backoff_strategy,
        }
    }
}

/// Per-attempt timeout options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOptions {
    /// Bound on a single attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl TimeoutOptions {
    /// The bound as a `Duration`.
    #[inline]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 {
            return Err(ValidationError::invalid_field(
                "timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Bulkhead options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadOptions {
    /// Executions allowed to run at the same time.
    pub max_parallelization: usize,

    /// Executions allowed to wait for a slot; beyond this, callers are rejected.
    #[serde(default)]
    pub max_queuing_actions: usize,
}

impl BulkheadOptions {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_parallelization == 0 {
            return Err(ValidationError::invalid_field(
                "max_parallelization",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
