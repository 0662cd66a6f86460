//! Retry, timeout and bulkhead composition around remote calls.
//!
//! Every remote call (embedding, chat completion, vector store) runs through a
//! [`ResiliencePolicy`]. The facets nest in a fixed order, outermost first:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Bulkhead   admit once per execution          │
//! │ ┌──────────────────────────────────────────┐ │
//! │ │ Retry     loop up to max_attempts        │ │
//! │ │ ┌──────────────────────────────────────┐ │ │
//! │ │ │ Timeout  bound on a single attempt   │ │ │
//! │ │ │          operation()                 │ │ │
//! │ │ └──────────────────────────────────────┘ │ │
//! │ └──────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! An expired attempt is abandoned and counts as a retryable failure. Backoff
//! delays are spent inside the bulkhead slot. Any facet may be omitted; with
//! none configured, execution is a pass-through.

mod bulkhead;
mod options;
mod retry;

pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use options::{BulkheadOptions, ResilienceOptions, RetryOptions, TimeoutOptions};
pub use retry::{BackoffStrategy, RetryPolicy};

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// One layer of a [`ResiliencePolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facet {
    /// Concurrency gate around the whole execution.
    Bulkhead,
    /// Attempt loop with backoff.
    Retry,
    /// Bound on each individual attempt.
    Timeout,
}

/// Composition of retry, per-attempt timeout and bulkhead.
///
/// A policy is shared (`Arc<ResiliencePolicy>`) by every caller of the same
/// remote resource; the bulkhead counts executions across all of them.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use pulserag::resilience::{Facet, ResiliencePolicy, RetryPolicy};
///
/// let policy = ResiliencePolicy::pass_through()
///     .with_retry(RetryPolicy::fixed(3, Duration::from_millis(10)))
///     .with_timeout(Duration::from_secs(2))
///     .with_bulkhead(4, 16)
///     .unwrap();
///
/// assert_eq!(policy.composition(), vec![Facet::Bulkhead, Facet::Retry, Facet::Timeout]);
/// ```
#[derive(Debug, Default)]
pub struct ResiliencePolicy {
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    bulkhead: Option<Bulkhead>,
}

impl ResiliencePolicy {
    /// Builds a policy from configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any enabled facet is invalid.
    pub fn new(options: &ResilienceOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            retry: options.retry.as_ref().map(|r| r.to_policy()),
            timeout: options.timeout.map(|t| t.duration()),
            bulkhead: options
                .bulkhead
                .map(|b| Bulkhead::new(b.max_parallelization, b.max_queuing_actions))
                .transpose()?,
        })
    }

    /// A policy with every facet disabled.
    pub fn pass_through() -> Self {
        Self::default()
    }

    /// Enables the retry facet.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Enables the per-attempt timeout facet.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Enables the bulkhead facet.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `max_parallelization` is 0.
    pub fn with_bulkhead(
        mut self,
        max_parallelization: usize,
        max_queuing_actions: usize,
    ) -> Result<Self> {
        self.bulkhead = Some(Bulkhead::new(max_parallelization, max_queuing_actions)?);
        Ok(self)
    }

    /// Enabled facets, outermost first.
    pub fn composition(&self) -> Vec<Facet> {
        let mut facets = Vec::with_capacity(3);
        if self.bulkhead.is_some() {
            facets.push(Facet::Bulkhead);
        }
        if self.retry.is_some() {
            facets.push(Facet::Retry);
        }
        if self.timeout.is_some() {
            facets.push(Facet::Timeout);
        }
        facets
    }

    /// The retry facet, if enabled.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// The per-attempt timeout, if enabled.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The bulkhead, if enabled.
    pub fn bulkhead(&self) -> Option<&Bulkhead> {
        self.bulkhead.as_ref()
    }

    /// Executes `operation` under every enabled facet.
    ///
    /// `operation` is invoked once per attempt and must produce a fresh future
    /// each time.
    ///
    /// # Errors
    ///
    /// - [`RagError::BulkheadRejected`] when the bulkhead is full
    /// - [`RagError::RetryExhausted`] carrying the last failure once retryable
    ///   failures used up every attempt
    /// - any non-retryable error from `operation`, unchanged
    /// - the last failure unchanged when retry is disabled
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_cancel(&CancellationToken::new(), operation)
            .await
    }

    /// Like [`execute`](Self::execute), observing `cancel` while queued in the
    /// bulkhead, during every attempt and during backoff delays.
    pub async fn execute_with_cancel<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let _permit = match &self.bulkhead {
            Some(bulkhead) => Some(bulkhead.acquire(cancel).await?),
            None => None,
        };

        self.retry_loop(cancel, operation).await
    }

    async fn retry_loop<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match self.attempt(cancel, &mut operation).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let Some(policy) = &self.retry else {
                return Err(err);
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if !policy.allows_retry_after(attempt) {
                warn!(attempts = attempt, error = %err, "Retries exhausted");
                return Err(RagError::retry_exhausted(attempt, started.elapsed(), err));
            }

            let delay = policy.delay_for(attempt);
            warn!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Remote call failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RagError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn attempt<T, F, Fut>(&self, cancel: &CancellationToken, operation: &mut F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let call = operation();
        match self.timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RagError::Cancelled),
                outcome = tokio::time::timeout(limit, call) => {
                    outcome.unwrap_or_else(|_| Err(RagError::timeout(limit)))
                }
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RagError::Cancelled),
                outcome = call => outcome,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_pass_through_returns_value() {
        let policy = ResiliencePolicy::pass_through();
        assert!(policy.composition().is_empty());
        let value = policy.execute(|| async { Ok::<_, RagError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_pass_through_surfaces_raw_error() {
        let policy = ResiliencePolicy::pass_through();
        let calls = AtomicU32::new(0);
        let err = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RagError::remote("vector-store", "503")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Remote { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_composition_from_options() {
        let options = ResilienceOptions {
            retry: Some(RetryOptions::default()),
            timeout: Some(TimeoutOptions { timeout_ms: 100 }),
            bulkhead: Some(BulkheadOptions {
                max_parallelization: 2,
                max_queuing_actions: 0,
            }),
        };
        let policy = ResiliencePolicy::new(&options).unwrap();
        assert_eq!(
            policy.composition(),
            vec![Facet::Bulkhead, Facet::Retry, Facet::Timeout]
        );
        assert_eq!(policy.retry_policy().unwrap().max_attempts, 4);
        assert_eq!(policy.attempt_timeout(), Some(Duration::from_millis(100)));
        assert_eq!(policy.bulkhead().unwrap().capacity(), 2);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ResilienceOptions {
            timeout: Some(TimeoutOptions { timeout_ms: 0 }),
            ..Default::default()
        };
        let err = ResiliencePolicy::new(&options).unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_already_cancelled_never_invokes() {
        let policy = ResiliencePolicy::pass_through();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let err = policy
            .execute_with_cancel(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RagError>(()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
