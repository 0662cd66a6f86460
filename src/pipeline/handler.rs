//! Per-step retry.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{PipelineContext, PipelineStep};
use crate::error::{RagError, Result};
use crate::resilience::RetryPolicy;

/// Outcome of running one step under a retry policy.
#[derive(Debug)]
pub struct StepResult<T> {
    outcome: Result<T>,
    attempts: u32,
    duration: Duration,
}

impl<T> StepResult<T> {
    /// True if some attempt succeeded.
    #[inline]
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The step's output, if it succeeded.
    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// The last attempt's error, if every attempt failed.
    pub fn error(&self) -> Option<&RagError> {
        self.outcome.as_ref().err()
    }

    /// Attempts made, including the successful one.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall time across all attempts and backoff delays.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// [`duration`](Self::duration) in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Converts into a plain `Result`, keeping the last error verbatim.
    pub fn into_result(self) -> Result<T> {
        self.outcome
    }
}

/// Retries a single [`PipelineStep`] with the shared backoff law.
///
/// Only retryable errors (see [`RagError::is_retryable`]) are retried; a
/// fatal error ends the step on the attempt that raised it.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepRetryHandler;

impl StepRetryHandler {
    /// Creates a handler.
    pub fn new() -> Self {
        Self
    }

    /// Runs `step` until it succeeds, fails fatally, or `policy` is exhausted.
    ///
    /// Observes the context's cancellation signal.
    pub async fn execute_with_retry<S>(
        &self,
        step: &S,
        input: &S::Input,
        ctx: &PipelineContext,
        policy: &RetryPolicy,
    ) -> StepResult<S::Output>
    where
        S: PipelineStep + ?Sized,
    {
        self.execute_with_retry_until(step, input, ctx, policy, ctx.cancellation())
            .await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), observing
    /// `cancel` instead of the context's own signal.
    ///
    /// A cancelled attempt or backoff is abandoned immediately and reported
    /// as [`RagError::Cancelled`].
    pub async fn execute_with_retry_until<S>(
        &self,
        step: &S,
        input: &S::Input,
        ctx: &PipelineContext,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> StepResult<S::Output>
    where
        S: PipelineStep + ?Sized,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        let outcome = loop {
            if cancel.is_cancelled() {
                break Err(RagError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RagError::Cancelled),
                result = step.execute(input, ctx) => result,
            };

            let err = match result {
                Ok(value) => break Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() || !policy.allows_retry_after(attempt) {
                break Err(err);
            }

            let delay = policy.delay_for(attempt);
            warn!(
                step = step.name(),
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                correlation_id = %ctx.correlation_id(),
                error = %err,
                "Step failed, retrying"
            );

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if cancelled {
                break Err(RagError::Cancelled);
            }
        };

        let duration = started.elapsed();
        debug!(
            step = step.name(),
            attempts = attempt,
            success = outcome.is_ok(),
            duration_ms = duration.as_millis() as u64,
            "Step finished"
        );

        StepResult {
            outcome,
            attempts: attempt,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TenantId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` attempts with the error built by `make_err`.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        make_err: fn() -> RagError,
    }

    impl Flaky {
        fn new(failures: u32, make_err: fn() -> RagError) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                make_err,
            }
        }
    }

    #[async_trait]
    impl PipelineStep for Flaky {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, input: &u32, _ctx: &PipelineContext) -> Result<u32> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err((self.make_err)())
            } else {
                Ok(input * 2)
            }
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(TenantId::new("acme").unwrap())
    }

    fn transient() -> RagError {
        RagError::step("flaky", "transient")
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retries() {
        let step = Flaky::new(2, transient);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(100));

        let result = StepRetryHandler::new()
            .execute_with_retry(&step, &21, &ctx(), &policy)
            .await;

        assert!(result.success());
        assert_eq!(result.value(), Some(&42));
        assert_eq!(result.attempts(), 3);
        assert!(result.duration() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_keeps_last_error_verbatim() {
        let step = Flaky::new(u32::MAX, transient);
        let policy = RetryPolicy::fixed(2, Duration::from_millis(10));

        let result = StepRetryHandler::new()
            .execute_with_retry(&step, &1, &ctx(), &policy)
            .await;

        assert!(!result.success());
        assert!(result.value().is_none());
        assert_eq!(result.attempts(), 2);
        assert!(matches!(result.error(), Some(RagError::Step { message, .. }) if message == "transient"));
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let step = Flaky::new(u32::MAX, || RagError::tenant_isolation("wrong tenant"));
        let policy = RetryPolicy::fixed(5, Duration::ZERO);

        let result = StepRetryHandler::new()
            .execute_with_retry(&step, &1, &ctx(), &policy)
            .await;

        assert_eq!(result.attempts(), 1);
        assert!(result.into_result().unwrap_err().is_tenant_isolation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let step = Flaky::new(u32::MAX, transient);
        let policy = RetryPolicy::fixed(10, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let ctx = ctx();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = StepRetryHandler::new()
            .execute_with_retry_until(&step, &1, &ctx, &policy, &cancel)
            .await;

        assert_eq!(result.attempts(), 1);
        assert!(result.error().unwrap().is_cancelled());
        assert!(result.duration() < Duration::from_secs(60));
    }
}
