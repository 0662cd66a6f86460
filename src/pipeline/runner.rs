//! Sequential pipeline execution under an optional overall timeout.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::chain::{Pipeline, StageEnv, StepFailure};
use super::{PipelineContext, StepRetryHandler};
use crate::error::{RagError, Result};
use crate::resilience::RetryPolicy;

/// Which step a run is in and how many have completed.
#[derive(Debug, Default)]
pub(crate) struct RunProgress {
    state: Mutex<(Option<String>, usize)>,
}

impl RunProgress {
    pub(crate) fn enter(&self, step: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.0 = Some(step.to_string());
        }
    }

    pub(crate) fn complete(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.1 += 1;
        }
    }

    fn snapshot(&self) -> (Option<String>, usize) {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineResult<O> {
    outcome: std::result::Result<O, StepFailure>,
    elapsed: Duration,
    steps_completed: usize,
}

impl<O> PipelineResult<O> {
    /// True if every step succeeded.
    #[inline]
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The last step's output, on success.
    pub fn output(&self) -> Option<&O> {
        self.outcome.as_ref().ok()
    }

    /// The short-circuiting failure, if any.
    pub fn failure(&self) -> Option<&StepFailure> {
        self.outcome.as_ref().err()
    }

    /// Time from pipeline start to completion or failure.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// [`elapsed`](Self::elapsed) in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Steps that finished successfully.
    #[inline]
    pub fn steps_completed(&self) -> usize {
        self.steps_completed
    }

    /// Converts into a plain `Result`; failures become [`RagError::Pipeline`].
    pub fn into_result(self) -> Result<O> {
        let elapsed = self.elapsed;
        self.outcome.map_err(|failure| RagError::Pipeline {
            step: failure.step,
            elapsed,
            source: Box::new(failure.error),
        })
    }
}

/// Runs [`Pipeline`]s step by step.
///
/// Steps run strictly in order. Each step is retried independently with the
/// run's retry policy; the first step whose retries are exhausted ends the
/// run and later steps are never invoked. An optional overall timeout derives
/// a cancellation signal that every step observes.
///
/// # Example
///
/// ```rust,ignore
/// let runner = PipelineRunner::new();
/// let result = runner
///     .execute(&pipeline, document, &ctx, Some(&RetryPolicy::default()), Some(Duration::from_secs(30)))
///     .await;
/// if let Some(failure) = result.failure() {
///     eprintln!("{} failed: {}", failure.step, failure.error);
/// }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineRunner {
    handler: StepRetryHandler,
}

impl PipelineRunner {
    /// Creates a runner.
    pub fn new() -> Self {
        Self {
            handler: StepRetryHandler::new(),
        }
    }

    /// Runs `pipeline` on `input`.
    ///
    /// Without `retry`, every step gets a single attempt. When `timeout`
    /// elapses, the in-flight step is abandoned and the run fails with
    /// [`RagError::Timeout`] attributed to that step.
    pub async fn execute<I, O>(
        &self,
        pipeline: &Pipeline<I, O>,
        input: I,
        ctx: &PipelineContext,
        retry: Option<&RetryPolicy>,
        timeout: Option<Duration>,
    ) -> PipelineResult<O>
    where
        I: Send + Sync,
        O: Send + Sync,
    {
        let started = Instant::now();
        let single_attempt = RetryPolicy::no_retry();
        let retry = retry.unwrap_or(&single_attempt);
        let cancel = ctx.cancellation().child_token();
        let progress = RunProgress::default();

        let env = StageEnv {
            ctx,
            retry,
            cancel: &cancel,
            handler: self.handler,
            progress: &progress,
        };
        let run = pipeline.stages().run(&input, &env);

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    cancel.cancel();
                    let (current, _) = progress.snapshot();
                    Err(StepFailure {
                        step: current
                            .or_else(|| pipeline.step_names().first().cloned())
                            .unwrap_or_default(),
                        attempts: 0,
                        error: RagError::timeout(limit),
                    })
                }
            },
            None => run.await,
        };

        let elapsed = started.elapsed();
        let (_, mut steps_completed) = progress.snapshot();
        if outcome.is_ok() {
            steps_completed = pipeline.len();
        }

        match &outcome {
            Ok(_) => {
                info!(
                    correlation_id = %ctx.correlation_id(),
                    tenant_id = %ctx.tenant_id(),
                    steps = pipeline.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline completed"
                );
            }
            Err(failure) => {
                ctx.tag("pipeline.failed_step", failure.step.as_str());
                warn!(
                    correlation_id = %ctx.correlation_id(),
                    tenant_id = %ctx.tenant_id(),
                    step = %failure.step,
                    attempts = failure.attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %failure.error,
                    "Pipeline failed"
                );
            }
        }
        ctx.tag("pipeline.elapsed_ms", elapsed.as_millis().to_string());

        PipelineResult {
            outcome,
            elapsed,
            steps_completed,
        }
    }
}
