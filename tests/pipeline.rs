//! Integration tests for typed pipelines and per-step retry.
//!
//! Tests the full stack: Pipeline builder → PipelineRunner → StepRetryHandler.
//! Verifies independent step retries, short-circuiting, overall timeouts,
//! cancellation and context tagging.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pulserag::pipeline::{
    Pipeline, PipelineContext, PipelineRunner, PipelineStep, StepRetryHandler,
};
use pulserag::resilience::RetryPolicy;
use pulserag::{CorrelationId, RagError, Result, TenantId};
use tokio_util::sync::CancellationToken;

/// A step that fails its first `failures` calls, then transforms its input.
struct CountingStep<I, O> {
    name: &'static str,
    failures: u32,
    calls: Arc<AtomicU32>,
    delay: Duration,
    transform: fn(&I) -> O,
}

impl<I, O> CountingStep<I, O> {
    fn new(name: &'static str, transform: fn(&I) -> O) -> Self {
        Self {
            name,
            failures: 0,
            calls: Arc::new(AtomicU32::new(0)),
            delay: Duration::ZERO,
            transform,
        }
    }

    fn failing(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl<I, O> PipelineStep for CountingStep<I, O>
where
    I: Send + Sync,
    O: Send + Sync,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, input: &I, _ctx: &PipelineContext) -> Result<O> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call <= self.failures {
            return Err(RagError::step(self.name, format!("transient failure {call}")));
        }
        Ok((self.transform)(input))
    }
}

fn ctx() -> PipelineContext {
    PipelineContext::new(TenantId::new("acme").unwrap())
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(max_attempts, Duration::from_millis(10))
}

// ============================================================================
// Independent Step Retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_each_step_retried_independently() {
    let parse = CountingStep::new("parse", |s: &String| s.len());
    let double = CountingStep::new("double", |n: &usize| n * 2).failing(2);
    let render = CountingStep::new("render", |n: &usize| format!("len*2={n}"));
    let parse_calls = parse.calls();
    let double_calls = double.calls();
    let render_calls = render.calls();

    let pipeline = Pipeline::new(parse).then(double).then(render);
    let ctx = ctx();
    let result = PipelineRunner::new()
        .execute(&pipeline, "hello".to_string(), &ctx, Some(&fast_retry(3)), None)
        .await;

    assert!(result.success());
    assert_eq!(result.output().map(String::as_str), Some("len*2=10"));
    assert_eq!(result.steps_completed(), 3);
    assert_eq!(parse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(double_calls.load(Ordering::SeqCst), 3);
    assert_eq!(render_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_step_short_circuits() {
    let first = CountingStep::new("first", |n: &u32| n + 1);
    let broken = CountingStep::new("broken", |n: &u32| n + 1).failing(u32::MAX);
    let last = CountingStep::new("last", |n: &u32| n + 1);
    let (broken_calls, last_calls) = (broken.calls(), last.calls());

    let pipeline = Pipeline::new(first).then(broken).then(last);
    let ctx = ctx();
    let result = PipelineRunner::new()
        .execute(&pipeline, 0, &ctx, Some(&fast_retry(2)), None)
        .await;

    assert!(!result.success());
    assert_eq!(result.steps_completed(), 1);
    assert_eq!(broken_calls.load(Ordering::SeqCst), 2);
    assert_eq!(last_calls.load(Ordering::SeqCst), 0);

    let failure = result.failure().unwrap();
    assert_eq!(failure.step, "broken");
    assert_eq!(failure.attempts, 2);
    assert!(failure.error.to_string().contains("transient failure 2"));
    assert_eq!(
        ctx.tag_value("pipeline.failed_step").as_deref(),
        Some("broken")
    );
}

#[tokio::test]
async fn test_fatal_step_error_not_retried() {
    struct Invalid;

    #[async_trait]
    impl PipelineStep for Invalid {
        type Input = u32;
        type Output = u32;

        fn name(&self) -> &str {
            "invalid"
        }

        async fn execute(&self, _input: &u32, _ctx: &PipelineContext) -> Result<u32> {
            Err(RagError::tenant_isolation("record owned by another tenant"))
        }
    }

    let pipeline = Pipeline::new(Invalid);
    let result = PipelineRunner::new()
        .execute(&pipeline, 1, &ctx(), Some(&fast_retry(5)), None)
        .await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.attempts, 1);
    assert!(failure.error.is_tenant_isolation());
}

#[tokio::test]
async fn test_without_retry_policy_each_step_runs_once() {
    let flaky = CountingStep::new("flaky", |n: &u32| *n).failing(1);
    let calls = flaky.calls();

    let result = PipelineRunner::new()
        .execute(&Pipeline::new(flaky), 7, &ctx(), None, None)
        .await;

    assert!(!result.success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Overall Timeout and Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_overall_timeout_attributed_to_running_step() {
    let quick = CountingStep::new("quick", |n: &u32| n + 1);
    let slow = CountingStep::new("slow", |n: &u32| n + 1).slow(Duration::from_secs(60));
    let after = CountingStep::new("after", |n: &u32| n + 1);
    let after_calls = after.calls();

    let pipeline = Pipeline::new(quick).then(slow).then(after);
    let ctx = ctx();
    let result = PipelineRunner::new()
        .execute(&pipeline, 0, &ctx, None, Some(Duration::from_secs(1)))
        .await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.step, "slow");
    assert!(failure.error.is_timeout());
    assert_eq!(result.steps_completed(), 1);
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    assert!(result.elapsed() >= Duration::from_secs(1));
    assert!(result.elapsed() < Duration::from_secs(2));

    match result.into_result().unwrap_err() {
        RagError::Pipeline { step, source, .. } => {
            assert_eq!(step, "slow");
            assert!(source.is_timeout());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_context_cancellation_stops_run() {
    let slow = CountingStep::new("slow", |n: &u32| *n).slow(Duration::from_secs(60));
    let pipeline = Pipeline::new(slow);
    let token = CancellationToken::new();
    let ctx = ctx().with_cancellation(token.clone());

    let runner = PipelineRunner::new();
    let run = runner.execute(&pipeline, 0, &ctx, None, None);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    };
    let (result, ()) = tokio::join!(run, cancel);

    let failure = result.failure().unwrap();
    assert_eq!(failure.step, "slow");
    assert!(failure.error.is_cancelled());
}

// ============================================================================
// Context
// ============================================================================

#[tokio::test]
async fn test_context_carries_correlation_and_tags() {
    let correlation_id = CorrelationId::new();
    let ctx = ctx().with_correlation_id(correlation_id);

    let pipeline = Pipeline::new(CountingStep::new("one", |n: &u32| n + 1))
        .then(CountingStep::new("two", |n: &u32| n + 1));
    assert_eq!(pipeline.step_names(), ["one", "two"]);
    assert_eq!(pipeline.len(), 2);

    let result = PipelineRunner::new()
        .execute(&pipeline, 0, &ctx, None, None)
        .await;
    assert_eq!(result.into_result().unwrap(), 2);

    assert_eq!(ctx.correlation_id(), correlation_id);
    let steps: Vec<String> = ctx
        .tags()
        .into_iter()
        .filter(|(k, _)| k == "pipeline.step")
        .map(|(_, v)| v)
        .collect();
    assert_eq!(steps, ["one", "two"]);
    assert!(ctx.tag_value("pipeline.elapsed_ms").is_some());
    assert!(ctx.tag_value("pipeline.failed_step").is_none());
}

// ============================================================================
// Step Retry Handler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_handler_reports_attempts_and_duration() {
    let step = CountingStep::new("flaky", |n: &u32| n * 10).failing(2);
    let policy = RetryPolicy::exponential(
        4,
        Duration::from_millis(100),
        2.0,
        Duration::from_secs(1),
    );

    let result = StepRetryHandler::new()
        .execute_with_retry(&step, &3, &ctx(), &policy)
        .await;

    assert!(result.success());
    assert_eq!(result.value(), Some(&30));
    assert_eq!(result.attempts(), 3);
    // 100ms + 200ms of backoff
    assert!(result.duration() >= Duration::from_millis(300));
    assert!(result.duration() < Duration::from_millis(400));
}
