//! Typed step chains.
//!
//! A [`Pipeline<I, O>`] only accepts a next step whose input type is the
//! current output type, so a mis-ordered pipeline does not compile:
//!
//! ```rust,compile_fail
//! # use async_trait::async_trait;
//! # use pulserag::pipeline::{Pipeline, PipelineContext, PipelineStep};
//! # use pulserag::Result;
//! struct Len;
//! #[async_trait]
//! impl PipelineStep for Len {
//!     type Input = String;
//!     type Output = usize;
//!     fn name(&self) -> &str { "len" }
//!     async fn execute(&self, input: &String, _: &PipelineContext) -> Result<usize> {
//!         Ok(input.len())
//!     }
//! }
//!
//! // `Len` outputs usize; a second `Len` needs a String.
//! let pipeline = Pipeline::new(Len).then(Len);
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::runner::RunProgress;
use super::{PipelineContext, PipelineStep, StepRetryHandler};
use crate::error::RagError;
use crate::resilience::RetryPolicy;

/// Failure of the step that short-circuited a pipeline.
#[derive(Debug)]
pub struct StepFailure {
    /// Name of the failing step.
    pub step: String,
    /// Attempts made on the failing step.
    pub attempts: u32,
    /// The step's last error, verbatim.
    pub error: RagError,
}

/// Execution environment shared by every stage of one run.
pub(crate) struct StageEnv<'a> {
    pub(crate) ctx: &'a PipelineContext,
    pub(crate) retry: &'a RetryPolicy,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) handler: StepRetryHandler,
    pub(crate) progress: &'a RunProgress,
}

#[async_trait]
pub(crate) trait Stage<I, O>: Send + Sync {
    async fn run(&self, input: &I, env: &StageEnv<'_>) -> Result<O, StepFailure>;
}

struct StepStage<S> {
    step: S,
}

#[async_trait]
impl<S> Stage<S::Input, S::Output> for StepStage<S>
where
    S: PipelineStep,
{
    async fn run(&self, input: &S::Input, env: &StageEnv<'_>) -> Result<S::Output, StepFailure> {
        let name = self.step.name();
        env.progress.enter(name);
        env.ctx.tag("pipeline.step", name);
        debug!(step = name, correlation_id = %env.ctx.correlation_id(), "Step started");

        let result = env
            .handler
            .execute_with_retry_until(&self.step, input, env.ctx, env.retry, env.cancel)
            .await;
        let attempts = result.attempts();

        result.into_result().map_err(|error| StepFailure {
            step: name.to_string(),
            attempts,
            error,
        })
    }
}

struct ChainStage<I, M, O> {
    head: Box<dyn Stage<I, M>>,
    tail: Box<dyn Stage<M, O>>,
}

#[async_trait]
impl<I, M, O> Stage<I, O> for ChainStage<I, M, O>
where
    I: Send + Sync,
    M: Send + Sync,
    O: Send + Sync,
{
    async fn run(&self, input: &I, env: &StageEnv<'_>) -> Result<O, StepFailure> {
        let middle = self.head.run(input, env).await?;
        env.progress.complete();
        self.tail.run(&middle, env).await
    }
}

/// An ordered, type-checked sequence of steps from `I` to `O`.
///
/// Assembled once and executed many times by a
/// [`PipelineRunner`](super::PipelineRunner).
pub struct Pipeline<I, O> {
    stages: Box<dyn Stage<I, O>>,
    names: Vec<String>,
}

impl<I, O> Pipeline<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Starts a pipeline with its first step.
    pub fn new<S>(step: S) -> Self
    where
        S: PipelineStep<Input = I, Output = O> + 'static,
    {
        let names = vec![step.name().to_string()];
        Self {
            stages: Box::new(StepStage { step }),
            names,
        }
    }

    /// Appends a step consuming this pipeline's output.
    pub fn then<S>(self, step: S) -> Pipeline<I, S::Output>
    where
        S: PipelineStep<Input = O> + 'static,
        S::Output: 'static,
    {
        let mut names = self.names;
        names.push(step.name().to_string());
        Pipeline {
            stages: Box::new(ChainStage {
                head: self.stages,
                tail: Box::new(StepStage { step }),
            }),
            names,
        }
    }
}

impl<I, O> Pipeline<I, O> {
    /// Step names in execution order.
    pub fn step_names(&self) -> &[String] {
        &self.names
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: a pipeline has at least one step.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn stages(&self) -> &dyn Stage<I, O> {
        self.stages.as_ref()
    }
}

impl<I, O> std::fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.names)
            .finish()
    }
}
