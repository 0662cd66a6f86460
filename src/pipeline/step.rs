//! The pipeline step contract.

use async_trait::async_trait;

use super::PipelineContext;
use crate::error::Result;

/// One typed stage of a pipeline.
///
/// Steps borrow their input so a failed attempt can be retried with the same
/// value. Output types are checked against the next step's input type when
/// the [`Pipeline`](super::Pipeline) is assembled.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use pulserag::pipeline::{PipelineContext, PipelineStep};
/// use pulserag::Result;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl PipelineStep for Uppercase {
///     type Input = String;
///     type Output = String;
///
///     fn name(&self) -> &str {
///         "uppercase"
///     }
///
///     async fn execute(&self, input: &String, _ctx: &PipelineContext) -> Result<String> {
///         Ok(input.to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// What the step consumes.
    type Input: Send + Sync;

    /// What the step produces.
    type Output: Send + Sync;

    /// Name used in logs, tags and failure reports.
    fn name(&self) -> &str;

    /// Runs one attempt of the step.
    async fn execute(&self, input: &Self::Input, ctx: &PipelineContext) -> Result<Self::Output>;
}
