//! Typed multi-step execution.
//!
//! A [`Pipeline`] is a compile-time checked chain of [`PipelineStep`]s.
//! [`PipelineRunner`] executes it sequentially, retrying each step through
//! [`StepRetryHandler`] and short-circuiting at the first step whose retries
//! are exhausted.
//!
//! ```text
//!  input ──► step 1 ──► step 2 ──► ... ──► step n ──► output
//!             │ retry     │ retry            │ retry
//!             └───────────┴──── PipelineContext (tenant, correlation,
//!                               tags, cancellation) ────────────────
//! ```

mod chain;
mod context;
mod handler;
mod runner;
mod step;

pub use chain::{Pipeline, StepFailure};
pub use context::PipelineContext;
pub use handler::{StepResult, StepRetryHandler};
pub use runner::{PipelineResult, PipelineRunner};
pub use step::PipelineStep;
