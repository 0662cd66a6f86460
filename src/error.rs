//! Error types for PulseRAG.
//!
//! PulseRAG uses a hierarchical error system:
//! - `RagError` is the top-level error returned by all public APIs
//! - Specific error types (`TranslationError`, `ValidationError`) provide detail
//!
//! # Retry Classification
//!
//! Whether a failure is worth retrying is a property of the error, not of the
//! caller. [`RagError::is_retryable`] is the single source of truth used by
//! both the [`ResiliencePolicy`](crate::resilience::ResiliencePolicy) and the
//! [`StepRetryHandler`](crate::pipeline::StepRetryHandler):
//!
//! | Error | Retried |
//! |-------|---------|
//! | `Remote`, `Timeout`, `Step` | yes |
//! | `Translation`, `Validation`, `Config`, `TenantIsolation` | no (fatal) |
//! | `BulkheadRejected`, `RetryExhausted`, `Cancelled`, `Pipeline` | no |
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use pulserag::{Result, Retriever, RetrieveRequest};
//!
//! async fn example(retriever: &Retriever, request: RetrieveRequest) -> Result<()> {
//!     let result = retriever.retrieve(&request).await?;
//!     println!("{} chunks", result.chunks.len());
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::filter::{BackendKind, FilterOperator};

/// Result type alias for PulseRAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Top-level error enum for all PulseRAG operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum RagError {
    /// A filter could not be expressed in a backend's native language.
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// A remote collaborator (embedding, chat, vector store) failed.
    #[error("Remote call to {service} failed: {message}")]
    Remote {
        /// Which collaborator failed (e.g. "embedding", "vector-store").
        service: String,
        /// Provider error message.
        message: String,
    },

    /// A pipeline step reported a failure of its own.
    #[error("Step '{step}' failed: {message}")]
    Step {
        /// Name of the failing step.
        step: String,
        /// Failure description.
        message: String,
    },

    /// A single attempt or a whole pipeline exceeded its time bound.
    #[error("Timed out after {limit:?}")]
    Timeout {
        /// The bound that was exceeded.
        limit: Duration,
    },

    /// All retry attempts failed.
    #[error("Retries exhausted after {attempts} attempts in {elapsed:?}: {last}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Total time spent, including backoff delays.
        elapsed: Duration,
        /// The failure of the final attempt.
        #[source]
        last: Box<RagError>,
    },

    /// The bulkhead had no free slot and no queue capacity left.
    #[error("Bulkhead rejected execution: {capacity} executions already admitted")]
    BulkheadRejected {
        /// `max_parallelization + max_queuing_actions`.
        capacity: usize,
    },

    /// Data for one tenant was about to be handled on behalf of another.
    #[error("Tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// A pipeline short-circuited at the given step.
    #[error("Pipeline failed at step '{step}' after {elapsed:?}: {source}")]
    Pipeline {
        /// Name of the step whose retries were exhausted.
        step: String,
        /// Elapsed time from pipeline start to failure.
        elapsed: Duration,
        /// The step's error, verbatim.
        source: Box<RagError>,
    },

    /// No chat or embedding backend is registered for a model name.
    #[error("No {kind} backend routed for model '{model}'")]
    NoRoute {
        /// "chat" or "embedding".
        kind: &'static str,
        /// The requested model name.
        model: String,
    },

    /// Local vector store failure (lock poisoning, internal invariant).
    #[error("Vector store error: {0}")]
    Store(String),
}

impl RagError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a remote call failure for the given collaborator.
    pub fn remote(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a step failure.
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error for the given bound.
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout { limit }
    }

    /// Creates a retry exhaustion error wrapping the last failure.
    pub fn retry_exhausted(attempts: u32, elapsed: Duration, last: RagError) -> Self {
        Self::RetryExhausted {
            attempts,
            elapsed,
            last: Box::new(last),
        }
    }

    /// Creates a tenant isolation error.
    pub fn tenant_isolation(msg: impl Into<String>) -> Self {
        Self::TenantIsolation(msg.into())
    }

    /// Creates a local vector store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Returns true if retrying the failed operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Remote { .. } | Self::Timeout { .. } | Self::Step { .. }
        )
    }

    /// Returns true if this is a translation error.
    pub fn is_translation(&self) -> bool {
        matches!(self, Self::Translation(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the bulkhead rejected the execution.
    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(self, Self::BulkheadRejected { .. })
    }

    /// Returns true if retries were exhausted.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Returns true if this is a tenant isolation violation.
    pub fn is_tenant_isolation(&self) -> bool {
        matches!(self, Self::TenantIsolation(_))
    }

    /// Returns true if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Unwraps retry and pipeline wrappers down to the originating failure.
    pub fn root_cause(&self) -> &RagError {
        match self {
            Self::RetryExhausted { last, .. } => last.root_cause(),
            Self::Pipeline { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors raised while translating a filter into a backend's native form.
///
/// Translation is fail-closed: anything a backend cannot express exactly is
/// an error, never a silently weakened filter. These errors are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    /// `Range` has no native decoding; callers must use `Gte` AND `Lte`.
    #[error("Range predicate on field '{field}' must be expressed as Gte AND Lte")]
    RangeNotDecodable {
        /// Field the range predicate targeted.
        field: String,
    },

    /// `And`/`Or` without children has no well-defined native form.
    #[error("Empty {combinator} expression cannot be translated")]
    EmptyComposite {
        /// "And" or "Or".
        combinator: &'static str,
    },

    /// The predicate's value cannot be used with its operator on this backend.
    #[error("{backend} cannot apply {operator} on field '{field}' to value {value}")]
    UnsupportedValue {
        /// Target backend.
        backend: BackendKind,
        /// The predicate operator.
        operator: FilterOperator,
        /// The predicate field.
        field: String,
        /// Rendered offending value.
        value: String,
    },

    /// The field name is not addressable on this backend.
    #[error("{backend} cannot address field '{field}': {reason}")]
    InvalidField {
        /// Target backend.
        backend: BackendKind,
        /// The offending field name.
        field: String,
        /// Why the name is rejected.
        reason: String,
    },
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the collection's dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Content exceeds maximum allowed size.
    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// Too many items in a collection field.
    #[error("Too many items in '{field}': {count} (max: {max})")]
    TooManyItems {
        /// Name of the field.
        field: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a content too large error.
    pub fn content_too_large(size: usize, max: usize) -> Self {
        Self::ContentTooLarge { size, max }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a too many items error.
    pub fn too_many_items(field: impl Into<String>, count: usize, max: usize) -> Self {
        Self::TooManyItems {
            field: field.into(),
            count,
            max,
        }
    }
}
