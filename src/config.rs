//! Configuration types for PulseRAG.
//!
//! The [`Config`] struct controls:
//! - Resilience of remote calls (retry, timeout, bulkhead)
//! - Embedding dimension (384, 768, or custom)
//! - Retrieval defaults and the context budget
//! - Chunking and pipeline step retries for ingestion
//!
//! # Example
//! ```rust
//! use pulserag::{Config, EmbeddingDimension};
//!
//! // Use defaults (384 dimensions, remote calls without retry, timeout or bulkhead)
//! let config = Config::default();
//!
//! // Customize for a 1536-dimension hosted model
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::Custom(1536),
//!     default_top_k: 8,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result, ValidationError};
use crate::ingestion::ChunkingConfig;
use crate::resilience::{ResilienceOptions, ResiliencePolicy, RetryOptions, RetryPolicy};
use crate::retrieval::ContextBudget;

/// Largest supported embedding dimension.
pub const MAX_EMBEDDING_DIMENSION: usize = 4096;

/// Largest accepted `default_top_k`.
pub const MAX_TOP_K: usize = 1000;

/// Layer configuration.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use pulserag::Config;
///
/// let config = Config {
///     default_collection: "handbook".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resilience applied to every embedding, store and chat call. Facets
    /// left out are disabled.
    pub resilience: ResilienceOptions,

    /// Embedding vector dimension (must match the model's output).
    pub embedding_dimension: EmbeddingDimension,

    /// Collection used when a request names none.
    pub default_collection: String,

    /// Matches retrieved when the caller does not say.
    pub default_top_k: usize,

    /// Upper bound on injected context.
    pub context_budget: ContextBudget,

    /// Ingestion chunking.
    pub chunking: ChunkingConfig,

    /// Pipeline step retries and overall timeout.
    pub pipeline: PipelineOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resilience: ResilienceOptions::default(),
            // 384 matches all-MiniLM-L6-v2
            embedding_dimension: EmbeddingDimension::D384,
            default_collection: "default".to_string(),
            default_top_k: 5,
            context_budget: ContextBudget::default(),
            chunking: ChunkingConfig::default(),
            pipeline: PipelineOptions::default(),
        }
    }
}

impl Config {
    /// Creates a Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON config. Missing fields take defaults.
    ///
    /// # Example
    /// ```rust
    /// use pulserag::Config;
    ///
    /// let config = Config::from_json_str(r#"{
    ///     "default_top_k": 3,
    ///     "resilience": { "retry": { "max_retries": 2, "delay_ms": 100 } },
    ///     "context_budget": { "chars": 4000 }
    /// }"#).unwrap();
    /// assert_eq!(config.default_top_k, 3);
    /// ```
    ///
    /// # Errors
    /// Returns [`RagError::Config`] for malformed JSON and
    /// [`RagError::Validation`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RagError::config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - Custom dimension is 0 or > 4096
    /// - `default_collection` is blank
    /// - `default_top_k` is 0 or > 1000
    /// - the context budget is 0
    /// - chunking, resilience or pipeline options are invalid
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > MAX_EMBEDDING_DIMENSION {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must not exceed 4096",
                ));
            }
        }

        if self.default_collection.trim().is_empty() {
            return Err(ValidationError::required_field("default_collection"));
        }

        if self.default_top_k == 0 || self.default_top_k > MAX_TOP_K {
            return Err(ValidationError::invalid_field(
                "default_top_k",
                format!("must be between 1 and {MAX_TOP_K}"),
            ));
        }

        self.context_budget.validate()?;
        self.chunking.validate()?;
        self.resilience.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }

    /// Builds the resilience policy described by `resilience`.
    ///
    /// # Errors
    /// Returns a validation error for invalid resilience options.
    pub fn resilience_policy(&self) -> Result<ResiliencePolicy> {
        ResiliencePolicy::new(&self.resilience)
    }
}

/// Per-step retries and overall timeout for pipeline runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Step retry; `None` gives every step a single attempt.
    pub retry: Option<RetryOptions>,

    /// Overall run timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry: Some(RetryOptions::default()),
            timeout_ms: None,
        }
    }
}

impl PipelineOptions {
    /// Validates the retry options and rejects a zero timeout.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if let Some(retry) = &self.retry {
            retry.to_policy().validate()?;
        }
        if self.timeout_ms == Some(0) {
            return Err(ValidationError::invalid_field(
                "pipeline.timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Step retry policy; a single attempt when retries are disabled.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map_or_else(RetryPolicy::no_retry, RetryOptions::to_policy)
    }

    /// Overall timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Embedding vector dimensions.
///
/// Standard dimensions are provided for common models. Use `Custom` for
/// other embedding services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (all-MiniLM-L6-v2).
    #[default]
    D384,

    /// 768 dimensions (bge-base-en-v1.5, BERT-base).
    D768,

    /// Custom dimension for other embedding models.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use pulserag::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::Custom(1536).size(), 1536);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::Custom(n) => *n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BackoffStrategy;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.embedding_dimension, EmbeddingDimension::D384);
        assert_eq!(config.default_collection, "default");
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.context_budget, ContextBudget::Tokens(2_000));
        assert_eq!(config.resilience, ResilienceOptions::disabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_without_resilience_is_pass_through() {
        let config = Config::from_json_str(r#"{ "default_top_k": 3 }"#).unwrap();
        assert!(config.resilience_policy().unwrap().composition().is_empty());

        let config =
            Config::from_json_str(r#"{ "resilience": { "timeout": { "timeout_ms": 500 } } }"#)
                .unwrap();
        assert_eq!(
            config.resilience_policy().unwrap().composition(),
            vec![crate::resilience::Facet::Timeout]
        );
    }

    #[test]
    fn test_validate_top_k_zero() {
        let config = Config {
            default_top_k: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidField { field, .. } if field == "default_top_k")
        );
    }

    #[test]
    fn test_validate_blank_collection() {
        let config = Config {
            default_collection: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_custom_dimension_bounds() {
        for (dim, ok) in [(0, false), (1536, true), (5000, false)] {
            let config = Config {
                embedding_dimension: EmbeddingDimension::Custom(dim),
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "dimension {dim}");
        }
    }

    #[test]
    fn test_validate_nested_options() {
        let config = Config {
            chunking: ChunkingConfig {
                chunk_size: 10,
                overlap: 10,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            pipeline: PipelineOptions {
                retry: None,
                timeout_ms: Some(0),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = Config::from_json_str(
            r#"{
                "embedding_dimension": { "Custom": 1536 },
                "resilience": {
                    "retry": { "max_retries": 4, "delay_ms": 1000, "backoff_strategy": "Exponential" },
                    "timeout": { "timeout_ms": 5000 }
                },
                "pipeline": { "timeout_ms": 60000 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.dimension(), 1536);
        assert_eq!(config.default_top_k, 5);
        let retry = config.resilience.retry.as_ref().unwrap();
        assert_eq!(retry.max_retries, 4);
        assert_eq!(retry.backoff_strategy, BackoffStrategy::Exponential);
        assert_eq!(config.pipeline.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.pipeline.retry_policy().max_attempts, 4);

        let policy = config.resilience_policy().unwrap();
        assert_eq!(policy.retry_policy().unwrap().max_attempts, 5);
        assert_eq!(policy.attempt_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_json_malformed() {
        let err = Config::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RagError::Config { .. }));
    }

    #[test]
    fn test_from_json_invalid_values() {
        let err = Config::from_json_str(r#"{ "default_top_k": 0 }"#).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_pipeline_retry_policy() {
        let options = PipelineOptions::default();
        assert_eq!(options.retry_policy().max_attempts, 4);

        let options = PipelineOptions {
            retry: None,
            timeout_ms: None,
        };
        assert_eq!(options.retry_policy().max_attempts, 1);
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config {
            embedding_dimension: EmbeddingDimension::D768,
            context_budget: ContextBudget::Chars(1200),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json_str(&json).unwrap(), config);
    }
}
