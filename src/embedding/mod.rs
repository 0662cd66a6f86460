//! Embedding model abstraction.
//!
//! Embeddings are dense vector representations of text used for semantic
//! search. Concrete providers (hosted APIs, local models) live outside this
//! crate and implement [`EmbeddingModel`].

use async_trait::async_trait;

use crate::error::{RagError, Result, ValidationError};
use crate::types::Embedding;

/// Embedding model collaborator.
///
/// Implementations must be thread-safe (`Send + Sync`) so one instance can
/// serve concurrent retrievals and ingestions.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use pulserag::embedding::EmbeddingModel;
/// use pulserag::{Embedding, RagError, Result};
///
/// struct HostedEmbedding {
///     client: MyApiClient,
/// }
///
/// #[async_trait]
/// impl EmbeddingModel for HostedEmbedding {
///     fn model_name(&self) -> &str {
///         "text-embedding-3-small"
///     }
///
///     fn dimension(&self) -> usize {
///         1536
///     }
///
///     async fn embed(&self, text: &str) -> Result<Embedding> {
///         self.client
///             .embed(text)
///             .await
///             .map_err(|e| RagError::remote("embedding", e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier, used for routing and logs.
    fn model_name(&self) -> &str;

    /// Dimension of every embedding this model produces.
    fn dimension(&self) -> usize;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Remote`] if the provider call fails.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embeds several texts, preserving order.
    ///
    /// The default issues one [`embed`](Self::embed) call per text; providers
    /// with a batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Validates that an embedding has this model's dimension.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(RagError::Validation(ValidationError::dimension_mismatch(
                expected, actual,
            )));
        }

        Ok(())
    }
}
