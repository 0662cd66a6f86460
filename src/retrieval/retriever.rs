//! Query embedding and tenant-scoped vector search.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::embedding::EmbeddingModel;
use crate::error::{Result, ValidationError};
use crate::filter::FilterExpression;
use crate::resilience::ResiliencePolicy;
use crate::store::{VectorMatch, VectorQueryRequest, VectorStore};
use crate::types::{Embedding, TenantId};

/// What to retrieve and for whom.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrieveRequest {
    /// User query text.
    pub query: String,
    /// Tenant the retrieval acts for.
    pub tenant_id: TenantId,
    /// Maximum chunks to return.
    pub top_k: usize,
    /// Caller filter, combined with the tenant predicate by the store.
    pub filter: Option<FilterExpression>,
    /// Target collection; the store's default when `None`.
    pub collection: Option<String>,
}

impl RetrieveRequest {
    /// Creates a request with no caller filter.
    pub fn new(query: impl Into<String>, tenant_id: TenantId, top_k: usize) -> Self {
        Self {
            query: query.into(),
            tenant_id,
            top_k,
            filter: None,
            collection: None,
        }
    }

    /// Narrows the retrieval with a caller filter.
    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Targets a named collection.
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::required_field("query"));
        }
        if self.top_k == 0 {
            return Err(ValidationError::invalid_field("top_k", "must be greater than 0"));
        }
        Ok(())
    }
}

/// A retrieved chunk with its score and lineage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RagChunk {
    /// Chunk text.
    pub chunk: String,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// URI of the source document.
    pub source_uri: Option<String>,
    /// Source document identity.
    pub doc_id: Option<String>,
    /// Chunk identity within the document.
    pub chunk_id: Option<String>,
}

impl From<VectorMatch> for RagChunk {
    fn from(m: VectorMatch) -> Self {
        Self {
            chunk: m.record.text,
            score: m.score,
            source_uri: m.record.source_uri,
            doc_id: m.record.doc_id,
            chunk_id: m.record.chunk_id,
        }
    }
}

/// Ranked chunks plus the query vector that found them.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrieveResult {
    /// Chunks, highest score first.
    pub chunks: Vec<RagChunk>,
    /// Embedded query, reusable for caching and debugging.
    pub query_vector: Embedding,
    /// Matches the store returned.
    pub total_matches: usize,
}

/// Embeds a query and searches a vector store on behalf of one tenant.
///
/// Both remote calls run through the same [`ResiliencePolicy`].
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<dyn VectorStore>,
    policy: Arc<ResiliencePolicy>,
}

impl Retriever {
    /// Creates a retriever.
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<dyn VectorStore>,
        policy: Arc<ResiliencePolicy>,
    ) -> Self {
        Self {
            embedder,
            store,
            policy,
        }
    }

    /// Retrieves the `top_k` chunks closest to `request.query`.
    ///
    /// # Errors
    ///
    /// - validation errors for a blank query, `top_k == 0` or an embedding of
    ///   the wrong dimension
    /// - translation errors from the store (never retried)
    /// - remote failures once the resilience policy gives up
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<RetrieveResult> {
        self.retrieve_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`retrieve`](Self::retrieve), observing `cancel`.
    #[instrument(skip(self, request, cancel), fields(tenant_id = %request.tenant_id, top_k = request.top_k))]
    pub async fn retrieve_with_cancel(
        &self,
        request: &RetrieveRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrieveResult> {
        request.validate()?;

        let query_vector = self
            .policy
            .execute_with_cancel(cancel, || self.embedder.embed(&request.query))
            .await?;
        self.embedder.validate_embedding(&query_vector)?;

        let mut query = VectorQueryRequest::new(
            request.tenant_id.clone(),
            query_vector.clone(),
            request.top_k,
        );
        if let Some(filter) = &request.filter {
            query = query.with_filter(filter.clone());
        }
        if let Some(collection) = &request.collection {
            query = query.in_collection(collection.as_str());
        }

        let matches = self
            .policy
            .execute_with_cancel(cancel, || self.store.query(&query))
            .await?;
        let total_matches = matches.len();
        debug!(total_matches, "Retrieved matches");

        Ok(RetrieveResult {
            chunks: matches.into_iter().map(RagChunk::from).collect(),
            query_vector,
            total_matches,
        })
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_name())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
