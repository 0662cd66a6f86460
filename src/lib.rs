//! # PulseRAG
//!
//! Provider-agnostic retrieval layer for agentic AI systems.
//!
//! PulseRAG lets callers describe a metadata filter once and run it against
//! any supported vector store, while every remote call (embedding, vector
//! query, chat completion) goes through one resilience and pipeline layer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pulserag::prelude::*;
//!
//! let config = Config::default();
//! let policy = Arc::new(config.resilience_policy()?);
//! let store = Arc::new(InMemoryVectorStore::new(config.dimension(), &config.default_collection));
//!
//! // Retrieve for one tenant; the tenant predicate is always applied
//! let retriever = Retriever::new(embedder, store, Arc::clone(&policy));
//! let tenant = TenantId::new("acme")?;
//! let request = RetrieveRequest::new("how do I rotate keys?", tenant.clone(), config.default_top_k)
//!     .with_filter(FilterExpression::eq("lang", "en"));
//! let retrieved = retriever.retrieve(&request).await?;
//!
//! // Inject the chunks into a chat request under a budget
//! let composer = RagComposer::new(config.context_budget);
//! let composed = composer.compose(&chat_request, &retrieved)?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Filter Algebra
//!
//! A [`FilterExpression`](filter::FilterExpression) is a tree of predicates
//! combined with `And`, `Or` and `Not`. A [`FilterTranslator`](filter::FilterTranslator)
//! turns it into a backend's native filter (Qdrant, Pinecone, Weaviate,
//! Milvus). Translation is pure and fails closed: anything a backend cannot
//! express exactly is an error, never a silently widened filter.
//!
//! ### Tenant Isolation
//!
//! Every query and delete carries a [`TenantId`]. Stores only ever see the
//! tenant predicate AND-ed with the caller's filter; there is no way to build
//! a request without one.
//!
//! ### Resilience
//!
//! A [`ResiliencePolicy`](resilience::ResiliencePolicy) composes a bulkhead,
//! a retry loop with fixed or exponential backoff, and a per-attempt timeout.
//! Only transient failures are retried.
//!
//! ### Pipelines
//!
//! A [`Pipeline`](pipeline::Pipeline) chains typed steps; the compiler checks
//! that each step's input is the previous step's output. The
//! [`PipelineRunner`](pipeline::PipelineRunner) retries each step
//! independently and stops at the first step that gives up.
//!
//! ## Thread Safety
//!
//! Stores, retrievers, policies and services are `Send + Sync` and meant to
//! be shared across tasks with `Arc`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod error;
mod service;
mod types;

pub mod chat;
pub mod embedding;
pub mod router;

pub mod filter;

// Execution layer
pub mod pipeline;
pub mod resilience;

// RAG flows
pub mod ingestion;
pub mod retrieval;
pub mod store;

// ============================================================================
// Public API re-exports
// ============================================================================

// Configuration
pub use config::{Config, EmbeddingDimension, PipelineOptions, MAX_EMBEDDING_DIMENSION, MAX_TOP_K};

// Error handling
pub use error::{RagError, Result, TranslationError, ValidationError};

// Core types
pub use types::{CorrelationId, Embedding, TenantId};

// Services
pub use ingestion::{IngestionReport, IngestionService};
pub use retrieval::{RagComposer, RetrieveRequest, RetrieveResult, Retriever};
pub use router::ModelRouter;
pub use service::{RagAnswer, RagService};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common PulseRAG usage.
///
/// ```rust
/// use pulserag::prelude::*;
/// ```
pub mod prelude {
    pub use crate::chat::{ChatMessage, ChatModel, ChatRequest, ChatResponse};
    pub use crate::config::{Config, EmbeddingDimension};
    pub use crate::embedding::EmbeddingModel;
    pub use crate::error::{RagError, Result};
    pub use crate::filter::{BackendKind, FilterExpression, FilterTranslator};
    pub use crate::ingestion::{IngestionService, SourceDocument};
    pub use crate::pipeline::{Pipeline, PipelineContext, PipelineRunner, PipelineStep};
    pub use crate::resilience::{ResilienceOptions, ResiliencePolicy, RetryPolicy};
    pub use crate::retrieval::{ContextBudget, RagComposer, RetrieveRequest, Retriever};
    pub use crate::router::ModelRouter;
    pub use crate::service::RagService;
    pub use crate::store::{InMemoryVectorStore, VectorRecord, VectorStore};
    pub use crate::types::{CorrelationId, TenantId};
}
