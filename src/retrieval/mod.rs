//! Retrieval and context composition.
//!
//! ```text
//! query ─► Retriever ─► embed ─► VectorStore.query ─► RetrieveResult
//!                        (both via ResiliencePolicy)        │
//!                                                           ▼
//!                        ChatRequest ─► RagComposer ─► ComposedRequest
//! ```

mod composer;
mod retriever;

pub use composer::{ComposedRequest, ContextBudget, ContextTemplate, RagComposer};
pub use retriever::{RagChunk, RetrieveRequest, RetrieveResult, Retriever};
