//! Document ingestion.
//!
//! ```text
//! SourceDocument ─► parse ─► chunk ─► embed ─► upsert ─► IngestionReport
//!                   (each step retried by PipelineRunner;
//!                    embed/upsert calls also via ResiliencePolicy)
//! ```
//!
//! Every record written is owned by the tenant of the [`PipelineContext`]
//! the ingestion runs under.
//!
//! [`PipelineContext`]: crate::pipeline::PipelineContext

mod chunker;
mod document;
mod parser;
mod service;
mod steps;

pub use chunker::{ChunkingConfig, TextChunker};
pub use document::{
    DocumentChunk, ParsedDocument, SourceDocument, MAX_DOCUMENT_SIZE, MAX_DOC_ID_LENGTH,
    MAX_METADATA_ENTRIES,
};
pub use parser::{DocumentParser, PlainTextParser};
pub use service::{IngestionReport, IngestionService};
pub use steps::{ChunkStep, EmbedStep, ParseStep, UpsertStep, EMBED_BATCH_SIZE};
