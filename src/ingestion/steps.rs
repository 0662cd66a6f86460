//! Ingestion pipeline steps: parse, chunk, embed, upsert.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{DocumentChunk, DocumentParser, ParsedDocument, SourceDocument, TextChunker};
use crate::embedding::EmbeddingModel;
use crate::error::{RagError, Result, ValidationError};
use crate::pipeline::{PipelineContext, PipelineStep};
use crate::resilience::ResiliencePolicy;
use crate::store::{VectorRecord, VectorStore, MAX_UPSERT_BATCH};

/// Texts sent per embedding call.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Extracts text with a [`DocumentParser`].
pub struct ParseStep {
    parser: Arc<dyn DocumentParser>,
}

impl ParseStep {
    /// Creates the step.
    pub fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl PipelineStep for ParseStep {
    type Input = SourceDocument;
    type Output = ParsedDocument;

    fn name(&self) -> &str {
        "parse"
    }

    async fn execute(
        &self,
        input: &SourceDocument,
        _ctx: &PipelineContext,
    ) -> Result<ParsedDocument> {
        if !self.parser.supports(&input.media_type) {
            return Err(ValidationError::invalid_field(
                "media_type",
                format!("no parser for '{}'", input.media_type),
            )
            .into());
        }
        let text = self.parser.parse(input).await?;
        Ok(ParsedDocument {
            source: input.clone(),
            text,
        })
    }
}

/// Splits parsed text with a [`TextChunker`].
pub struct ChunkStep {
    chunker: TextChunker,
}

impl ChunkStep {
    /// Creates the step.
    pub fn new(chunker: TextChunker) -> Self {
        Self { chunker }
    }
}

#[async_trait]
impl PipelineStep for ChunkStep {
    type Input = ParsedDocument;
    type Output = Vec<DocumentChunk>;

    fn name(&self) -> &str {
        "chunk"
    }

    async fn execute(
        &self,
        input: &ParsedDocument,
        _ctx: &PipelineContext,
    ) -> Result<Vec<DocumentChunk>> {
        let source = &input.source;
        let chunks: Vec<DocumentChunk> = self
            .chunker
            .chunk(&input.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| DocumentChunk {
                doc_id: source.doc_id.clone(),
                index,
                text,
                source_uri: source.source_uri.clone(),
                version_id: source.version_id.clone(),
                metadata: source.metadata.clone(),
            })
            .collect();

        if chunks.is_empty() {
            return Err(ValidationError::invalid_field("content", "produced no chunks").into());
        }
        debug!(doc_id = %source.doc_id, chunks = chunks.len(), "Document chunked");
        Ok(chunks)
    }
}

/// Embeds chunks and turns them into tenant-owned [`VectorRecord`]s.
///
/// Embedding calls run through the resilience policy in batches of
/// [`EMBED_BATCH_SIZE`].
pub struct EmbedStep {
    embedder: Arc<dyn EmbeddingModel>,
    policy: Arc<ResiliencePolicy>,
}

impl EmbedStep {
    /// Creates the step.
    pub fn new(embedder: Arc<dyn EmbeddingModel>, policy: Arc<ResiliencePolicy>) -> Self {
        Self { embedder, policy }
    }
}

#[async_trait]
impl PipelineStep for EmbedStep {
    type Input = Vec<DocumentChunk>;
    type Output = Vec<VectorRecord>;

    fn name(&self) -> &str {
        "embed"
    }

    async fn execute(
        &self,
        input: &Vec<DocumentChunk>,
        ctx: &PipelineContext,
    ) -> Result<Vec<VectorRecord>> {
        let mut records = Vec::with_capacity(input.len());

        for batch in input.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .policy
                .execute_with_cancel(ctx.cancellation(), || self.embedder.embed_batch(&texts))
                .await?;

            if vectors.len() != batch.len() {
                return Err(RagError::remote(
                    "embedding",
                    format!("returned {} vectors for {} texts", vectors.len(), batch.len()),
                ));
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                self.embedder.validate_embedding(&vector)?;
                let mut record = VectorRecord::new(
                    chunk.record_id(),
                    ctx.tenant_id().clone(),
                    vector,
                    chunk.text.clone(),
                )
                .with_doc_id(chunk.doc_id.clone())
                .with_chunk_id(chunk.index.to_string());
                record.metadata = chunk.metadata.clone();
                record.source_uri = chunk.source_uri.clone();
                record.version_id = chunk.version_id.clone();
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// Writes records to a [`VectorStore`] on behalf of the context's tenant.
pub struct UpsertStep {
    store: Arc<dyn VectorStore>,
    policy: Arc<ResiliencePolicy>,
    collection: Option<String>,
}

impl UpsertStep {
    /// Creates the step; `collection` of `None` targets the store's default.
    pub fn new(
        store: Arc<dyn VectorStore>,
        policy: Arc<ResiliencePolicy>,
        collection: Option<String>,
    ) -> Self {
        Self {
            store,
            policy,
            collection,
        }
    }
}

#[async_trait]
impl PipelineStep for UpsertStep {
    type Input = Vec<VectorRecord>;
    type Output = usize;

    fn name(&self) -> &str {
        "upsert"
    }

    async fn execute(&self, input: &Vec<VectorRecord>, ctx: &PipelineContext) -> Result<usize> {
        let tenant_id = ctx.tenant_id();
        if let Some(foreign) = input.iter().find(|r| &r.tenant_id != tenant_id) {
            return Err(RagError::tenant_isolation(format!(
                "record '{}' belongs to tenant '{}', pipeline runs for '{}'",
                foreign.id, foreign.tenant_id, tenant_id
            )));
        }

        let collection = self.collection.as_deref();
        let mut written = 0;
        for batch in input.chunks(MAX_UPSERT_BATCH) {
            written += self
                .policy
                .execute_with_cancel(ctx.cancellation(), || {
                    self.store.upsert(tenant_id, batch, collection)
                })
                .await?;
        }

        ctx.tag("ingestion.records_written", written.to_string());
        Ok(written)
    }
}
