//! Document ingestion on top of [`PipelineRunner`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use super::document::validate_document;
use super::{
    ChunkStep, ChunkingConfig, DocumentParser, EmbedStep, ParseStep, SourceDocument, TextChunker,
    UpsertStep,
};
use crate::embedding::EmbeddingModel;
use crate::error::Result;
use crate::filter::FilterExpression;
use crate::pipeline::{Pipeline, PipelineContext, PipelineRunner};
use crate::resilience::{ResiliencePolicy, RetryPolicy};
use crate::store::{DeleteRequest, VectorStore};
use crate::types::CorrelationId;

/// Summary of one successful ingestion.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestionReport {
    /// Ingested document.
    pub doc_id: String,
    /// Chunk records written to the store.
    pub records_written: usize,
    /// Records of earlier versions removed afterwards.
    pub records_superseded: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Correlation ID of the run.
    pub correlation_id: CorrelationId,
}

/// Parses, chunks, embeds and stores documents for the context's tenant.
///
/// Each stage is a [`PipelineStep`](crate::pipeline::PipelineStep) retried
/// independently with the step retry policy. Embedding and store calls are
/// additionally protected by the shared [`ResiliencePolicy`].
///
/// When a document carries a `version_id`, chunks of any other version of
/// the same `doc_id` are deleted once the new version is stored.
pub struct IngestionService {
    pipeline: Pipeline<SourceDocument, usize>,
    store: Arc<dyn VectorStore>,
    policy: Arc<ResiliencePolicy>,
    collection: Option<String>,
    runner: PipelineRunner,
    step_retry: RetryPolicy,
    timeout: Option<Duration>,
}

impl IngestionService {
    /// Assembles the parse → chunk → embed → upsert pipeline.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid chunking config.
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<dyn VectorStore>,
        policy: Arc<ResiliencePolicy>,
        chunking: ChunkingConfig,
        collection: Option<String>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(chunking)?;
        let pipeline = Pipeline::new(ParseStep::new(parser))
            .then(ChunkStep::new(chunker))
            .then(EmbedStep::new(embedder, Arc::clone(&policy)))
            .then(UpsertStep::new(
                Arc::clone(&store),
                Arc::clone(&policy),
                collection.clone(),
            ));

        Ok(Self {
            pipeline,
            store,
            policy,
            collection,
            runner: PipelineRunner::new(),
            step_retry: RetryPolicy::default(),
            timeout: None,
        })
    }

    /// Replaces the per-step retry policy.
    pub fn with_step_retry(mut self, retry: RetryPolicy) -> Self {
        self.step_retry = retry;
        self
    }

    /// Bounds each ingestion run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> &[String] {
        self.pipeline.step_names()
    }

    /// Ingests `document` for `ctx`'s tenant.
    ///
    /// # Errors
    ///
    /// - validation errors for an invalid document, before any step runs
    /// - [`RagError::Pipeline`](crate::RagError::Pipeline) naming the step
    ///   that failed
    #[instrument(skip(self, document, ctx), fields(doc_id = %document.doc_id, tenant_id = %ctx.tenant_id()))]
    pub async fn ingest(
        &self,
        document: SourceDocument,
        ctx: &PipelineContext,
    ) -> Result<IngestionReport> {
        validate_document(&document)?;
        let doc_id = document.doc_id.clone();
        let version_id = document.version_id.clone();

        let result = self
            .runner
            .execute(
                &self.pipeline,
                document,
                ctx,
                Some(&self.step_retry),
                self.timeout,
            )
            .await;
        let elapsed = result.elapsed();
        let records_written = result.into_result()?;

        let records_superseded = match version_id {
            Some(version) => self.remove_other_versions(&doc_id, &version, ctx).await?,
            None => 0,
        };

        info!(
            correlation_id = %ctx.correlation_id(),
            records_written,
            records_superseded,
            elapsed_ms = elapsed.as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestionReport {
            doc_id,
            records_written,
            records_superseded,
            elapsed,
            correlation_id: ctx.correlation_id(),
        })
    }

    async fn remove_other_versions(
        &self,
        doc_id: &str,
        version: &str,
        ctx: &PipelineContext,
    ) -> Result<u64> {
        let stale = FilterExpression::and([
            FilterExpression::eq("doc_id", doc_id),
            FilterExpression::ne("version_id", version),
        ]);
        let mut request = DeleteRequest::by_filter(ctx.tenant_id().clone(), stale);
        if let Some(collection) = &self.collection {
            request = request.in_collection(collection.as_str());
        }
        self.policy
            .execute_with_cancel(ctx.cancellation(), || self.store.delete(&request))
            .await
    }
}

impl std::fmt::Debug for IngestionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("pipeline", &self.pipeline)
            .field("collection", &self.collection)
            .field("step_retry", &self.step_retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
