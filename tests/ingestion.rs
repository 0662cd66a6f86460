//! Integration tests for document ingestion.
//!
//! Tests the full stack from a JSON config: IngestionService → Pipeline
//! (parse, chunk, embed, upsert) → InMemoryVectorStore, then reads the
//! results back through the Retriever.

use std::sync::Arc;

use async_trait::async_trait;
use pulserag::embedding::EmbeddingModel;
use pulserag::filter::FilterExpression;
use pulserag::ingestion::{PlainTextParser, SourceDocument};
use pulserag::pipeline::PipelineContext;
use pulserag::resilience::ResiliencePolicy;
use pulserag::store::InMemoryVectorStore;
use pulserag::{
    Config, Embedding, IngestionService, RagError, Result, RetrieveRequest, Retriever, TenantId,
};

const DIM: usize = 8;

/// Hashes each word into one of `DIM` buckets.
struct BucketEmbedding;

#[async_trait]
impl EmbeddingModel for BucketEmbedding {
    fn model_name(&self) -> &str {
        "buckets"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vector = vec![0.01; DIM];
        for word in text.split_whitespace() {
            let bucket = word.bytes().map(usize::from).sum::<usize>() % DIM;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }
}

const CONFIG: &str = r#"{
    "embedding_dimension": { "Custom": 8 },
    "default_collection": "kb",
    "chunking": { "chunk_size": 40, "overlap": 0 },
    "resilience": { "retry": { "max_retries": 2, "delay_ms": 1 } },
    "pipeline": { "retry": { "max_retries": 1, "delay_ms": 1 }, "timeout_ms": 5000 }
}"#;

struct Harness {
    store: Arc<InMemoryVectorStore>,
    ingestion: IngestionService,
    retriever: Retriever,
}

fn harness() -> Harness {
    let config = Config::from_json_str(CONFIG).unwrap();
    assert_eq!(config.dimension(), DIM);

    let policy = Arc::new(config.resilience_policy().unwrap());
    let store = Arc::new(InMemoryVectorStore::new(
        config.dimension(),
        config.default_collection.as_str(),
    ));
    let embedder = Arc::new(BucketEmbedding);

    let mut ingestion = IngestionService::new(
        Arc::new(PlainTextParser::new()),
        embedder.clone(),
        store.clone(),
        Arc::clone(&policy),
        config.chunking,
        None,
    )
    .unwrap()
    .with_step_retry(config.pipeline.retry_policy());
    if let Some(timeout) = config.pipeline.timeout() {
        ingestion = ingestion.with_timeout(timeout);
    }

    let retriever = Retriever::new(embedder, store.clone(), policy);
    Harness {
        store,
        ingestion,
        retriever,
    }
}

fn tenant(name: &str) -> TenantId {
    TenantId::new(name).unwrap()
}

fn ctx(name: &str) -> PipelineContext {
    PipelineContext::new(tenant(name))
}

fn long_text() -> String {
    "alpha beta gamma delta epsilon. ".repeat(6)
}

// ============================================================================
// Ingest Then Retrieve
// ============================================================================

#[tokio::test]
async fn test_ingested_chunks_are_retrievable_with_lineage() {
    let h = harness();
    assert_eq!(h.ingestion.step_names(), ["parse", "chunk", "embed", "upsert"]);

    let document = SourceDocument::text("handbook", long_text())
        .with_source_uri("s3://docs/handbook.txt")
        .with_metadata("lang", "en");
    let report = h.ingestion.ingest(document, &ctx("acme")).await.unwrap();

    assert_eq!(report.doc_id, "handbook");
    assert!(report.records_written >= 3, "{report:?}");
    assert_eq!(report.records_superseded, 0);
    assert_eq!(h.store.len(None).unwrap(), report.records_written);

    let result = h
        .retriever
        .retrieve(&RetrieveRequest::new("gamma delta", tenant("acme"), 10))
        .await
        .unwrap();
    assert_eq!(result.chunks.len(), report.records_written);
    for chunk in &result.chunks {
        assert_eq!(chunk.doc_id.as_deref(), Some("handbook"));
        assert_eq!(chunk.source_uri.as_deref(), Some("s3://docs/handbook.txt"));
        assert!(chunk.chunk.chars().count() <= 40);
    }
}

#[tokio::test]
async fn test_document_metadata_is_filterable() {
    let h = harness();
    let english = SourceDocument::text("en-doc", "hello world").with_metadata("lang", "en");
    let german = SourceDocument::text("de-doc", "hallo welt").with_metadata("lang", "de");
    h.ingestion.ingest(english, &ctx("acme")).await.unwrap();
    h.ingestion.ingest(german, &ctx("acme")).await.unwrap();

    let request = RetrieveRequest::new("hello", tenant("acme"), 10)
        .with_filter(FilterExpression::eq("lang", "de"));
    let result = h.retriever.retrieve(&request).await.unwrap();

    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].doc_id.as_deref(), Some("de-doc"));
}

#[tokio::test]
async fn test_other_tenant_cannot_retrieve_ingested_chunks() {
    let h = harness();
    h.ingestion
        .ingest(SourceDocument::text("secret", long_text()), &ctx("acme"))
        .await
        .unwrap();

    let result = h
        .retriever
        .retrieve(&RetrieveRequest::new("alpha", tenant("globex"), 10))
        .await
        .unwrap();
    assert!(result.chunks.is_empty());
}

// ============================================================================
// Versioning
// ============================================================================

#[tokio::test]
async fn test_new_version_replaces_previous_chunks() {
    let h = harness();
    let v1 = SourceDocument::text("faq", long_text()).with_version_id("v1");
    let first = h.ingestion.ingest(v1, &ctx("acme")).await.unwrap();

    let v2 = SourceDocument::text("faq", "short update").with_version_id("v2");
    let second = h.ingestion.ingest(v2, &ctx("acme")).await.unwrap();

    assert_eq!(second.records_written, 1);
    assert_eq!(
        second.records_superseded,
        (first.records_written - 1) as u64
    );
    assert_eq!(h.store.len(None).unwrap(), 1);

    let result = h
        .retriever
        .retrieve(&RetrieveRequest::new("alpha", tenant("acme"), 10))
        .await
        .unwrap();
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].chunk, "short update");
}

#[tokio::test]
async fn test_new_version_leaves_other_tenants_alone() {
    let h = harness();
    let acme_v1 = SourceDocument::text("faq", long_text()).with_version_id("v1");
    let globex_v1 = SourceDocument::text("faq", long_text()).with_version_id("v1");
    let acme = h.ingestion.ingest(acme_v1, &ctx("acme")).await.unwrap();
    let globex = h.ingestion.ingest(globex_v1, &ctx("globex")).await.unwrap();
    assert_eq!(
        h.store.len(None).unwrap(),
        acme.records_written + globex.records_written
    );

    let acme_v2 = SourceDocument::text("faq", "short update").with_version_id("v2");
    h.ingestion.ingest(acme_v2, &ctx("acme")).await.unwrap();

    assert_eq!(h.store.len(None).unwrap(), 1 + globex.records_written);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_invalid_document_writes_nothing() {
    let h = harness();
    let err = h
        .ingestion
        .ingest(SourceDocument::text("", "content"), &ctx("acme"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(h.store.is_empty(None).unwrap());
}

#[tokio::test]
async fn test_unparseable_document_names_failed_step() {
    let h = harness();
    let document = SourceDocument::text("scan", "%PDF-1.7").with_media_type("application/pdf");
    let ctx = ctx("acme");

    let err = h.ingestion.ingest(document, &ctx).await.unwrap_err();
    match err {
        RagError::Pipeline { step, source, .. } => {
            assert_eq!(step, "parse");
            assert!(source.is_validation());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ctx.tag_value("pipeline.failed_step").as_deref(), Some("parse"));
    assert!(h.store.is_empty(None).unwrap());
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = Config::from_json_str(r#"{ "chunking": { "chunk_size": 10, "overlap": 10 } }"#)
        .unwrap_err();
    assert!(err.is_validation());

    let err = Config::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, RagError::Config { .. }));

    assert!(ResiliencePolicy::new(&Config::default().resilience).is_ok());
}
