//! End-to-end retrieval-augmented answering.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::{RagError, Result};
use crate::pipeline::PipelineContext;
use crate::resilience::ResiliencePolicy;
use crate::retrieval::{ComposedRequest, RagComposer, RetrieveRequest, Retriever};
use crate::router::ModelRouter;

/// A chat completion plus the context that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct RagAnswer {
    /// The model's completion.
    pub response: ChatResponse,
    /// The augmented request that was sent, with included and dropped chunks.
    pub composition: ComposedRequest,
}

/// Retrieve → compose → route → complete.
///
/// The retrieval tenant must be the context's tenant; a mismatch is rejected
/// before anything is embedded.
#[derive(Clone, Debug)]
pub struct RagService {
    retriever: Retriever,
    composer: RagComposer,
    router: Arc<ModelRouter>,
    policy: Arc<ResiliencePolicy>,
}

impl RagService {
    /// Creates a service; `policy` protects the chat call.
    pub fn new(
        retriever: Retriever,
        composer: RagComposer,
        router: Arc<ModelRouter>,
        policy: Arc<ResiliencePolicy>,
    ) -> Self {
        Self {
            retriever,
            composer,
            router,
            policy,
        }
    }

    /// Answers `chat_request` using chunks retrieved for `request`.
    ///
    /// # Errors
    ///
    /// - [`RagError::TenantIsolation`] if `request` targets another tenant
    /// - retrieval and composition errors, unchanged
    /// - [`RagError::NoRoute`] if no chat backend serves the model
    /// - remote failures once the resilience policy gives up
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id(), model = %chat_request.model))]
    pub async fn answer(
        &self,
        request: &RetrieveRequest,
        chat_request: &ChatRequest,
        ctx: &PipelineContext,
    ) -> Result<RagAnswer> {
        if &request.tenant_id != ctx.tenant_id() {
            return Err(RagError::tenant_isolation(format!(
                "retrieval for tenant '{}' under context of '{}'",
                request.tenant_id,
                ctx.tenant_id()
            )));
        }

        let retrieved = self
            .retriever
            .retrieve_with_cancel(request, ctx.cancellation())
            .await?;
        let composition = self.composer.compose(chat_request, &retrieved)?;
        ctx.tag("rag.chunks_included", composition.included.len().to_string());

        let model = self.router.chat(&chat_request.model)?;
        let response = self
            .policy
            .execute_with_cancel(ctx.cancellation(), || model.complete(&composition.request))
            .await?;

        info!(
            correlation_id = %ctx.correlation_id(),
            backend = model.name(),
            included = composition.included.len(),
            dropped = composition.dropped,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Answer completed"
        );

        Ok(RagAnswer {
            response,
            composition,
        })
    }
}
