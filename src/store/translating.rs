//! Vector store backed by a remote transport and a filter translator.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{
    check_upsert, rank, DeleteRequest, VectorMatch, VectorQueryRequest, VectorRecord, VectorStore,
};
use crate::error::Result;
use crate::filter::{BackendKind, FilterTranslator, NativeFilter};
use crate::types::TenantId;

/// A backend-native search call.
#[derive(Clone, Copy, Debug)]
pub struct NativeQuery<'a> {
    /// Target collection.
    pub collection: &'a str,
    /// Query vector.
    pub vector: &'a [f32],
    /// Maximum matches.
    pub top_k: usize,
    /// Translated, tenant-scoped filter.
    pub filter: &'a NativeFilter,
}

/// Wire client for one vector backend.
///
/// Implementations own HTTP/gRPC details and DTO mapping. They only ever
/// receive filters already translated from a tenant-scoped expression.
#[async_trait]
pub trait VectorTransport: Send + Sync {
    /// Writes records to `collection`. Returns the number written.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Runs a similarity search.
    async fn search(&self, query: NativeQuery<'_>) -> Result<Vec<VectorMatch>>;

    /// Deletes records matching `filter`. Returns the number removed, if known.
    async fn delete(&self, collection: &str, filter: &NativeFilter) -> Result<u64>;
}

/// [`VectorStore`] that translates the tenant-scoped filter for its backend
/// immediately before each transport call.
///
/// The store holds no filter state; translation failures surface as
/// [`RagError::Translation`](crate::RagError::Translation) before any
/// network traffic.
#[derive(Debug)]
pub struct TranslatingVectorStore<T, C> {
    translator: T,
    transport: C,
    default_collection: String,
}

impl<T, C> TranslatingVectorStore<T, C>
where
    T: FilterTranslator,
    C: VectorTransport,
{
    /// Creates a store.
    pub fn new(translator: T, transport: C, default_collection: impl Into<String>) -> Self {
        Self {
            translator,
            transport,
            default_collection: default_collection.into(),
        }
    }

    /// The backend family filters are translated for.
    pub fn backend(&self) -> BackendKind {
        self.translator.backend()
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &C {
        &self.transport
    }

    fn collection<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.default_collection)
    }
}

#[async_trait]
impl<T, C> VectorStore for TranslatingVectorStore<T, C>
where
    T: FilterTranslator,
    C: VectorTransport,
{
    #[instrument(skip(self, records), fields(backend = %self.backend(), tenant_id = %tenant_id))]
    async fn upsert(
        &self,
        tenant_id: &TenantId,
        records: &[VectorRecord],
        collection: Option<&str>,
    ) -> Result<usize> {
        check_upsert(tenant_id, records)?;
        self.transport
            .upsert(self.collection(collection), records)
            .await
    }

    #[instrument(skip(self, request), fields(backend = %self.backend(), tenant_id = %request.tenant_id()))]
    async fn query(&self, request: &VectorQueryRequest) -> Result<Vec<VectorMatch>> {
        request.validate()?;
        let filter = self.translator.translate(&request.effective_filter())?;
        debug!(filter = %filter.as_json(), "Filter translated");

        let matches = self
            .transport
            .search(NativeQuery {
                collection: self.collection(request.collection.as_deref()),
                vector: &request.vector,
                top_k: request.top_k,
                filter: &filter,
            })
            .await?;

        Ok(rank(matches, request.top_k))
    }

    #[instrument(skip(self, request), fields(backend = %self.backend(), tenant_id = %request.tenant_id()))]
    async fn delete(&self, request: &DeleteRequest) -> Result<u64> {
        let filter = self.translator.translate(&request.effective_filter()?)?;
        self.transport
            .delete(self.collection(request.collection.as_deref()), &filter)
            .await
    }
}
