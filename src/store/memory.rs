//! In-process vector store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{
    check_upsert, rank, DeleteRequest, VectorMatch, VectorQueryRequest, VectorRecord, VectorStore,
};
use crate::error::{RagError, Result, ValidationError};
use crate::types::TenantId;

/// Records of one collection, keyed by owner and ID so two tenants may use
/// the same record ID without overwriting each other.
type Collection = HashMap<(TenantId, String), VectorRecord>;

/// A brute-force, cosine-similarity vector store held in memory.
///
/// Filters are evaluated in process with
/// [`FilterExpression::evaluate`](crate::filter::FilterExpression::evaluate),
/// so the same fail-closed rules apply as for remote backends. Every
/// collection shares one fixed dimension.
///
/// # Example
///
/// ```rust
/// # futures::executor::block_on(async {
/// use pulserag::store::{InMemoryVectorStore, VectorQueryRequest, VectorRecord, VectorStore};
/// use pulserag::TenantId;
///
/// let store = InMemoryVectorStore::new(2, "docs");
/// let tenant = TenantId::new("acme").unwrap();
/// store
///     .upsert(&tenant, &[VectorRecord::new("r1", tenant.clone(), vec![1.0, 0.0], "hello")], None)
///     .await
///     .unwrap();
///
/// let matches = store
///     .query(&VectorQueryRequest::new(tenant, vec![1.0, 0.0], 5))
///     .await
///     .unwrap();
/// assert_eq!(matches[0].record.id, "r1");
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    default_collection: String,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Creates an empty store for `dimension`-sized vectors.
    pub fn new(dimension: usize, default_collection: impl Into<String>) -> Self {
        Self {
            dimension,
            default_collection: default_collection.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// The vector dimension every record must have.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total records in `collection` across all tenants.
    pub fn len(&self, collection: Option<&str>) -> Result<usize> {
        let collections = self
            .collections
            .read()
            .map_err(|_| RagError::store("collections lock poisoned"))?;
        Ok(collections
            .get(self.collection_name(collection))
            .map_or(0, HashMap::len))
    }

    /// True if `collection` holds no records.
    pub fn is_empty(&self, collection: Option<&str>) -> Result<bool> {
        Ok(self.len(collection)? == 0)
    }

    fn collection_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.default_collection)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(ValidationError::dimension_mismatch(self.dimension, vector.len()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    #[instrument(skip(self, records), fields(tenant_id = %tenant_id, count = records.len()))]
    async fn upsert(
        &self,
        tenant_id: &TenantId,
        records: &[VectorRecord],
        collection: Option<&str>,
    ) -> Result<usize> {
        check_upsert(tenant_id, records)?;
        for record in records {
            self.check_dimension(&record.vector)?;
        }

        let name = self.collection_name(collection);
        let mut collections = self
            .collections
            .write()
            .map_err(|_| RagError::store("collections lock poisoned"))?;
        let target = collections.entry(name.to_string()).or_default();
        for record in records {
            target.insert(
                (record.tenant_id.clone(), record.id.clone()),
                record.clone(),
            );
        }

        debug!(collection = name, "Records upserted");
        Ok(records.len())
    }

    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id(), top_k = request.top_k))]
    async fn query(&self, request: &VectorQueryRequest) -> Result<Vec<VectorMatch>> {
        request.validate()?;
        self.check_dimension(&request.vector)?;
        let filter = request.effective_filter();
        filter.validate()?;

        let collections = self
            .collections
            .read()
            .map_err(|_| RagError::store("collections lock poisoned"))?;
        let Some(records) = collections.get(self.collection_name(request.collection.as_deref()))
        else {
            return Ok(Vec::new());
        };

        let matches = records
            .values()
            .filter(|record| filter.matches(*record))
            .map(|record| VectorMatch {
                score: cosine_similarity(&request.vector, &record.vector),
                record: record.clone(),
            })
            .collect();

        Ok(rank(matches, request.top_k))
    }

    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id()))]
    async fn delete(&self, request: &DeleteRequest) -> Result<u64> {
        let filter = request.effective_filter()?;
        filter.validate()?;

        let mut collections = self
            .collections
            .write()
            .map_err(|_| RagError::store("collections lock poisoned"))?;
        let Some(records) = collections.get_mut(self.collection_name(request.collection.as_deref()))
        else {
            return Ok(0);
        };

        let before = records.len();
        records.retain(|_, record| !filter.matches(&*record));
        let removed = (before - records.len()) as u64;

        debug!(removed, "Records deleted");
        Ok(removed)
    }
}

/// Cosine similarity; 0.0 when either vector has zero length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
