//! Vector store contract with structural tenant isolation.
//!
//! Every request type that reaches a [`VectorStore`] is built around a
//! [`TenantScope`]: there is no constructor without a [`TenantId`], and the
//! scope's private fields cannot be cleared afterwards. The filter a store
//! translates is always `tenant_id == <tenant> AND <caller filter>`, so an
//! omitted or malformed caller filter can never widen a query to another
//! tenant's records.
//!
//! # Implementations
//!
//! - [`TranslatingVectorStore`] - translates the scoped filter for one backend
//!   family immediately before handing it to a [`VectorTransport`]
//! - [`InMemoryVectorStore`] - evaluates the filter in process

mod memory;
mod translating;

pub use memory::InMemoryVectorStore;
pub use translating::{NativeQuery, TranslatingVectorStore, VectorTransport};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result, ValidationError};
use crate::filter::{FieldSource, FilterExpression, FilterValue};
use crate::types::{Embedding, TenantId};

/// Field every record's tenant is stored under.
pub const TENANT_FIELD: &str = "tenant_id";

/// Maximum records accepted by a single upsert call.
pub const MAX_UPSERT_BATCH: usize = 1000;

/// A stored chunk: dense vector, text and lineage.
///
/// Records are immutable once written; re-upserting the same `id` for the
/// same tenant supersedes the previous version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record identity, unique per tenant and collection.
    pub id: String,

    /// Dense embedding; its length must match the collection's dimension.
    pub vector: Embedding,

    /// Chunk text.
    pub text: String,

    /// Free-form metadata, addressable by filters.
    #[serde(default)]
    pub metadata: BTreeMap<String, FilterValue>,

    /// URI of the source document.
    pub source_uri: Option<String>,

    /// Source document identity.
    pub doc_id: Option<String>,

    /// Chunk identity within the document.
    pub chunk_id: Option<String>,

    /// Owning tenant.
    pub tenant_id: TenantId,

    /// Version of the source document this chunk was cut from.
    pub version_id: Option<String>,
}

impl VectorRecord {
    /// Creates a record with no metadata or lineage.
    pub fn new(
        id: impl Into<String>,
        tenant_id: TenantId,
        vector: Embedding,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            text: text.into(),
            metadata: BTreeMap::new(),
            source_uri: None,
            doc_id: None,
            chunk_id: None,
            tenant_id,
            version_id: None,
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// Sets the source document identity.
    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Sets the chunk identity.
    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    /// Sets the document version.
    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Checks identity and vector shape.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required_field("id"));
        }
        if self.vector.is_empty() {
            return Err(ValidationError::required_field("vector"));
        }
        if self.vector.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::invalid_field(
                "vector",
                "contains NaN or infinite values",
            ));
        }
        Ok(())
    }
}

/// Lineage fields resolve before metadata, so a metadata key can never
/// shadow `tenant_id` or `id`.
impl FieldSource for VectorRecord {
    fn field_value(&self, field: &str) -> Option<FilterValue> {
        let lineage = match field {
            "id" => Some(self.id.as_str()),
            TENANT_FIELD => Some(self.tenant_id.as_str()),
            "source_uri" => self.source_uri.as_deref(),
            "doc_id" => self.doc_id.as_deref(),
            "chunk_id" => self.chunk_id.as_deref(),
            "version_id" => self.version_id.as_deref(),
            _ => return self.metadata.get(field).cloned(),
        };
        lineage.map(FilterValue::from)
    }
}

/// The tenant a request acts for, plus the caller's own filter.
#[derive(Clone, Debug, PartialEq)]
pub struct TenantScope {
    tenant_id: TenantId,
    caller_filter: Option<FilterExpression>,
}

impl TenantScope {
    /// Scopes to `tenant_id` with no caller filter.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            caller_filter: None,
        }
    }

    /// Adds the caller's filter.
    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.caller_filter = Some(filter);
        self
    }

    /// The scoped tenant.
    #[inline]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// The caller's filter, without the tenant predicate.
    pub fn caller_filter(&self) -> Option<&FilterExpression> {
        self.caller_filter.as_ref()
    }

    /// `tenant_id == <tenant>`.
    pub fn tenant_predicate(&self) -> FilterExpression {
        FilterExpression::eq(TENANT_FIELD, self.tenant_id.as_str())
    }

    /// The tenant predicate AND the caller filter, if any.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pulserag::filter::FilterExpression;
    /// use pulserag::store::TenantScope;
    /// use pulserag::TenantId;
    ///
    /// let scope = TenantScope::new(TenantId::new("a").unwrap())
    ///     .with_filter(FilterExpression::eq("service", "ec2"));
    /// assert_eq!(
    ///     scope.effective_filter(),
    ///     FilterExpression::and([
    ///         FilterExpression::eq("tenant_id", "a"),
    ///         FilterExpression::eq("service", "ec2"),
    ///     ])
    /// );
    /// ```
    pub fn effective_filter(&self) -> FilterExpression {
        match &self.caller_filter {
            None => self.tenant_predicate(),
            Some(filter) => FilterExpression::and([self.tenant_predicate(), filter.clone()]),
        }
    }
}

/// A tenant-scoped similarity query.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorQueryRequest {
    scope: TenantScope,

    /// Query vector.
    pub vector: Embedding,

    /// Maximum matches to return (> 0).
    pub top_k: usize,

    /// Target collection; the store's default when `None`.
    pub collection: Option<String>,
}

impl VectorQueryRequest {
    /// Creates a query for `tenant_id`.
    pub fn new(tenant_id: TenantId, vector: Embedding, top_k: usize) -> Self {
        Self {
            scope: TenantScope::new(tenant_id),
            vector,
            top_k,
            collection: None,
        }
    }

    /// Narrows the query with a caller filter.
    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.scope = self.scope.with_filter(filter);
        self
    }

    /// Targets a named collection.
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// The tenant scope.
    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// The scoped tenant.
    pub fn tenant_id(&self) -> &TenantId {
        self.scope.tenant_id()
    }

    /// The filter a store must apply.
    pub fn effective_filter(&self) -> FilterExpression {
        self.scope.effective_filter()
    }

    /// Checks `top_k` and the vector.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.top_k == 0 {
            return Err(ValidationError::invalid_field("top_k", "must be greater than 0"));
        }
        if self.vector.is_empty() {
            return Err(ValidationError::required_field("vector"));
        }
        Ok(())
    }
}

/// A ranked query result. Higher scores are closer.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorMatch {
    /// The matched record.
    pub record: VectorRecord,
    /// Similarity score.
    pub score: f32,
}

/// Which records a delete removes, always within the request's tenant.
#[derive(Clone, Debug, PartialEq)]
pub enum DeleteSelector {
    /// Records with these IDs.
    Ids(Vec<String>),
    /// Records matching this filter.
    Filter(FilterExpression),
}

/// A tenant-scoped delete.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteRequest {
    tenant_id: TenantId,
    selector: DeleteSelector,

    /// Target collection; the store's default when `None`.
    pub collection: Option<String>,
}

impl DeleteRequest {
    /// Deletes the tenant's records with the given IDs.
    pub fn by_ids(tenant_id: TenantId, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tenant_id,
            selector: DeleteSelector::Ids(ids.into_iter().map(Into::into).collect()),
            collection: None,
        }
    }

    /// Deletes the tenant's records matching `filter`.
    pub fn by_filter(tenant_id: TenantId, filter: FilterExpression) -> Self {
        Self {
            tenant_id,
            selector: DeleteSelector::Filter(filter),
            collection: None,
        }
    }

    /// Targets a named collection.
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// The scoped tenant.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// The selector.
    pub fn selector(&self) -> &DeleteSelector {
        &self.selector
    }

    /// The tenant predicate AND the selector's filter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty ID list.
    pub fn effective_filter(&self) -> std::result::Result<FilterExpression, ValidationError> {
        let selection = match &self.selector {
            DeleteSelector::Ids(ids) if ids.is_empty() => {
                return Err(ValidationError::required_field("ids"));
            }
            DeleteSelector::Ids(ids) => {
                FilterExpression::or(ids.iter().map(|id| FilterExpression::eq("id", id.as_str())))
            }
            DeleteSelector::Filter(filter) => filter.clone(),
        };
        Ok(TenantScope::new(self.tenant_id.clone())
            .with_filter(selection)
            .effective_filter())
    }
}

/// Upsert, query and delete against one vector backend.
///
/// Implementations must apply [`VectorQueryRequest::effective_filter`] and
/// [`DeleteRequest::effective_filter`] rather than the caller's filter, and
/// reject upserted records owned by a different tenant.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Writes `records` on behalf of `tenant_id`. Returns the number written.
    ///
    /// # Errors
    ///
    /// [`RagError::TenantIsolation`] if any record belongs to another tenant.
    async fn upsert(
        &self,
        tenant_id: &TenantId,
        records: &[VectorRecord],
        collection: Option<&str>,
    ) -> Result<usize>;

    /// Returns up to `top_k` matches, highest score first.
    async fn query(&self, request: &VectorQueryRequest) -> Result<Vec<VectorMatch>>;

    /// Deletes the selected records. Returns the number removed, if known.
    async fn delete(&self, request: &DeleteRequest) -> Result<u64>;
}

/// Shared upsert checks: batch size, record shape and ownership.
pub(crate) fn check_upsert(tenant_id: &TenantId, records: &[VectorRecord]) -> Result<()> {
    if records.len() > MAX_UPSERT_BATCH {
        return Err(
            ValidationError::too_many_items("records", records.len(), MAX_UPSERT_BATCH).into(),
        );
    }
    for record in records {
        record.validate()?;
        if &record.tenant_id != tenant_id {
            return Err(RagError::tenant_isolation(format!(
                "record '{}' belongs to tenant '{}', upsert is scoped to '{}'",
                record.id, record.tenant_id, tenant_id
            )));
        }
    }
    Ok(())
}

/// Sorts by descending score and keeps the first `top_k`.
pub(crate) fn rank(mut matches: Vec<VectorMatch>, top_k: usize) -> Vec<VectorMatch> {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    #[test]
    fn test_scope_without_filter_is_bare_tenant_predicate() {
        let scope = TenantScope::new(tenant("a"));
        assert_eq!(scope.effective_filter(), FilterExpression::eq("tenant_id", "a"));
    }

    #[test]
    fn test_metadata_cannot_shadow_tenant() {
        let record = VectorRecord::new("r1", tenant("a"), vec![1.0], "text")
            .with_metadata("tenant_id", "b");
        assert_eq!(
            record.field_value("tenant_id"),
            Some(FilterValue::Text("a".into()))
        );
        let filter = FilterExpression::eq("tenant_id", "b");
        assert!(!filter.evaluate(&record).unwrap());
    }

    #[test]
    fn test_record_lineage_fields_resolve() {
        let record = VectorRecord::new("r1", tenant("a"), vec![1.0], "text")
            .with_doc_id("doc-1")
            .with_metadata("cost", 12);
        assert_eq!(record.field_value("doc_id"), Some(FilterValue::from("doc-1")));
        assert_eq!(record.field_value("cost"), Some(FilterValue::Integer(12)));
        assert_eq!(record.field_value("chunk_id"), None);
    }

    #[test]
    fn test_delete_by_ids_is_tenant_scoped() {
        let request = DeleteRequest::by_ids(tenant("a"), ["x", "y"]);
        assert_eq!(
            request.effective_filter().unwrap(),
            FilterExpression::and([
                FilterExpression::eq("tenant_id", "a"),
                FilterExpression::or([
                    FilterExpression::eq("id", "x"),
                    FilterExpression::eq("id", "y"),
                ]),
            ])
        );
    }

    #[test]
    fn test_delete_with_no_ids_rejected() {
        let request = DeleteRequest::by_ids(tenant("a"), Vec::<String>::new());
        assert!(request.effective_filter().is_err());
    }

    #[test]
    fn test_query_validation() {
        assert!(VectorQueryRequest::new(tenant("a"), vec![1.0], 0).validate().is_err());
        assert!(VectorQueryRequest::new(tenant("a"), vec![], 3).validate().is_err());
        assert!(VectorQueryRequest::new(tenant("a"), vec![1.0], 3).validate().is_ok());
    }

    #[test]
    fn test_check_upsert_rejects_foreign_records() {
        let records = vec![VectorRecord::new("r1", tenant("b"), vec![1.0], "x")];
        let err = check_upsert(&tenant("a"), &records).unwrap_err();
        assert!(err.is_tenant_isolation());
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let make = |id: &str, score: f32| VectorMatch {
            record: VectorRecord::new(id, tenant("a"), vec![1.0], ""),
            score,
        };
        let ranked = rank(vec![make("low", 0.1), make("high", 0.9), make("mid", 0.5)], 2);
        let ids: Vec<_> = ranked.iter().map(|m| m.record.id.as_str()).collect();
        assert_eq!(ids, ["high", "mid"]);
    }
}
