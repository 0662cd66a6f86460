//! Filter algebra and per-backend translation.
//!
//! Callers describe a constraint once as a [`FilterExpression`]; a
//! [`FilterTranslator`] turns it into the native filter document of one
//! backend family immediately before the network call.
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────────────┐
//!                 │  FilterExpression  │   And / Or / Not / Predicate
//!                 └─────────┬──────────┘
//!                           │ translate()
//!      ┌──────────────┬─────┴────────┬────────────────┐
//!      ▼              ▼              ▼                ▼
//! ┌──────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐
//! │  Qdrant  │  │ Pinecone  │  │  Weaviate  │  │  Milvus   │
//! │ must/... │  │ $and/...  │  │ operands   │  │ expr text │
//! └──────────┘  └───────────┘  └────────────┘  └───────────┘
//! ```
//!
//! # Translation Laws
//!
//! Every translator obeys the same laws, checked by the integration tests:
//!
//! - **Single-child collapsing**: `And([f])` and `Or([f])` translate exactly
//!   like `f`.
//! - **Fail closed**: `Range`, empty `And`/`Or`, and values an operator
//!   cannot use are [`TranslationError`]s, never a weakened filter.
//! - **Purity**: translators are stateless; the same input always yields the
//!   same document.

mod expression;
mod milvus;
mod pinecone;
mod qdrant;
mod weaviate;

pub use expression::{FieldSource, FilterExpression, FilterOperator, FilterPredicate, FilterValue};
pub use milvus::MilvusTranslator;
pub use pinecone::PineconeTranslator;
pub use qdrant::QdrantTranslator;
pub use weaviate::WeaviateTranslator;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TranslationError;

/// Backend families with a filter translator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `must` / `should` / `must_not` JSON filters.
    Qdrant,
    /// Mongo-style `$and` / `$or` metadata filters.
    Pinecone,
    /// GraphQL `where` filters with `operator` / `operands`.
    Weaviate,
    /// Boolean expression strings.
    Milvus,
}

impl BackendKind {
    /// All supported backends, in declaration order.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Qdrant,
        BackendKind::Pinecone,
        BackendKind::Weaviate,
        BackendKind::Milvus,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Qdrant => "qdrant",
            Self::Pinecone => "pinecone",
            Self::Weaviate => "weaviate",
            Self::Milvus => "milvus",
        };
        f.write_str(name)
    }
}

/// A translated, backend-native filter document.
///
/// JSON-filter backends carry an object; expression backends (Milvus) carry
/// a JSON string.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeFilter {
    backend: BackendKind,
    document: serde_json::Value,
}

impl NativeFilter {
    /// Wraps a native document produced for `backend`.
    pub fn new(backend: BackendKind, document: serde_json::Value) -> Self {
        Self { backend, document }
    }

    /// The backend this document was produced for.
    #[inline]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// The native document.
    #[inline]
    pub fn as_json(&self) -> &serde_json::Value {
        &self.document
    }

    /// Consumes the filter, returning the native document.
    pub fn into_json(self) -> serde_json::Value {
        self.document
    }

    /// The expression text, for expression-language backends.
    pub fn as_expression(&self) -> Option<&str> {
        self.document.as_str()
    }
}

/// Translates a [`FilterExpression`] into one backend's native filter.
///
/// Implementations are stateless and injectable; new backends are added by
/// implementing this trait, never by changing the algebra.
///
/// # Implementing a Custom Translator
///
/// ```rust,ignore
/// use pulserag::filter::{BackendKind, FilterExpression, FilterTranslator, NativeFilter};
/// use pulserag::TranslationError;
///
/// struct ChromaTranslator;
///
/// impl FilterTranslator for ChromaTranslator {
///     fn backend(&self) -> BackendKind { /* ... */ }
///
///     fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
///         match expr {
///             FilterExpression::And(children) => { /* ... */ }
///             FilterExpression::Or(children) => { /* ... */ }
///             FilterExpression::Not(child) => { /* ... */ }
///             FilterExpression::Predicate(p) => { /* ... */ }
///         }
///     }
/// }
/// ```
pub trait FilterTranslator: Send + Sync {
    /// The backend family this translator targets.
    fn backend(&self) -> BackendKind;

    /// Translates `expr` into the backend's native filter.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslationError`] for `Range`, empty composites, invalid
    /// field names, or values an operator cannot use on this backend.
    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError>;
}

impl<T: FilterTranslator + ?Sized> FilterTranslator for Box<T> {
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
        (**self).translate(expr)
    }
}

impl<T: FilterTranslator + ?Sized> FilterTranslator for std::sync::Arc<T> {
    fn backend(&self) -> BackendKind {
        (**self).backend()
    }

    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
        (**self).translate(expr)
    }
}

/// Returns the translator for a backend family.
pub fn translator_for(backend: BackendKind) -> Box<dyn FilterTranslator> {
    match backend {
        BackendKind::Qdrant => Box::new(QdrantTranslator::new()),
        BackendKind::Pinecone => Box::new(PineconeTranslator::new()),
        BackendKind::Weaviate => Box::new(WeaviateTranslator::new()),
        BackendKind::Milvus => Box::new(MilvusTranslator::new()),
    }
}

/// Translates `expr` for `backend`.
///
/// # Example
///
/// ```rust
/// use pulserag::filter::{translate, BackendKind, FilterExpression};
///
/// let native = translate(&FilterExpression::eq("service", "ec2"), BackendKind::Pinecone).unwrap();
/// assert_eq!(native.as_json(), &serde_json::json!({ "service": "ec2" }));
/// ```
pub fn translate(
    expr: &FilterExpression,
    backend: BackendKind,
) -> Result<NativeFilter, TranslationError> {
    translator_for(backend).translate(expr)
}

// ============================================================================
// Shared predicate checks (used by every translator during descent)
// ============================================================================

/// Children of a composite: `Err` when empty, `Ok(Some(only))` when the
/// composite must collapse, `Ok(None)` when it must be wrapped.
pub(crate) fn collapse<'a>(
    expr: &FilterExpression,
    children: &'a [FilterExpression],
) -> Result<Option<&'a FilterExpression>, TranslationError> {
    match children {
        [] => Err(TranslationError::EmptyComposite {
            combinator: expr.combinator_name(),
        }),
        [only] => Ok(Some(only)),
        _ => Ok(None),
    }
}

/// Rejects `Range` and blank field names.
pub(crate) fn check_predicate(
    backend: BackendKind,
    p: &FilterPredicate,
) -> Result<(), TranslationError> {
    if p.operator == FilterOperator::Range {
        return Err(TranslationError::RangeNotDecodable {
            field: p.field.clone(),
        });
    }
    if p.field.trim().is_empty() {
        return Err(TranslationError::InvalidField {
            backend,
            field: p.field.clone(),
            reason: "field name is empty".to_string(),
        });
    }
    Ok(())
}

/// Numeric JSON operand of a comparison predicate.
pub(crate) fn numeric_operand(
    backend: BackendKind,
    p: &FilterPredicate,
) -> Result<serde_json::Value, TranslationError> {
    p.value
        .to_numeric_json()
        .ok_or_else(|| unsupported_value(backend, p))
}

/// Text operand of a `Contains` predicate.
pub(crate) fn text_operand<'a>(
    backend: BackendKind,
    p: &'a FilterPredicate,
) -> Result<&'a str, TranslationError> {
    p.value.as_text().ok_or_else(|| unsupported_value(backend, p))
}

/// Equality operand; non-finite floats have no JSON form.
pub(crate) fn exact_operand(
    backend: BackendKind,
    p: &FilterPredicate,
) -> Result<serde_json::Value, TranslationError> {
    if let FilterValue::Float(f) = p.value {
        if !f.is_finite() {
            return Err(unsupported_value(backend, p));
        }
    }
    Ok(p.value.to_json())
}

pub(crate) fn unsupported_value(backend: BackendKind, p: &FilterPredicate) -> TranslationError {
    TranslationError::UnsupportedValue {
        backend,
        operator: p.operator,
        field: p.field.clone(),
        value: p.value.to_string(),
    }
}
