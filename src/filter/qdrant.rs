//! Qdrant filter translation.
//!
//! Qdrant uses a nested JSON structure:
//! - `must`: array of conditions that ALL must match (And)
//! - `should`: array of conditions where ANY must match (Or)
//! - `must_not`: array of conditions that must NOT match (Not)
//!
//! Field conditions are `{"key": .., "match": ..}` or `{"key": .., "range": ..}`.

use serde_json::json;

use super::{
    check_predicate, collapse, exact_operand, numeric_operand, text_operand, BackendKind,
    FilterExpression, FilterOperator, FilterPredicate, FilterTranslator, NativeFilter,
};
use crate::error::TranslationError;
use crate::filter::FilterValue;

/// Translator for Qdrant payload filters.
#[derive(Clone, Copy, Debug, Default)]
pub struct QdrantTranslator;

impl QdrantTranslator {
    /// Creates a Qdrant translator.
    pub fn new() -> Self {
        Self
    }

    fn condition(&self, expr: &FilterExpression) -> Result<serde_json::Value, TranslationError> {
        match expr {
            FilterExpression::And(children) => match collapse(expr, children)? {
                Some(only) => self.condition(only),
                None => Ok(json!({ "must": self.conditions(children)? })),
            },
            FilterExpression::Or(children) => match collapse(expr, children)? {
                Some(only) => self.condition(only),
                None => Ok(json!({ "should": self.conditions(children)? })),
            },
            FilterExpression::Not(child) => Ok(json!({ "must_not": [self.condition(child)?] })),
            FilterExpression::Predicate(p) => self.field_condition(p),
        }
    }

    fn conditions(
        &self,
        children: &[FilterExpression],
    ) -> Result<Vec<serde_json::Value>, TranslationError> {
        children.iter().map(|c| self.condition(c)).collect()
    }

    /// Maps a predicate to Qdrant's field condition syntax:
    /// - `Eq`: `{"key": f, "match": {"value": v}}`
    /// - `Ne`: the `Eq` condition wrapped in `must_not`
    /// - `Gt`..`Lte`: `{"key": f, "range": {"gt": n}}`
    /// - `Contains`: full-text `{"key": f, "match": {"text": s}}`
    fn field_condition(&self, p: &FilterPredicate) -> Result<serde_json::Value, TranslationError> {
        check_predicate(BackendKind::Qdrant, p)?;
        let key = p.field.as_str();

        match p.operator {
            FilterOperator::Eq => self.exact_match(p),
            FilterOperator::Ne => Ok(json!({ "must_not": [self.exact_match(p)?] })),
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
                let bound = match p.operator {
                    FilterOperator::Gt => "gt",
                    FilterOperator::Gte => "gte",
                    FilterOperator::Lt => "lt",
                    _ => "lte",
                };
                let value = numeric_operand(BackendKind::Qdrant, p)?;
                Ok(json!({ "key": key, "range": { bound: value } }))
            }
            FilterOperator::Contains => {
                let text = text_operand(BackendKind::Qdrant, p)?;
                Ok(json!({ "key": key, "match": { "text": text } }))
            }
            FilterOperator::Range => Err(TranslationError::RangeNotDecodable {
                field: p.field.clone(),
            }),
        }
    }

    /// Qdrant's `match` only accepts keywords, integers and booleans, so
    /// float equality becomes a closed range on the same value.
    fn exact_match(&self, p: &FilterPredicate) -> Result<serde_json::Value, TranslationError> {
        let value = exact_operand(BackendKind::Qdrant, p)?;
        match p.value {
            FilterValue::Float(_) => Ok(json!({
                "key": p.field,
                "range": { "gte": value, "lte": value }
            })),
            _ => Ok(json!({ "key": p.field, "match": { "value": value } })),
        }
    }
}

impl FilterTranslator for QdrantTranslator {
    fn backend(&self) -> BackendKind {
        BackendKind::Qdrant
    }

    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
        Ok(NativeFilter::new(BackendKind::Qdrant, self.condition(expr)?))
    }
}
