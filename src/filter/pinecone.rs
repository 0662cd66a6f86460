//! Pinecone metadata filter translation.
//!
//! Pinecone filters are Mongo-style documents: `{"$and": [..]}`,
//! `{"$or": [..]}`, `{"$not": ..}`, equality as `{field: v}` and comparisons
//! as `{field: {"$gt": n}}`. Pinecone has no substring operator on metadata,
//! so `Contains` is sent as an escaped, unanchored `$regex`. Field names
//! starting with `$` would read as operators and are rejected.

use serde_json::{json, Map, Value};

use super::{
    check_predicate, collapse, exact_operand, numeric_operand, text_operand, BackendKind,
    FilterExpression, FilterOperator, FilterPredicate, FilterTranslator, NativeFilter,
};
use crate::error::TranslationError;

/// Translator for Pinecone metadata filters.
#[derive(Clone, Copy, Debug, Default)]
pub struct PineconeTranslator;

impl PineconeTranslator {
    /// Creates a Pinecone translator.
    pub fn new() -> Self {
        Self
    }

    fn document(&self, expr: &FilterExpression) -> Result<Value, TranslationError> {
        match expr {
            FilterExpression::And(children) => match collapse(expr, children)? {
                Some(only) => self.document(only),
                None => Ok(json!({ "$and": self.documents(children)? })),
            },
            FilterExpression::Or(children) => match collapse(expr, children)? {
                Some(only) => self.document(only),
                None => Ok(json!({ "$or": self.documents(children)? })),
            },
            FilterExpression::Not(child) => Ok(json!({ "$not": self.document(child)? })),
            FilterExpression::Predicate(p) => self.field_document(p),
        }
    }

    fn documents(&self, children: &[FilterExpression]) -> Result<Vec<Value>, TranslationError> {
        children.iter().map(|c| self.document(c)).collect()
    }

    fn field_document(&self, p: &FilterPredicate) -> Result<Value, TranslationError> {
        check_predicate(BackendKind::Pinecone, p)?;
        if p.field.starts_with('$') {
            return Err(TranslationError::InvalidField {
                backend: BackendKind::Pinecone,
                field: p.field.clone(),
                reason: "names starting with '$' are reserved for operators".to_string(),
            });
        }

        let condition = match p.operator {
            FilterOperator::Eq => exact_operand(BackendKind::Pinecone, p)?,
            FilterOperator::Ne => json!({ "$ne": exact_operand(BackendKind::Pinecone, p)? }),
            FilterOperator::Gt => json!({ "$gt": numeric_operand(BackendKind::Pinecone, p)? }),
            FilterOperator::Gte => json!({ "$gte": numeric_operand(BackendKind::Pinecone, p)? }),
            FilterOperator::Lt => json!({ "$lt": numeric_operand(BackendKind::Pinecone, p)? }),
            FilterOperator::Lte => json!({ "$lte": numeric_operand(BackendKind::Pinecone, p)? }),
            FilterOperator::Contains => {
                let text = text_operand(BackendKind::Pinecone, p)?;
                json!({ "$regex": regex::escape(text) })
            }
            FilterOperator::Range => {
                return Err(TranslationError::RangeNotDecodable {
                    field: p.field.clone(),
                })
            }
        };

        let mut doc = Map::new();
        doc.insert(p.field.clone(), condition);
        Ok(Value::Object(doc))
    }
}

impl FilterTranslator for PineconeTranslator {
    fn backend(&self) -> BackendKind {
        BackendKind::Pinecone
    }

    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
        Ok(NativeFilter::new(BackendKind::Pinecone, self.document(expr)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(expr: &FilterExpression) -> Value {
        PineconeTranslator::new().translate(expr).unwrap().into_json()
    }

    #[test]
    fn test_pinecone_eq_is_bare_value() {
        assert_eq!(
            translate(&FilterExpression::eq("service", "ec2")),
            json!({ "service": "ec2" })
        );
        assert_eq!(
            translate(&FilterExpression::eq("active", true)),
            json!({ "active": true })
        );
    }

    #[test]
    fn test_pinecone_comparisons() {
        assert_eq!(
            translate(&FilterExpression::gt("cost", 3)),
            json!({ "cost": { "$gt": 3 } })
        );
        assert_eq!(
            translate(&FilterExpression::lte("cost", 2.5)),
            json!({ "cost": { "$lte": 2.5 } })
        );
    }

    #[test]
    fn test_pinecone_ne() {
        assert_eq!(
            translate(&FilterExpression::ne("tier", "free")),
            json!({ "tier": { "$ne": "free" } })
        );
    }

    #[test]
    fn test_pinecone_contains_escapes_regex() {
        assert_eq!(
            translate(&FilterExpression::contains("title", "c++ (v2)")),
            json!({ "title": { "$regex": "c\\+\\+ \\(v2\\)" } })
        );
    }

    #[test]
    fn test_pinecone_rejects_operator_shaped_fields() {
        for field in ["$or", "$regex", "$"] {
            let nested = FilterExpression::and([
                FilterExpression::eq("service", "ec2"),
                FilterExpression::eq(field, "x"),
            ]);
            let err = PineconeTranslator::new().translate(&nested).unwrap_err();
            assert!(
                matches!(
                    &err,
                    TranslationError::InvalidField { backend: BackendKind::Pinecone, field: f, .. }
                        if f == field
                ),
                "{field}: {err:?}"
            );
        }
        assert_eq!(
            translate(&FilterExpression::eq("price$", 1)),
            json!({ "price$": 1 })
        );
    }

    #[test]
    fn test_pinecone_compound() {
        let f = FilterExpression::or([
            FilterExpression::eq("service", "ec2"),
            FilterExpression::not(FilterExpression::gte("cost", 100)),
        ]);
        assert_eq!(
            translate(&f),
            json!({ "$or": [
                { "service": "ec2" },
                { "$not": { "cost": { "$gte": 100 } } }
            ]})
        );
    }
}
