//! Weaviate `where` filter translation.
//!
//! Composites are `{"operator": "And" | "Or" | "Not", "operands": [..]}`;
//! leaves carry a `path`, an `operator` and exactly one typed value slot
//! (`valueText`, `valueNumber`, `valueBoolean`). Comparisons always use
//! `valueNumber`; `Contains` is a `Like` with a `*`-wrapped pattern.
//! `Like` has no escape syntax, so a needle containing `*` or `?` is
//! rejected rather than widened into a wildcard.

use serde_json::{json, Value};

use super::{
    check_predicate, collapse, exact_operand, text_operand, unsupported_value, BackendKind,
    FilterExpression, FilterOperator, FilterPredicate, FilterTranslator, FilterValue,
    NativeFilter,
};
use crate::error::TranslationError;

/// Characters `Like` always treats as wildcards.
const LIKE_WILDCARDS: [char; 2] = ['*', '?'];

/// Translator for Weaviate `where` filters.
#[derive(Clone, Copy, Debug, Default)]
pub struct WeaviateTranslator;

impl WeaviateTranslator {
    /// Creates a Weaviate translator.
    pub fn new() -> Self {
        Self
    }

    fn clause(&self, expr: &FilterExpression) -> Result<Value, TranslationError> {
        match expr {
            FilterExpression::And(children) => match collapse(expr, children)? {
                Some(only) => self.clause(only),
                None => Ok(json!({ "operator": "And", "operands": self.clauses(children)? })),
            },
            FilterExpression::Or(children) => match collapse(expr, children)? {
                Some(only) => self.clause(only),
                None => Ok(json!({ "operator": "Or", "operands": self.clauses(children)? })),
            },
            FilterExpression::Not(child) => {
                Ok(json!({ "operator": "Not", "operands": [self.clause(child)?] }))
            }
            FilterExpression::Predicate(p) => self.leaf(p),
        }
    }

    fn clauses(&self, children: &[FilterExpression]) -> Result<Vec<Value>, TranslationError> {
        children.iter().map(|c| self.clause(c)).collect()
    }

    fn leaf(&self, p: &FilterPredicate) -> Result<Value, TranslationError> {
        check_predicate(BackendKind::Weaviate, p)?;

        let (operator, slot, value) = match p.operator {
            FilterOperator::Eq | FilterOperator::Ne => {
                let operator = if p.operator == FilterOperator::Eq {
                    "Equal"
                } else {
                    "NotEqual"
                };
                let value = exact_operand(BackendKind::Weaviate, p)?;
                (operator, value_slot(&p.value), value)
            }
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
                let operator = match p.operator {
                    FilterOperator::Gt => "GreaterThan",
                    FilterOperator::Gte => "GreaterThanEqual",
                    FilterOperator::Lt => "LessThan",
                    _ => "LessThanEqual",
                };
                let number = p
                    .value
                    .as_f64()
                    .ok_or_else(|| unsupported_value(BackendKind::Weaviate, p))?;
                (operator, "valueNumber", json!(number))
            }
            FilterOperator::Contains => {
                let text = text_operand(BackendKind::Weaviate, p)?;
                if text.contains(LIKE_WILDCARDS) {
                    return Err(unsupported_value(BackendKind::Weaviate, p));
                }
                ("Like", "valueText", json!(format!("*{}*", text)))
            }
            FilterOperator::Range => {
                return Err(TranslationError::RangeNotDecodable {
                    field: p.field.clone(),
                })
            }
        };

        let mut leaf = json!({ "path": [p.field], "operator": operator });
        leaf[slot] = value;
        Ok(leaf)
    }
}

/// Typed value slot for exact-match leaves.
fn value_slot(value: &FilterValue) -> &'static str {
    match value {
        FilterValue::Text(_) => "valueText",
        FilterValue::Integer(_) | FilterValue::Float(_) => "valueNumber",
        FilterValue::Bool(_) => "valueBoolean",
    }
}

impl FilterTranslator for WeaviateTranslator {
    fn backend(&self) -> BackendKind {
        BackendKind::Weaviate
    }

    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
        Ok(NativeFilter::new(BackendKind::Weaviate, self.clause(expr)?))
    }
}
