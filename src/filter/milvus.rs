//! Milvus boolean expression translation.
//!
//! Milvus filters are expression strings, e.g.
//! `(service == "ec2" and not (cost < 10))`. Field names must be plain
//! identifiers; string literals are double-quoted with `\` and `"` escaped.
//! `Contains` becomes `like "%text%"` with `%` and `_` escaped.

use super::{
    check_predicate, collapse, exact_operand, numeric_operand, text_operand, BackendKind,
    FilterExpression, FilterOperator, FilterPredicate, FilterTranslator, NativeFilter,
};
use crate::error::TranslationError;

/// Translator for Milvus boolean expressions.
#[derive(Clone, Copy, Debug, Default)]
pub struct MilvusTranslator;

impl MilvusTranslator {
    /// Creates a Milvus translator.
    pub fn new() -> Self {
        Self
    }

    fn expression(&self, expr: &FilterExpression) -> Result<String, TranslationError> {
        match expr {
            FilterExpression::And(children) => match collapse(expr, children)? {
                Some(only) => self.expression(only),
                None => self.joined(children, " and "),
            },
            FilterExpression::Or(children) => match collapse(expr, children)? {
                Some(only) => self.expression(only),
                None => self.joined(children, " or "),
            },
            FilterExpression::Not(child) => Ok(format!("not ({})", self.expression(child)?)),
            FilterExpression::Predicate(p) => self.comparison(p),
        }
    }

    fn joined(&self, children: &[FilterExpression], sep: &str) -> Result<String, TranslationError> {
        let parts = children
            .iter()
            .map(|c| self.expression(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({})", parts.join(sep)))
    }

    fn comparison(&self, p: &FilterPredicate) -> Result<String, TranslationError> {
        check_predicate(BackendKind::Milvus, p)?;
        check_identifier(&p.field)?;
        let field = p.field.as_str();

        let backend = BackendKind::Milvus;

        let expr = match p.operator {
            FilterOperator::Eq => format!("{} == {}", field, literal(exact_operand(backend, p)?)),
            FilterOperator::Ne => format!("{} != {}", field, literal(exact_operand(backend, p)?)),
            FilterOperator::Gt => format!("{} > {}", field, numeric_operand(backend, p)?),
            FilterOperator::Gte => format!("{} >= {}", field, numeric_operand(backend, p)?),
            FilterOperator::Lt => format!("{} < {}", field, numeric_operand(backend, p)?),
            FilterOperator::Lte => format!("{} <= {}", field, numeric_operand(backend, p)?),
            FilterOperator::Contains => {
                let text = text_operand(backend, p)?;
                format!("{} like \"%{}%\"", field, escape_like(text))
            }
            FilterOperator::Range => {
                return Err(TranslationError::RangeNotDecodable {
                    field: p.field.clone(),
                })
            }
        };
        Ok(expr)
    }
}

fn check_identifier(field: &str) -> Result<(), TranslationError> {
    let mut chars = field.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(TranslationError::InvalidField {
            backend: BackendKind::Milvus,
            field: field.to_string(),
            reason: "expected an identifier of [A-Za-z_][A-Za-z0-9_]*".to_string(),
        })
    }
}

/// Renders an exact-match operand as a Milvus literal.
fn literal(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("\"{}\"", escape_string(&s)),
        other => other.to_string(),
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_like(s: &str) -> String {
    escape_string(s).replace('%', "\\%").replace('_', "\\_")
}

impl FilterTranslator for MilvusTranslator {
    fn backend(&self) -> BackendKind {
        BackendKind::Milvus
    }

    fn translate(&self, expr: &FilterExpression) -> Result<NativeFilter, TranslationError> {
        let text = self.expression(expr)?;
        Ok(NativeFilter::new(
            BackendKind::Milvus,
            serde_json::Value::String(text),
        ))
    }
}
