//! The backend-independent filter AST.
//!
//! [`FilterExpression`] is a closed sum type; every translator matches on it
//! exhaustively, so adding a variant is a compile error in every backend
//! until each one handles it.
//!
//! Expressions can also be evaluated in-process against any
//! [`FieldSource`], which is how the in-memory store applies them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TranslationError;

/// Comparison operator of a [`FilterPredicate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Exact match.
    Eq,
    /// Negated exact match. Records without the field match.
    Ne,
    /// Numeric `>`.
    Gt,
    /// Numeric `>=`.
    Gte,
    /// Numeric `<`.
    Lt,
    /// Numeric `<=`.
    Lte,
    /// Substring match on text fields.
    Contains,
    /// Malformed terminal: never decodable. Use `Gte` AND `Lte` instead.
    Range,
}

impl FilterOperator {
    /// Returns true for `Gt`, `Gte`, `Lt` and `Lte`.
    pub fn is_comparison(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eq => "Eq",
            Self::Ne => "Ne",
            Self::Gt => "Gt",
            Self::Gte => "Gte",
            Self::Lt => "Lt",
            Self::Lte => "Lte",
            Self::Contains => "Contains",
            Self::Range => "Range",
        };
        f.write_str(name)
    }
}

/// Scalar value carried by a predicate or stored in record metadata.
///
/// Serialized untagged, so `"ec2"`, `42`, `0.5` and `true` all round-trip
/// through JSON configuration as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl FilterValue {
    /// Coerces the value to a number for range comparisons.
    ///
    /// Text that parses as a number is accepted; booleans and non-numeric
    /// text are not. Non-finite floats are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            Self::Integer(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Bool(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Returns the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to JSON, preserving the native scalar type.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::json!(b),
            Self::Integer(i) => serde_json::json!(i),
            Self::Float(f) => serde_json::json!(f),
            Self::Text(s) => serde_json::json!(s),
        }
    }

    /// Converts to a JSON number for range comparisons.
    ///
    /// Integers (and integral numeric text) stay integers on the wire so
    /// backends with typed integer payloads compare exactly.
    pub fn to_numeric_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Integer(i) => Some(serde_json::json!(i)),
            Self::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => Some(serde_json::json!(i)),
                Err(_) => self.as_f64().map(|f| serde_json::json!(f)),
            },
            _ => self.as_f64().map(|f| serde_json::json!(f)),
        }
    }

    /// Equality with numeric cross-type comparison (`Integer(1) == Float(1.0)`).
    fn loosely_equals(&self, other: &FilterValue) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Strict numeric view (no text parsing), used when evaluating records.
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for FilterValue {
    fn from(value: f32) -> Self {
        Self::Float(value as f64)
    }
}

/// A single `field <operator> value` constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    /// Metadata or lineage field name.
    pub field: String,
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Right-hand side value.
    pub value: FilterValue,
}

impl FilterPredicate {
    /// Creates a predicate.
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Backend-independent boolean filter.
///
/// # Example
///
/// ```rust
/// use pulserag::filter::FilterExpression;
///
/// // service == "ec2" AND (cost >= 10 AND cost <= 20) AND NOT region == "eu"
/// let filter = FilterExpression::and([
///     FilterExpression::eq("service", "ec2"),
///     FilterExpression::between("cost", 10, 20),
///     FilterExpression::not(FilterExpression::eq("region", "eu")),
/// ]);
/// assert!(filter.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpression {
    /// All children must match.
    And(Vec<FilterExpression>),
    /// At least one child must match.
    Or(Vec<FilterExpression>),
    /// The child must not match.
    Not(Box<FilterExpression>),
    /// Leaf constraint.
    Predicate(FilterPredicate),
}

impl FilterExpression {
    /// Creates a predicate leaf.
    pub fn predicate(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::Predicate(FilterPredicate::new(field, operator, value))
    }

    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::predicate(field, FilterOperator::Eq, value)
    }

    /// `field != value`.
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::predicate(field, FilterOperator::Ne, value)
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::predicate(field, FilterOperator::Gt, value)
    }

    /// `field >= value`.
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::predicate(field, FilterOperator::Gte, value)
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::predicate(field, FilterOperator::Lt, value)
    }

    /// `field <= value`.
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::predicate(field, FilterOperator::Lte, value)
    }

    /// `field` contains the substring `value`.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::predicate(field, FilterOperator::Contains, value.into())
    }

    /// Inclusive range, expressed the only decodable way: `Gte` AND `Lte`.
    pub fn between(
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        let field = field.into();
        Self::And(vec![Self::gte(field.clone(), low), Self::lte(field, high)])
    }

    /// Conjunction of `children`.
    pub fn and(children: impl IntoIterator<Item = FilterExpression>) -> Self {
        Self::And(children.into_iter().collect())
    }

    /// Disjunction of `children`.
    pub fn or(children: impl IntoIterator<Item = FilterExpression>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// Negation of `child`.
    pub fn not(child: FilterExpression) -> Self {
        Self::Not(Box::new(child))
    }

    /// Checks the backend-independent well-formedness rules.
    ///
    /// Rejects `Range` predicates and empty `And`/`Or` anywhere in the tree.
    /// Backend translators apply these same rules during descent; this is
    /// the entry point for callers that want to fail before any I/O.
    pub fn validate(&self) -> Result<(), TranslationError> {
        match self {
            Self::And(children) | Self::Or(children) => {
                if children.is_empty() {
                    return Err(TranslationError::EmptyComposite {
                        combinator: self.combinator_name(),
                    });
                }
                children.iter().try_for_each(FilterExpression::validate)
            }
            Self::Not(child) => child.validate(),
            Self::Predicate(p) if p.operator == FilterOperator::Range => {
                Err(TranslationError::RangeNotDecodable {
                    field: p.field.clone(),
                })
            }
            Self::Predicate(_) => Ok(()),
        }
    }

    /// Returns `true` if `subject` satisfies this expression.
    ///
    /// The whole tree is validated first, so a malformed branch fails the
    /// evaluation even when short-circuiting would never reach it.
    pub fn evaluate(&self, subject: &impl FieldSource) -> Result<bool, TranslationError> {
        self.validate()?;
        Ok(self.matches(subject))
    }

    /// Number of predicate leaves in the tree.
    pub fn predicate_count(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().map(FilterExpression::predicate_count).sum()
            }
            Self::Not(child) => child.predicate_count(),
            Self::Predicate(_) => 1,
        }
    }

    pub(crate) fn combinator_name(&self) -> &'static str {
        match self {
            Self::And(_) => "And",
            Self::Or(_) => "Or",
            Self::Not(_) => "Not",
            Self::Predicate(_) => "Predicate",
        }
    }

    /// Evaluates without validation; callers run `validate()` first.
    pub(crate) fn matches(&self, subject: &impl FieldSource) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.matches(subject)),
            Self::Or(children) => children.iter().any(|c| c.matches(subject)),
            Self::Not(child) => !child.matches(subject),
            Self::Predicate(p) => predicate_matches(p, subject),
        }
    }
}

fn predicate_matches(p: &FilterPredicate, subject: &impl FieldSource) -> bool {
    let Some(actual) = subject.field_value(&p.field) else {
        // Missing fields only satisfy negated equality
        return p.operator == FilterOperator::Ne;
    };

    match p.operator {
        FilterOperator::Eq => actual.loosely_equals(&p.value),
        FilterOperator::Ne => !actual.loosely_equals(&p.value),
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            let (Some(lhs), Some(rhs)) = (actual.as_number(), p.value.as_f64()) else {
                return false;
            };
            match p.operator {
                FilterOperator::Gt => lhs > rhs,
                FilterOperator::Gte => lhs >= rhs,
                FilterOperator::Lt => lhs < rhs,
                _ => lhs <= rhs,
            }
        }
        FilterOperator::Contains => match (actual.as_text(), p.value.as_text()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        // Rejected by validate() before matching starts
        FilterOperator::Range => false,
    }
}

/// Anything whose fields a [`FilterExpression`] can be evaluated against.
pub trait FieldSource {
    /// Returns the value of `field`, or `None` if absent.
    fn field_value(&self, field: &str) -> Option<FilterValue>;
}

impl FieldSource for std::collections::BTreeMap<String, FilterValue> {
    fn field_value(&self, field: &str) -> Option<FilterValue> {
        self.get(field).cloned()
    }
}

impl FieldSource for std::collections::HashMap<String, FilterValue> {
    fn field_value(&self, field: &str) -> Option<FilterValue> {
        self.get(field).cloned()
    }
}
